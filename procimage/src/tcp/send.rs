use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::time::MissedTickBehavior;

use crate::decode::FrameDisplay;
use crate::station::StationShared;

/// Per-station send cycle. Each period: flush the output image if it
/// changed and a connection exists, then signal the output-cycle
/// notifier whether or not a transfer occurred.
///
/// A burst of writes within one period coalesces into a single transfer
/// carrying the merged state.
pub(crate) async fn run(shared: Arc<StationShared>) {
    let mut snapshot = vec![0u8; shared.out_size];
    let mut interval = tokio::time::interval(shared.send_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if shared.output_accepted() {
            flush_if_dirty(&shared, &mut snapshot).await;
        }
        shared.notify_output_cycle();
    }
}

async fn flush_if_dirty(shared: &StationShared, snapshot: &mut [u8]) {
    let dirty = {
        let mut images = shared.images();
        if images.connected && images.output_dirty {
            images.output.snapshot_into(snapshot);
            images.output_dirty = false;
            true
        } else {
            false
        }
    };
    if !dirty {
        return;
    }

    // the write half leaves the slot for the duration of the send so that
    // no socket call ever runs under a lock
    let Some((mut writer, generation)) = shared.take_writer() else {
        // the connection went away between the check and the take
        shared.images().output_dirty = true;
        return;
    };

    if shared.decode.enabled() {
        tracing::info!("TX {}", FrameDisplay::new(shared.decode, snapshot));
    }

    match writer.write_all(snapshot).await {
        Ok(()) => shared.restore_writer(writer, generation),
        Err(err) => {
            tracing::warn!("send failed: {}", err);
            // the update was consumed from the image but never made it
            // out; re-mark so the merged state is resent after reconnect
            shared.images().output_dirty = true;
            drop(writer);
            shared.close_if_current(generation);
        }
    }
}
