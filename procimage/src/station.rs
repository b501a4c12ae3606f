use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{watch, Notify};

use crate::config::StationConfig;
use crate::decode::DecodeLevel;
use crate::error::{AccessError, Shutdown};
use crate::image::ImageBuffer;
use crate::tcp::HostAddr;

/// Everything guarded by the per-station image mutex: both images, the
/// dirty flag, and the connected flag. Critical sections stay short;
/// no socket call ever runs while this is held.
pub(crate) struct ImageState {
    pub(crate) input: ImageBuffer,
    pub(crate) output: ImageBuffer,
    pub(crate) output_dirty: bool,
    pub(crate) connected: bool,
}

/// The connection slot, guarded by its own narrow mutex: the write half
/// of the current socket plus a generation counter. Every install or
/// teardown bumps the generation, so a loop that held the socket while
/// off-lock can detect that its connection was replaced.
pub(crate) struct ConnSlot {
    pub(crate) writer: Option<OwnedWriteHalf>,
    pub(crate) generation: u64,
}

pub(crate) struct StationShared {
    pub(crate) name: String,
    pub(crate) in_size: usize,
    pub(crate) out_size: usize,
    /// `None` waits forever
    pub(crate) recv_timeout: Option<Duration>,
    pub(crate) send_interval: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) decode: DecodeLevel,
    images: Mutex<ImageState>,
    conn: Mutex<ConnSlot>,
    addr: Mutex<Option<HostAddr>>,
    output_gate: AtomicBool,
    /// wakes the receive task so it releases its read half promptly
    pub(crate) teardown: Notify,
    input_tx: watch::Sender<u64>,
    output_tx: watch::Sender<u64>,
}

impl StationShared {
    pub(crate) fn images(&self) -> MutexGuard<'_, ImageState> {
        self.images.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn conn(&self) -> MutexGuard<'_, ConnSlot> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn address(&self) -> Option<HostAddr> {
        self.addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.conn().generation
    }

    pub(crate) fn output_accepted(&self) -> bool {
        self.output_gate.load(Ordering::Relaxed)
    }

    /// Signal input subscribers; fired on every received frame and on
    /// disconnect, so alarm logic wakes immediately in both cases
    pub(crate) fn notify_input(&self) {
        self.input_tx.send_modify(|n| *n = n.wrapping_add(1));
    }

    pub(crate) fn notify_output_cycle(&self) {
        self.output_tx.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Install a freshly connected write half, unless the slot generation
    /// moved since `observed` (an address change raced the connect). On
    /// success the station is connected and the output image is marked
    /// dirty so the current output state is pushed after every reconnect.
    pub(crate) fn install_connection(
        &self,
        observed: u64,
        writer: OwnedWriteHalf,
    ) -> Option<u64> {
        let generation = {
            let mut conn = self.conn();
            if conn.generation != observed {
                return None;
            }
            conn.writer = Some(writer);
            conn.generation = conn.generation.wrapping_add(1);
            conn.generation
        };
        let mut images = self.images();
        images.connected = true;
        if self.out_size > 0 {
            images.output_dirty = true;
        }
        Some(generation)
    }

    /// Tear the connection down if it is still the one the caller holds a
    /// stake in. Returns false when another teardown got there first.
    pub(crate) fn close_if_current(&self, observed: u64) -> bool {
        {
            let mut conn = self.conn();
            if conn.generation != observed {
                return false;
            }
            conn.writer = None;
            conn.generation = conn.generation.wrapping_add(1);
        }
        self.mark_disconnected();
        true
    }

    /// Unconditional teardown, used when the address changes
    pub(crate) fn force_close(&self) {
        {
            let mut conn = self.conn();
            conn.writer = None;
            conn.generation = conn.generation.wrapping_add(1);
        }
        self.mark_disconnected();
    }

    fn mark_disconnected(&self) {
        {
            let mut images = self.images();
            images.connected = false;
        }
        self.teardown.notify_waiters();
        self.notify_input();
    }

    /// Take the write half out of the slot for a send performed outside
    /// any lock. The caller restores it afterwards via [`Self::restore_writer`].
    pub(crate) fn take_writer(&self) -> Option<(OwnedWriteHalf, u64)> {
        let mut conn = self.conn();
        let generation = conn.generation;
        conn.writer.take().map(|writer| (writer, generation))
    }

    pub(crate) fn restore_writer(&self, writer: OwnedWriteHalf, observed: u64) {
        let mut conn = self.conn();
        if conn.generation == observed && conn.writer.is_none() {
            conn.writer = Some(writer);
        }
        // otherwise the connection was torn down while the send was in
        // flight; the stale half is dropped here
    }
}

/// Handle to one configured station. Cheap to clone; all clones refer to
/// the same images and connection.
///
/// Obtained from [`crate::StationRegistry::add`] or
/// [`crate::StationRegistry::get`].
#[derive(Clone)]
pub struct Station {
    shared: Arc<StationShared>,
}

impl Station {
    pub(crate) fn new(config: StationConfig) -> Self {
        let swap = config.swap_bytes();
        let recv_timeout = if config.recv_timeout.is_zero() {
            None
        } else {
            Some(config.recv_timeout)
        };
        let (input_tx, _) = watch::channel(0);
        let (output_tx, _) = watch::channel(0);
        Self {
            shared: Arc::new(StationShared {
                name: config.name,
                in_size: config.input_size,
                out_size: config.output_size,
                recv_timeout,
                send_interval: config.send_interval,
                connect_timeout: config.connect_timeout,
                decode: config.decode_level,
                images: Mutex::new(ImageState {
                    input: ImageBuffer::new(config.input_size, swap),
                    output: ImageBuffer::new(config.output_size, swap),
                    output_dirty: false,
                    connected: false,
                }),
                conn: Mutex::new(ConnSlot {
                    writer: None,
                    generation: 0,
                }),
                addr: Mutex::new(config.address),
                output_gate: AtomicBool::new(true),
                teardown: Notify::new(),
                input_tx,
                output_tx,
            }),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<StationShared> {
        &self.shared
    }

    /// The unique station name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Copy `count` elements of `element_size` bytes starting at byte
    /// `offset` of the input image into `dest`, reversing byte order per
    /// element when the station swaps.
    ///
    /// Returns [`AccessError::NotConnected`] when no live connection
    /// exists; `dest` then still holds the last successfully received
    /// image, stale but valid. A zero-element call doubles as a pure
    /// connection-status probe.
    pub fn read_array(
        &self,
        offset: usize,
        element_size: usize,
        count: usize,
        dest: &mut [u8],
    ) -> Result<(), AccessError> {
        let images = self.shared.images();
        images.input.read_elements(offset, element_size, count, dest)?;
        if images.connected {
            Ok(())
        } else {
            Err(AccessError::NotConnected)
        }
    }

    /// Read back the pending output image, with the same contract as
    /// [`Self::read_array`]. Binding layers use this for initial readback
    /// of output records.
    pub fn read_output_array(
        &self,
        offset: usize,
        element_size: usize,
        count: usize,
        dest: &mut [u8],
    ) -> Result<(), AccessError> {
        let images = self.shared.images();
        images.output.read_elements(offset, element_size, count, dest)?;
        if images.connected {
            Ok(())
        } else {
            Err(AccessError::NotConnected)
        }
    }

    /// Merge `count` elements from `src` into the output image at byte
    /// `offset` and mark it for transmission on the next send cycle.
    ///
    /// The mask, when given, is one element wide and applies to every
    /// element: per byte the stored value becomes
    /// `(src & mask) | (existing & !mask)`. The write is applied locally
    /// even when [`AccessError::NotConnected`] is returned; it goes out
    /// if/when the station reconnects.
    pub fn write_masked_array(
        &self,
        offset: usize,
        element_size: usize,
        count: usize,
        src: &[u8],
        mask: Option<&[u8]>,
    ) -> Result<(), AccessError> {
        let mut images = self.shared.images();
        images
            .output
            .write_elements(offset, element_size, count, src, mask)?;
        if count > 0 && element_size > 0 {
            images.output_dirty = true;
        }
        if images.connected {
            Ok(())
        } else {
            Err(AccessError::NotConnected)
        }
    }

    /// [`Self::write_masked_array`] without a mask: plain overwrite
    pub fn write_array(
        &self,
        offset: usize,
        element_size: usize,
        count: usize,
        src: &[u8],
    ) -> Result<(), AccessError> {
        self.write_masked_array(offset, element_size, count, src, None)
    }

    /// The configured remote endpoint, if any
    pub fn address(&self) -> Option<HostAddr> {
        self.shared.address()
    }

    /// Replace the remote endpoint. Any live connection is closed first;
    /// the station's own cycle then reconnects to the new address.
    /// Passing `None` parks the station without consuming connect
    /// attempts.
    pub fn set_address(&self, addr: Option<HostAddr>) {
        {
            let mut current = self
                .shared
                .addr
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match &addr {
                Some(addr) => tracing::info!("station '{}': address set to {}", self.shared.name, addr),
                None => tracing::info!("station '{}': address cleared", self.shared.name),
            }
            *current = addr;
        }
        self.shared.force_close();
    }

    /// True while a live connection to the remote exists
    pub fn is_connected(&self) -> bool {
        self.shared.images().connected
    }

    /// Subscribe to input updates: fires on every received frame and on
    /// disconnect. A caller that reads immediately after a wakeup
    /// observes the just-completed frame.
    pub fn input_listener(&self) -> UpdateListener {
        UpdateListener {
            rx: self.shared.input_tx.subscribe(),
        }
    }

    /// Subscribe to send cycles: fires once per cycle whether or not a
    /// transfer occurred, even while disconnected.
    pub fn output_listener(&self) -> UpdateListener {
        UpdateListener {
            rx: self.shared.output_tx.subscribe(),
        }
    }

    /// Allow the send cycle to transmit (the default)
    pub fn enable_output(&self) {
        self.shared.output_gate.store(true, Ordering::Relaxed);
    }

    /// Keep the send cycle from transmitting. Writes still accumulate in
    /// the output image and are flushed on the first enabled cycle.
    pub fn disable_output(&self) {
        self.shared.output_gate.store(false, Ordering::Relaxed);
    }

    /// Diagnostic snapshot of the station
    pub fn status(&self) -> StationStatus {
        let (connected, swap_bytes) = {
            let images = self.shared.images();
            (images.connected, images.input.is_swapped())
        };
        StationStatus {
            name: self.shared.name.clone(),
            address: self.shared.address(),
            connected,
            input_size: self.shared.in_size,
            output_size: self.shared.out_size,
            swap_bytes,
        }
    }
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("name", &self.shared.name)
            .finish()
    }
}

/// Subscription handle for "interrupt"-style wakeups.
///
/// Backed by a generation counter: an event that fires while the
/// subscriber is busy is still observed by the next call to
/// [`Self::changed`], though consecutive events may coalesce into one
/// wakeup.
#[derive(Debug)]
pub struct UpdateListener {
    rx: watch::Receiver<u64>,
}

impl UpdateListener {
    /// Wait until the next event after the last one seen by this handle
    pub async fn changed(&mut self) -> Result<(), Shutdown> {
        self.rx.changed().await.map_err(|_| Shutdown)
    }
}

/// Diagnostic snapshot of one station, as reported by
/// [`Station::status`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StationStatus {
    /// the unique station name
    pub name: String,
    /// the configured remote endpoint, if any
    pub address: Option<HostAddr>,
    /// true while a live connection exists
    pub connected: bool,
    /// input image size in bytes
    pub input_size: usize,
    /// output image size in bytes
    pub output_size: usize,
    /// true when accessors reverse byte order per element
    pub swap_bytes: bool,
}

impl Display for StationStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "station '{}' {} {}, {} bytes in, {} bytes out, {}",
            self.name,
            if self.connected {
                "connected to"
            } else {
                "disconnected from"
            },
            match &self.address {
                Some(addr) => addr.to_string(),
                None => "<no address>".to_string(),
            },
            self.input_size,
            self.output_size,
            if self.swap_bytes {
                "swapped"
            } else {
                "unswapped"
            }
        )
    }
}

/// Capability interface for binding layers that map typed records onto
/// image offsets: the read/write/notify surface of a station without the
/// lifecycle methods.
pub trait ImageAccess {
    /// see [`Station::read_array`]
    fn read_array(
        &self,
        offset: usize,
        element_size: usize,
        count: usize,
        dest: &mut [u8],
    ) -> Result<(), AccessError>;

    /// see [`Station::write_array`]
    fn write_array(
        &self,
        offset: usize,
        element_size: usize,
        count: usize,
        src: &[u8],
    ) -> Result<(), AccessError>;

    /// see [`Station::write_masked_array`]
    fn write_masked_array(
        &self,
        offset: usize,
        element_size: usize,
        count: usize,
        src: &[u8],
        mask: Option<&[u8]>,
    ) -> Result<(), AccessError>;

    /// see [`Station::input_listener`]
    fn input_listener(&self) -> UpdateListener;

    /// see [`Station::output_listener`]
    fn output_listener(&self) -> UpdateListener;

    /// see [`Station::is_connected`]
    fn is_connected(&self) -> bool;
}

impl ImageAccess for Station {
    fn read_array(
        &self,
        offset: usize,
        element_size: usize,
        count: usize,
        dest: &mut [u8],
    ) -> Result<(), AccessError> {
        Station::read_array(self, offset, element_size, count, dest)
    }

    fn write_array(
        &self,
        offset: usize,
        element_size: usize,
        count: usize,
        src: &[u8],
    ) -> Result<(), AccessError> {
        Station::write_array(self, offset, element_size, count, src)
    }

    fn write_masked_array(
        &self,
        offset: usize,
        element_size: usize,
        count: usize,
        src: &[u8],
        mask: Option<&[u8]>,
    ) -> Result<(), AccessError> {
        Station::write_masked_array(self, offset, element_size, count, src, mask)
    }

    fn input_listener(&self) -> UpdateListener {
        Station::input_listener(self)
    }

    fn output_listener(&self) -> UpdateListener {
        Station::output_listener(self)
    }

    fn is_connected(&self) -> bool {
        Station::is_connected(self)
    }
}
