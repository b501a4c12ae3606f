use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;

use crate::decode::FrameDisplay;
use crate::retry::RetryStrategy;
use crate::station::StationShared;
use crate::tcp::connector;

/// Why a session over one connection ended
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SessionError {
    /// the stream errored
    Io(std::io::ErrorKind),
    /// no data arrived within the receive timeout
    Timeout,
    /// the peer closed the connection
    PeerClosed,
    /// the connection was torn down locally (send failure or address change)
    Closed,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SessionError::Io(kind) => write!(f, "I/O error: {kind}"),
            SessionError::Timeout => f.write_str("receive timed out"),
            SessionError::PeerClosed => f.write_str("peer closed the connection"),
            SessionError::Closed => f.write_str("connection closed locally"),
        }
    }
}

/// Per-station connection manager and frame reader. Runs forever: connect
/// with retry pacing, then pump frames until the session dies, then start
/// over. The input image is only ever updated with complete frames.
pub(crate) async fn run(shared: Arc<StationShared>, mut retry: Box<dyn RetryStrategy>) {
    let mut staging = vec![0u8; shared.in_size];
    loop {
        let (reader, generation) = match connector::connect(&shared).await {
            Ok(connection) => {
                retry.reset();
                connection
            }
            Err(err) => {
                if err.is_routine() {
                    tracing::debug!("not connecting: {}", err);
                } else {
                    tracing::warn!("error connecting: {}", err);
                }
                tokio::time::sleep(retry.after_failed_connect()).await;
                continue;
            }
        };

        let err = run_session(&shared, reader, generation, &mut staging).await;
        if err == SessionError::Closed {
            tracing::info!("session ended: {}", err);
        } else {
            tracing::warn!("session ended: {}", err);
        }
        shared.close_if_current(generation);
        tokio::time::sleep(retry.after_disconnect()).await;
    }
}

async fn run_session(
    shared: &StationShared,
    mut reader: OwnedReadHalf,
    generation: u64,
    staging: &mut [u8],
) -> SessionError {
    // register for teardown wakeups before checking the generation, so a
    // teardown can never fall between the check and the first poll
    let notified = shared.teardown.notified();
    tokio::pin!(notified);
    notified.as_mut().enable();
    if shared.generation() != generation {
        return SessionError::Closed;
    }

    if staging.is_empty() {
        return watch_idle_peer(shared, &mut reader, notified).await;
    }

    loop {
        let mut filled = 0;
        while filled < staging.len() {
            let received = tokio::select! {
                _ = &mut notified => return SessionError::Closed,
                result = read_some(&mut reader, &mut staging[filled..], shared.recv_timeout) => {
                    match result {
                        Ok(received) => received,
                        Err(err) => {
                            if filled > 0 {
                                tracing::warn!(
                                    "discarding partial frame of {} of {} bytes",
                                    filled,
                                    staging.len()
                                );
                            }
                            return err;
                        }
                    }
                }
            };
            filled += received;
        }

        {
            let mut images = shared.images();
            images.input.fill_from(staging);
            images.connected = true;
        }
        if shared.decode.enabled() {
            tracing::info!("RX {}", FrameDisplay::new(shared.decode, staging));
        }
        shared.notify_input();
    }
}

/// A station with no input image still owns the connection; nothing is
/// expected from the peer, so just watch for it going away.
async fn watch_idle_peer(
    shared: &StationShared,
    reader: &mut OwnedReadHalf,
    mut notified: std::pin::Pin<&mut tokio::sync::futures::Notified<'_>>,
) -> SessionError {
    let mut probe = [0u8; 32];
    loop {
        tokio::select! {
            _ = &mut notified => return SessionError::Closed,
            result = reader.read(&mut probe) => match result {
                Ok(0) => return SessionError::PeerClosed,
                Ok(received) => {
                    tracing::debug!("station '{}': discarding {} unexpected bytes", shared.name, received)
                }
                Err(err) => return SessionError::Io(err.kind()),
            },
        }
    }
}

/// One read into the staging buffer, bounded by the receive timeout when
/// one is configured. A zero-length read means the peer closed.
async fn read_some(
    reader: &mut OwnedReadHalf,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> Result<usize, SessionError> {
    let result = match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, reader.read(buf)).await {
            Ok(result) => result,
            Err(_) => return Err(SessionError::Timeout),
        },
        None => reader.read(buf).await,
    };
    match result {
        Ok(0) => Err(SessionError::PeerClosed),
        Ok(received) => Ok(received),
        Err(err) => Err(SessionError::Io(err.kind())),
    }
}
