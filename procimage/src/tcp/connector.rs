use std::fmt::{Display, Formatter};

use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;

use crate::station::StationShared;

pub(crate) enum ConnectError {
    /// the station has no address configured; fails without consuming time
    NoAddress,
    /// the connect attempt did not complete within the configured bound
    Timeout,
    /// the station was reconfigured while the connect was in flight
    Superseded,
    /// the connect attempt itself failed
    Io(std::io::Error),
}

impl Display for ConnectError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ConnectError::NoAddress => f.write_str("no address configured"),
            ConnectError::Timeout => f.write_str("connect attempt timed out"),
            ConnectError::Superseded => {
                f.write_str("station was reconfigured during the connect attempt")
            }
            ConnectError::Io(err) => err.fmt(f),
        }
    }
}

impl ConnectError {
    /// Failing because there is nothing to connect to is routine, not noteworthy
    pub(crate) fn is_routine(&self) -> bool {
        matches!(self, ConnectError::NoAddress | ConnectError::Superseded)
    }
}

/// Establish the station's connection: resolve the configured address,
/// connect within the bounded timeout, split the stream, and install the
/// write half in the connection slot. Returns the read half and the slot
/// generation that now identifies this connection.
///
/// Safe under repeated polling: on any failure no connection is left set,
/// and a reconfiguration that raced the connect discards the fresh socket.
pub(crate) async fn connect(
    shared: &StationShared,
) -> Result<(OwnedReadHalf, u64), ConnectError> {
    let addr = shared
        .address()
        .filter(|addr| !addr.host().is_empty())
        .ok_or(ConnectError::NoAddress)?;
    let observed = shared.generation();

    let stream = match tokio::time::timeout(
        shared.connect_timeout,
        TcpStream::connect((addr.host(), addr.port())),
    )
    .await
    {
        Err(_) => return Err(ConnectError::Timeout),
        Ok(Err(err)) => return Err(ConnectError::Io(err)),
        Ok(Ok(stream)) => stream,
    };

    let (read_half, write_half) = stream.into_split();
    match shared.install_connection(observed, write_half) {
        Some(generation) => {
            tracing::info!("connected to {}", addr);
            Ok((read_half, generation))
        }
        None => Err(ConnectError::Superseded),
    }
}
