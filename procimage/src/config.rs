use std::time::Duration;

use crate::decode::DecodeLevel;
use crate::error::ConfigError;
use crate::tcp::HostAddr;

/// Parameters for one station, consumed by [`crate::StationRegistry::add`]
/// at configuration time.
///
/// Image sizes are fixed for the lifetime of the process. The address is
/// optional and may be set later through
/// [`crate::Station::set_address`]; a station without an address stays
/// disconnected without consuming connect attempts.
#[derive(Clone, Debug)]
pub struct StationConfig {
    /// unique station name used for registry lookups
    pub name: String,
    /// remote endpoint, if already known at configuration time
    pub address: Option<HostAddr>,
    /// size of the input image in bytes (what the remote streams to us)
    pub input_size: usize,
    /// size of the output image in bytes (what we stream to the remote)
    pub output_size: usize,
    /// true if the remote device stores multi-byte values big-endian
    ///
    /// The per-element swap flag is the XOR of this and the host
    /// endianness, so images move between devices unchanged in meaning.
    pub big_endian: bool,
    /// how long a receive may stall before the connection is considered
    /// dead; [`Duration::ZERO`] waits forever, for intentionally idle
    /// stations
    pub recv_timeout: Duration,
    /// period of the send cycle; writes within one period coalesce into a
    /// single transfer
    pub send_interval: Duration,
    /// upper bound on a single connect attempt
    pub connect_timeout: Duration,
    /// how much of each exchanged frame is decoded into the log
    pub decode_level: DecodeLevel,
}

const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

impl StationConfig {
    /// Create a configuration with the customary defaults: no address,
    /// big-endian remote, 2 s receive timeout, 1 s send interval, 5 s
    /// connect timeout, no frame decoding.
    pub fn new(name: impl Into<String>, input_size: usize, output_size: usize) -> Self {
        Self {
            name: name.into(),
            address: None,
            input_size,
            output_size,
            big_endian: true,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            send_interval: DEFAULT_SEND_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            decode_level: DecodeLevel::Nothing,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.input_size == 0 && self.output_size == 0 {
            return Err(ConfigError::NoImages(self.name.clone()));
        }
        Ok(())
    }

    pub(crate) fn swap_bytes(&self) -> bool {
        self.big_endian != cfg!(target_endian = "big")
    }
}
