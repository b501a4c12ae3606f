pub(crate) mod connector;
pub(crate) mod receive;
pub(crate) mod send;

use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::ConfigError;

/// Remote endpoint of a station: a DNS name or IP literal plus a port.
///
/// Name resolution is deferred to connect time so that a station can
/// outlive address changes in the network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostAddr {
    host: String,
    port: u16,
}

impl HostAddr {
    /// Endpoint from a DNS name or IP literal
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Endpoint from an IP address
    pub fn ip(addr: IpAddr, port: u16) -> Self {
        Self {
            host: addr.to_string(),
            port,
        }
    }

    /// The host portion, unresolved
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The TCP port
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Display for HostAddr {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for HostAddr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::InvalidAddress(s.to_string());
        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            // bracketed IPv6 literal: [::1]:2000
            rest.split_once("]:").ok_or_else(bad)?
        } else {
            let (host, port) = s.rsplit_once(':').ok_or_else(bad)?;
            if host.contains(':') {
                // an unbracketed IPv6 literal is ambiguous
                return Err(bad());
            }
            (host, port)
        };
        if host.is_empty() {
            return Err(bad());
        }
        let port = port.parse::<u16>().map_err(|_| bad())?;
        Ok(HostAddr::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_port() {
        let addr: HostAddr = "plc7.example.org:2000".parse().unwrap();
        assert_eq!(addr.host(), "plc7.example.org");
        assert_eq!(addr.port(), 2000);
        assert_eq!(addr.to_string(), "plc7.example.org:2000");
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let addr: HostAddr = "[::1]:502".parse().unwrap();
        assert_eq!(addr.host(), "::1");
        assert_eq!(addr.to_string(), "[::1]:502");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for text in ["", "plc7", "plc7:", ":2000", "plc7:notaport", "::1:502"] {
            assert!(
                text.parse::<HostAddr>().is_err(),
                "accepted '{text}'"
            );
        }
    }

    #[test]
    fn ip_constructor_round_trips() {
        let addr = HostAddr::ip("10.0.0.7".parse().unwrap(), 2000);
        assert_eq!(addr.to_string(), "10.0.0.7:2000");
    }
}
