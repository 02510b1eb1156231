//! connection target: which device the panel talks to

use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::common::error::PanelError;

lazy_static! {
    // dotted quad, optionally followed by ":port"
    static ref ADDRESS_RE: Regex = Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}(:\d+)?$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionTarget {
    pub address: String,
    pub port: u16,
}

impl ConnectionTarget {
    pub fn new(address: &str, port: u16) -> Self {
        ConnectionTarget {
            address: address.to_string(),
            port,
        }
    }

    /// validate raw operator input as a device address
    /// a trailing ":port" is accepted but dropped, the port is tracked separately
    pub fn parse_address(raw: &str) -> Result<String, PanelError> {
        let raw = raw.trim();
        if !ADDRESS_RE.is_match(raw) {
            return Err(PanelError::invalid_argument(format!("invalid IP address format: '{}'", raw)));
        }
        let host = raw.split(':').next().unwrap_or(raw);
        Ok(host.to_string())
    }

    pub fn parse_port(raw: &str) -> Result<u16, PanelError> {
        raw.trim()
            .parse::<u16>()
            .map_err(|e| PanelError::invalid_argument(format!("invalid port '{}': {}", raw.trim(), e)))
    }

    pub fn with_address(&self, address: &str) -> Self {
        Self::new(address, self.port)
    }

    pub fn with_port(&self, port: u16) -> Self {
        Self::new(self.address.as_str(), port)
    }

    /// resolve to a socket address, octets above 255 fail here
    pub fn socket_addr(&self) -> Result<SocketAddr, PanelError> {
        self.to_string()
            .parse()
            .map_err(|e| PanelError::connect(format!("invalid address {}: {}", self, e)))
    }
}

impl Display for ConnectionTarget {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
