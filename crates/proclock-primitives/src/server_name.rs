//! Region server identity (`host,port,startcode`)

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Server name parsing error
#[derive(Debug, Error)]
pub enum ServerNameError {
    /// Wrong number of comma separated fields
    #[error("expected host,port,startcode but got {0:?}")]
    InvalidFormat(String),
    /// Empty host
    #[error("empty host in server name")]
    EmptyHost,
    /// Port is not a valid number
    #[error("invalid port: {0}")]
    InvalidPort(String),
    /// Start code is not a valid number
    #[error("invalid start code: {0}")]
    InvalidStartCode(String),
}

/// Identity of one incarnation of a region server
///
/// The start code distinguishes restarts of a server on the same host and
/// port, so two incarnations lock independently.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerName {
    host: String,
    port: u16,
    start_code: u64,
}

impl ServerName {
    /// Create a server name from its parts
    pub fn new(host: impl Into<String>, port: u16, start_code: u64) -> Self {
        Self {
            host: host.into(),
            port,
            start_code,
        }
    }

    /// Parse `host,port,startcode`
    pub fn parse(s: &str) -> Result<Self, ServerNameError> {
        let parts: Vec<&str> = s.split(',').collect();
        let [host, port, start_code] = parts.as_slice() else {
            return Err(ServerNameError::InvalidFormat(s.to_string()));
        };
        let host = host.trim();
        if host.is_empty() {
            return Err(ServerNameError::EmptyHost);
        }
        let port = port
            .trim()
            .parse()
            .map_err(|_| ServerNameError::InvalidPort(port.to_string()))?;
        let start_code = start_code
            .trim()
            .parse()
            .map_err(|_| ServerNameError::InvalidStartCode(start_code.to_string()))?;
        Ok(Self::new(host, port, start_code))
    }

    /// Host name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// RPC port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Start code of this incarnation
    pub fn start_code(&self) -> u64 {
        self.start_code
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.host, self.port, self.start_code)
    }
}

impl FromStr for ServerName {
    type Err = ServerNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for ServerName {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for ServerName {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            ServerName::parse(&s).map_err(de::Error::custom)
        }
    }
}
