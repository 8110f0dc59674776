//! Session configuration — the validated parameters for one receiver
//! invocation.
//!
//! A `SessionConfig` is constructed once per submitted session and never
//! mutated afterwards. All bounds checking happens in the constructor so a
//! malformed session is rejected before any process launch is attempted.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PORT_MIN: u16 = 9000;
pub const PORT_MAX: u16 = 9100;
pub const TIMEOUT_MIN_SECS: u32 = 30;
pub const TIMEOUT_MAX_SECS: u32 = 600;
pub const DELAY_MIN_MS: u32 = 10;
pub const DELAY_MAX_MS: u32 = 200;

/// Receiver version tag; selects which `srt-live-transmit-v<tag>` binary
/// is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiverVersion {
    #[serde(rename = "1.5.3")]
    V1_5_3,
    #[serde(rename = "1.5.0")]
    V1_5_0,
    #[serde(rename = "1.4.4")]
    V1_4_4,
}

impl ReceiverVersion {
    pub fn tag(&self) -> &'static str {
        match self {
            ReceiverVersion::V1_5_3 => "1.5.3",
            ReceiverVersion::V1_5_0 => "1.5.0",
            ReceiverVersion::V1_4_4 => "1.4.4",
        }
    }
}

impl fmt::Display for ReceiverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ReceiverVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.5.3" => Ok(ReceiverVersion::V1_5_3),
            "1.5.0" => Ok(ReceiverVersion::V1_5_0),
            "1.4.4" => Ok(ReceiverVersion::V1_4_4),
            other => Err(ConfigError::UnknownVersion(other.to_string())),
        }
    }
}

/// SRT handshake role. The receiver is always the flow receiver; the role
/// only decides who initiates the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeMode {
    /// Wait for a peer caller to connect.
    Listener,
    /// Initiate the connection to a peer listener.
    Caller,
}

impl fmt::Display for HandshakeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeMode::Listener => f.write_str("listener"),
            HandshakeMode::Caller => f.write_str("caller"),
        }
    }
}

impl FromStr for HandshakeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "listener" => Ok(HandshakeMode::Listener),
            "caller" => Ok(HandshakeMode::Caller),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),
    #[error("port {0} outside the allowed range {PORT_MIN}-{PORT_MAX}")]
    PortOutOfRange(u16),
    #[error("timeout {0}s outside the allowed range {TIMEOUT_MIN_SECS}-{TIMEOUT_MAX_SECS}s")]
    TimeoutOutOfRange(u32),
    #[error("netem delay {0}ms outside the allowed range {DELAY_MIN_MS}-{DELAY_MAX_MS}ms")]
    DelayOutOfRange(u32),
    #[error("unknown receiver version: {0}")]
    UnknownVersion(String),
    #[error("unknown handshake mode: {0}")]
    UnknownMode(String),
}

/// One receiver invocation's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub version: ReceiverVersion,
    pub mode: HandshakeMode,
    /// Bind address for a listener, peer address for a caller.
    pub address: Ipv4Addr,
    pub port: u16,
    pub timeout_secs: u32,
    /// Artificial delay injected on the host interface, when requested.
    pub netem_delay_ms: Option<u32>,
}

impl SessionConfig {
    /// Validate and build a session configuration.
    ///
    /// Rejects malformed addresses and out-of-range port/timeout/delay
    /// values before any external process is involved.
    pub fn new(
        version: ReceiverVersion,
        mode: HandshakeMode,
        address: &str,
        port: u16,
        timeout_secs: u32,
        netem_delay_ms: Option<u32>,
    ) -> Result<Self, ConfigError> {
        let address = Ipv4Addr::from_str(address)
            .map_err(|_| ConfigError::InvalidAddress(address.to_string()))?;

        if !(PORT_MIN..=PORT_MAX).contains(&port) {
            return Err(ConfigError::PortOutOfRange(port));
        }
        if !(TIMEOUT_MIN_SECS..=TIMEOUT_MAX_SECS).contains(&timeout_secs) {
            return Err(ConfigError::TimeoutOutOfRange(timeout_secs));
        }
        if let Some(delay) = netem_delay_ms {
            if !(DELAY_MIN_MS..=DELAY_MAX_MS).contains(&delay) {
                return Err(ConfigError::DelayOutOfRange(delay));
            }
        }

        Ok(Self {
            version,
            mode,
            address,
            port,
            timeout_secs,
            netem_delay_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Result<SessionConfig, ConfigError> {
        SessionConfig::new(
            ReceiverVersion::V1_5_3,
            HandshakeMode::Listener,
            "192.168.1.7",
            9000,
            60,
            None,
        )
    }

    #[test]
    fn accepts_valid_config() {
        let config = valid().unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.address.to_string(), "192.168.1.7");
        assert_eq!(config.mode.to_string(), "listener");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for addr in ["999.1.1.1", "abc", "", "10.0.0", "10.0.0.1.2"] {
            let err = SessionConfig::new(
                ReceiverVersion::V1_5_3,
                HandshakeMode::Caller,
                addr,
                9000,
                60,
                None,
            )
            .unwrap_err();
            assert_eq!(err, ConfigError::InvalidAddress(addr.to_string()));
        }
    }

    #[test]
    fn rejects_out_of_range_port() {
        for port in [0, 8999, 9101, u16::MAX] {
            let err = SessionConfig::new(
                ReceiverVersion::V1_5_0,
                HandshakeMode::Listener,
                "10.0.0.1",
                port,
                60,
                None,
            )
            .unwrap_err();
            assert_eq!(err, ConfigError::PortOutOfRange(port));
        }
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        for timeout in [0, 29, 601] {
            let err = SessionConfig::new(
                ReceiverVersion::V1_5_3,
                HandshakeMode::Listener,
                "10.0.0.1",
                9000,
                timeout,
                None,
            )
            .unwrap_err();
            assert_eq!(err, ConfigError::TimeoutOutOfRange(timeout));
        }
    }

    #[test]
    fn rejects_out_of_range_delay() {
        for delay in [0, 9, 201] {
            let err = SessionConfig::new(
                ReceiverVersion::V1_5_3,
                HandshakeMode::Listener,
                "10.0.0.1",
                9000,
                60,
                Some(delay),
            )
            .unwrap_err();
            assert_eq!(err, ConfigError::DelayOutOfRange(delay));
        }
        assert!(SessionConfig::new(
            ReceiverVersion::V1_5_3,
            HandshakeMode::Listener,
            "10.0.0.1",
            9000,
            60,
            Some(50),
        )
        .is_ok());
    }

    #[test]
    fn version_and_mode_round_trip_from_str() {
        assert_eq!("1.5.3".parse::<ReceiverVersion>().unwrap().tag(), "1.5.3");
        assert!("2.0.0".parse::<ReceiverVersion>().is_err());
        assert_eq!(
            "Caller".parse::<HandshakeMode>().unwrap(),
            HandshakeMode::Caller
        );
        assert!("peer".parse::<HandshakeMode>().is_err());
    }
}
