//! Error taxonomy for link, resolution, session and supervision failures.
//!
//! Each concern gets its own small `Copy` enum so callers can match on the
//! exact failure without allocation. Which of them are retried and which
//! stop the supervisor is decided in [`supervisor`](crate::supervisor).

use core::fmt;

use crate::network;
use crate::network::mqtt::packet;

/// Radio link failures. Always retried.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LinkError {
    /// The network rejected registration.
    Rejected,
    /// The radio stack gave up waiting for registration.
    Timeout,
    /// The modem did not respond or reported an internal fault.
    Modem,
}

/// Broker address lookup failures.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ResolveError {
    /// The lookup itself failed (no DNS, no network, unknown host).
    LookupFailed,
    /// The lookup succeeded but returned no IPv4 address.
    NoUsableAddress,
}

/// Session adapter failures.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SessionError {
    /// Nothing to do right now. Benign for keepalive servicing.
    WouldBlock,
    /// `connect` was called before `configure`.
    NotConfigured,
    /// The operation needs an open, acknowledged session.
    NotConnected,
    /// The client identifier does not fit the session's storage.
    ClientIdTooLong,
    /// The configured buffer size exceeds the adapter's capacity.
    BufferTooLarge,
    /// A packet does not fit the transmit or receive buffer.
    BufferOverflow,
    /// The broker sent bytes that do not parse as MQTT.
    Malformed,
    /// No PINGRESP arrived within one keepalive interval of a PINGREQ.
    KeepaliveTimeout,
    /// No CONNACK arrived in time after CONNECT.
    ConnAckTimeout,
    /// The transport failed.
    Transport(network::Error),
}

/// Invalid configuration values.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    Parse,
    /// The client identifier is empty.
    EmptyClientId,
    /// The broker hostname is empty.
    EmptyHostname,
    /// The publish topic is empty or contains wildcards.
    InvalidTopic,
    /// The trigger button index is outside `1..=32`.
    InvalidButtonIndex,
    /// The tick interval is zero.
    ZeroTickInterval,
    /// The message buffer size is zero.
    ZeroBufferSize,
    /// The buffer cannot hold the CONNECT or the button PUBLISH.
    BufferTooSmall,
}

/// Failures that stop the supervisor.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SupervisorError {
    /// Broker resolution failed during session configuration.
    Resolve(ResolveError),
    /// The session adapter rejected its configuration.
    Configure(SessionError),
    /// The supplied configuration is invalid.
    Config(ConfigError),
}

impl From<network::Error> for SessionError {
    fn from(err: network::Error) -> Self {
        SessionError::Transport(err)
    }
}

impl From<packet::Error> for SessionError {
    fn from(err: packet::Error) -> Self {
        match err {
            packet::Error::BufferOverflow => SessionError::BufferOverflow,
            packet::Error::Malformed => SessionError::Malformed,
        }
    }
}

impl From<ResolveError> for SupervisorError {
    fn from(err: ResolveError) -> Self {
        SupervisorError::Resolve(err)
    }
}

impl From<ConfigError> for SupervisorError {
    fn from(err: ConfigError) -> Self {
        SupervisorError::Config(err)
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Rejected => f.write_str("network rejected registration"),
            LinkError::Timeout => f.write_str("link registration timed out"),
            LinkError::Modem => f.write_str("modem fault"),
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::LookupFailed => f.write_str("address lookup failed"),
            ResolveError::NoUsableAddress => f.write_str("no IPv4 address in lookup result"),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::WouldBlock => f.write_str("would block"),
            SessionError::NotConfigured => f.write_str("session not configured"),
            SessionError::NotConnected => f.write_str("session not connected"),
            SessionError::ClientIdTooLong => f.write_str("client identifier too long"),
            SessionError::BufferTooLarge => f.write_str("buffer size exceeds capacity"),
            SessionError::BufferOverflow => f.write_str("packet exceeds buffer"),
            SessionError::Malformed => f.write_str("malformed packet"),
            SessionError::KeepaliveTimeout => f.write_str("keepalive timed out"),
            SessionError::ConnAckTimeout => f.write_str("no CONNACK from broker"),
            SessionError::Transport(err) => write!(f, "transport: {err}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConfigError::Parse => "invalid configuration document",
            ConfigError::EmptyClientId => "client identifier is empty",
            ConfigError::EmptyHostname => "broker hostname is empty",
            ConfigError::InvalidTopic => "publish topic is empty or has wildcards",
            ConfigError::InvalidButtonIndex => "button index must be within 1..=32",
            ConfigError::ZeroTickInterval => "tick interval must be positive",
            ConfigError::ZeroBufferSize => "buffer size must be positive",
            ConfigError::BufferTooSmall => "buffer size too small for CONNECT or PUBLISH",
        };
        f.write_str(text)
    }
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorError::Resolve(err) => write!(f, "broker resolution: {err}"),
            SupervisorError::Configure(err) => write!(f, "session configuration: {err}"),
            SupervisorError::Config(err) => write!(f, "configuration: {err}"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            LinkError::Rejected => defmt::write!(f, "Rejected"),
            LinkError::Timeout => defmt::write!(f, "Timeout"),
            LinkError::Modem => defmt::write!(f, "Modem"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ResolveError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ResolveError::LookupFailed => defmt::write!(f, "LookupFailed"),
            ResolveError::NoUsableAddress => defmt::write!(f, "NoUsableAddress"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SessionError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SessionError::WouldBlock => defmt::write!(f, "WouldBlock"),
            SessionError::NotConfigured => defmt::write!(f, "NotConfigured"),
            SessionError::NotConnected => defmt::write!(f, "NotConnected"),
            SessionError::ClientIdTooLong => defmt::write!(f, "ClientIdTooLong"),
            SessionError::BufferTooLarge => defmt::write!(f, "BufferTooLarge"),
            SessionError::BufferOverflow => defmt::write!(f, "BufferOverflow"),
            SessionError::Malformed => defmt::write!(f, "Malformed"),
            SessionError::KeepaliveTimeout => defmt::write!(f, "KeepaliveTimeout"),
            SessionError::ConnAckTimeout => defmt::write!(f, "ConnAckTimeout"),
            SessionError::Transport(err) => defmt::write!(f, "Transport({})", err),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConfigError::Parse => defmt::write!(f, "Parse"),
            ConfigError::EmptyClientId => defmt::write!(f, "EmptyClientId"),
            ConfigError::EmptyHostname => defmt::write!(f, "EmptyHostname"),
            ConfigError::InvalidTopic => defmt::write!(f, "InvalidTopic"),
            ConfigError::InvalidButtonIndex => defmt::write!(f, "InvalidButtonIndex"),
            ConfigError::ZeroTickInterval => defmt::write!(f, "ZeroTickInterval"),
            ConfigError::ZeroBufferSize => defmt::write!(f, "ZeroBufferSize"),
            ConfigError::BufferTooSmall => defmt::write!(f, "BufferTooSmall"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SupervisorError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SupervisorError::Resolve(err) => defmt::write!(f, "Resolve({})", err),
            SupervisorError::Configure(err) => defmt::write!(f, "Configure({})", err),
            SupervisorError::Config(err) => defmt::write!(f, "Config({})", err),
        }
    }
}
