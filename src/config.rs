//! Runtime configuration.
//!
//! [`Config::default`] reproduces the constants the device firmware was
//! built with. A deployment can override any subset of them with a JSON
//! document:
//!
//! ```rust
//! use cellmqtt::config::Config;
//!
//! let config = Config::from_json(r#"{"client_id":"tracker-7","reconnect_delay_s":30}"#).unwrap();
//! assert_eq!(config.client_id.as_str(), "tracker-7");
//! assert_eq!(config.reconnect_delay_s, 30);
//! assert_eq!(config.broker_port, 1883);
//! ```

use heapless::String;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::network::mqtt::{QoS, packet};

/// Delay between radio link attempts, in seconds.
pub const DEFAULT_LINK_RETRY_DELAY_S: u32 = 120;
/// Delay before every session connect attempt except the first, in seconds.
pub const DEFAULT_RECONNECT_DELAY_S: u32 = 60;
/// Steady-state loop period, in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u32 = 1000;
/// MQTT keepalive interval, in seconds.
pub const DEFAULT_KEEPALIVE_S: u16 = 60;
/// Receive and transmit buffer size, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 128;
/// Unencrypted MQTT port.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Capacity of the client identifier string.
pub const MAX_CLIENT_ID_LEN: usize = 64;
/// Capacity of hostname, topic and payload strings.
pub const MAX_FIELD_LEN: usize = 128;

/// What to do when the broker hostname resolves to no IPv4 address.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    /// Stop the supervisor with `ResolveError::NoUsableAddress`.
    Fatal,
    /// Continue with the unspecified address `0.0.0.0`; every connect
    /// attempt will then fail and be retried.
    Unspecified,
}

/// What to do when servicing the session in the steady state fails.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeErrorPolicy {
    /// Log the error and keep ticking.
    LogOnly,
    /// Drop the session and reconnect after the reconnect delay.
    Reconnect,
}

/// Supervisor, session and trigger settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds to wait after a failed link attempt.
    pub link_retry_delay_s: u32,
    /// Seconds to wait before each session connect attempt after the first.
    pub reconnect_delay_s: u32,
    /// Milliseconds between steady-state ticks.
    pub tick_interval_ms: u32,
    /// MQTT keepalive interval in seconds; 0 disables pings.
    pub keepalive_s: u16,
    /// Size of each of the session's receive and transmit buffers.
    pub buffer_size: usize,
    /// MQTT client identifier.
    pub client_id: String<MAX_CLIENT_ID_LEN>,
    /// Hostname of the broker, resolved once at startup.
    pub broker_hostname: String<MAX_FIELD_LEN>,
    /// Broker TCP port.
    pub broker_port: u16,
    /// Topic the button event publishes to.
    pub publish_topic: String<MAX_FIELD_LEN>,
    /// Payload published on a button event.
    pub button_payload: String<MAX_FIELD_LEN>,
    /// 1-based index of the button that triggers a publish.
    pub button_index: u8,
    /// QoS of the button event publish.
    pub button_qos: QoS,
    /// Handling of a lookup that yields no IPv4 address.
    pub unresolved_policy: UnresolvedPolicy,
    /// Handling of input/keepalive errors while connected.
    pub runtime_error_policy: RuntimeErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            link_retry_delay_s: DEFAULT_LINK_RETRY_DELAY_S,
            reconnect_delay_s: DEFAULT_RECONNECT_DELAY_S,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            keepalive_s: DEFAULT_KEEPALIVE_S,
            buffer_size: DEFAULT_BUFFER_SIZE,
            client_id: fixed("my-client-id"),
            broker_hostname: fixed("mqtt.eclipseprojects.io"),
            broker_port: DEFAULT_BROKER_PORT,
            publish_topic: fixed("my/publish/topic"),
            button_payload: fixed("The message to publish on a button event"),
            button_index: 1,
            button_qos: QoS::AtLeastOnce,
            unresolved_policy: UnresolvedPolicy::Fatal,
            runtime_error_policy: RuntimeErrorPolicy::LogOnly,
        }
    }
}

impl Config {
    /// Parse a JSON document, filling absent fields from [`Config::default`],
    /// and validate the result.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let (config, _) =
            serde_json_core::from_str::<Config>(json).map_err(|_| ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values the supervisor relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::EmptyClientId);
        }
        if self.broker_hostname.is_empty() {
            return Err(ConfigError::EmptyHostname);
        }
        if self.publish_topic.is_empty() || self.publish_topic.contains(['+', '#']) {
            return Err(ConfigError::InvalidTopic);
        }
        if !(1..=32).contains(&self.button_index) {
            return Err(ConfigError::InvalidButtonIndex);
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        let connect = packet::connect_len(self.client_id.len());
        let publish = packet::publish_len(
            self.publish_topic.len(),
            self.button_payload.len(),
            self.button_qos,
        );
        if self.buffer_size < connect.max(publish) {
            return Err(ConfigError::BufferTooSmall);
        }
        Ok(())
    }

    /// Link retry delay in milliseconds.
    pub fn link_retry_delay_ms(&self) -> u32 {
        crate::time::secs_to_ms(self.link_retry_delay_s)
    }

    /// Session reconnect delay in milliseconds.
    pub fn reconnect_delay_ms(&self) -> u32 {
        crate::time::secs_to_ms(self.reconnect_delay_s)
    }
}

/// Copy a literal into a fixed-capacity string, truncating at capacity.
fn fixed<const N: usize>(text: &str) -> String<N> {
    let mut out = String::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn wildcard_topic_is_rejected() {
        let config = Config {
            publish_topic: fixed("sensors/#"),
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidTopic));
    }

    #[test]
    fn fixed_truncates_at_capacity() {
        let s: String<4> = fixed("abcdef");
        assert_eq!(s.as_str(), "abcd");
    }
}
