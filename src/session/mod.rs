//! Protocol session.
//!
//! A [`SessionAdapter`] owns everything about the broker session: buffers,
//! client identifier, endpoint and state. All operations return promptly;
//! results that arrive later (CONNACK, PUBACK, a dropped connection) are
//! queued as [`InboundEvent`]s and drained by the supervisor once per tick
//! through [`SessionAdapter::next_event`].

use crate::error::SessionError;
use crate::network;
use crate::network::mqtt::QoS;
use crate::publish::OutboundMessage;
use crate::resolver::BrokerEndpoint;

mod mqtt;

pub use mqtt::{CONNACK_TIMEOUT_MS, ClientSession, EVENT_QUEUE_LEN, MqttSession};

/// Session lifecycle as seen by the adapter.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SessionState {
    /// No transport, or the transport was torn down.
    Disconnected,
    /// CONNECT sent, waiting for CONNACK.
    Connecting,
    /// CONNACK accepted.
    Connected,
}

/// Why a session dropped.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DisconnectReason {
    /// The broker closed the stream.
    PeerClosed,
    /// Reading or writing the transport failed.
    Transport(network::Error),
    /// The broker sent something that is not MQTT.
    Malformed,
    /// An inbound packet did not fit the receive buffer.
    BufferOverflow,
    /// A PINGREQ went unanswered for a whole keepalive interval.
    KeepaliveTimeout,
    /// CONNECT went unanswered.
    ConnAckTimeout,
}

/// Something the broker (or the transport) told us.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InboundEvent {
    /// CONNACK; a return code of 0 means accepted.
    ConnAck {
        /// CONNACK return code.
        return_code: u8,
    },
    /// The session dropped.
    Disconnected(DisconnectReason),
    /// The broker delivered a message.
    PublishReceived {
        /// Delivery QoS chosen by the broker.
        qos: QoS,
        /// Present for QoS 1 and 2.
        message_id: Option<u16>,
        /// Payload size in bytes.
        payload_len: usize,
    },
    /// PUBACK for the publish with this identifier.
    PubAck(u16),
    /// SUBACK for the subscribe with this identifier.
    SubAck(u16),
    /// PINGRESP.
    PingResp,
    /// Any other packet, by control packet type (high nibble of byte 0).
    Unrecognized(u8),
}

impl InboundEvent {
    /// True for a CONNACK refusing the connection or a dropped session.
    pub fn ends_session(&self) -> bool {
        match self {
            InboundEvent::ConnAck { return_code } => *return_code != 0,
            InboundEvent::Disconnected(_) => true,
            _ => false,
        }
    }
}

/// Values the session needs before its first connect.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings<'a> {
    /// Where to connect.
    pub endpoint: BrokerEndpoint,
    /// MQTT client identifier.
    pub client_id: &'a str,
    /// Keepalive interval in seconds, 0 disables pings.
    pub keepalive_s: u16,
    /// Usable size of each of the receive and transmit buffers.
    pub buffer_size: usize,
}

/// Connect, publish and service operations on the single broker session.
pub trait SessionAdapter {
    /// Store endpoint, identity and buffer limits. Fails if they do not fit
    /// the adapter.
    fn configure(&mut self, settings: &SessionSettings<'_>) -> Result<(), SessionError>;

    /// Open the transport and send CONNECT. Success means the request went
    /// out; acceptance arrives later as [`InboundEvent::ConnAck`].
    fn connect(&mut self) -> Result<(), SessionError>;

    /// Queue a PUBLISH for transmission.
    fn publish(&mut self, message: &OutboundMessage<'_>) -> Result<(), SessionError>;

    /// Read whatever the transport has and turn complete packets into
    /// events. Never blocks.
    fn input(&mut self) -> Result<(), SessionError>;

    /// Service keepalive, and give up on a CONNECT the broker never
    /// answered. Returns [`SessionError::WouldBlock`] when nothing is due yet.
    fn live(&mut self) -> Result<(), SessionError>;

    /// Send DISCONNECT and close the transport.
    fn disconnect(&mut self) -> Result<(), SessionError>;

    /// Pop the oldest queued event.
    fn next_event(&mut self) -> Option<InboundEvent>;

    /// Current session state.
    fn state(&self) -> SessionState;
}

impl<S: SessionAdapter + ?Sized> SessionAdapter for &mut S {
    fn configure(&mut self, settings: &SessionSettings<'_>) -> Result<(), SessionError> {
        (**self).configure(settings)
    }

    fn connect(&mut self) -> Result<(), SessionError> {
        (**self).connect()
    }

    fn publish(&mut self, message: &OutboundMessage<'_>) -> Result<(), SessionError> {
        (**self).publish(message)
    }

    fn input(&mut self) -> Result<(), SessionError> {
        (**self).input()
    }

    fn live(&mut self) -> Result<(), SessionError> {
        (**self).live()
    }

    fn disconnect(&mut self) -> Result<(), SessionError> {
        (**self).disconnect()
    }

    fn next_event(&mut self) -> Option<InboundEvent> {
        (**self).next_event()
    }

    fn state(&self) -> SessionState {
        (**self).state()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SessionState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SessionState::Disconnected => defmt::write!(f, "Disconnected"),
            SessionState::Connecting => defmt::write!(f, "Connecting"),
            SessionState::Connected => defmt::write!(f, "Connected"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DisconnectReason {
    fn format(&self, f: defmt::Formatter) {
        match self {
            DisconnectReason::PeerClosed => defmt::write!(f, "PeerClosed"),
            DisconnectReason::Transport(err) => defmt::write!(f, "Transport({})", err),
            DisconnectReason::Malformed => defmt::write!(f, "Malformed"),
            DisconnectReason::BufferOverflow => defmt::write!(f, "BufferOverflow"),
            DisconnectReason::KeepaliveTimeout => defmt::write!(f, "KeepaliveTimeout"),
            DisconnectReason::ConnAckTimeout => defmt::write!(f, "ConnAckTimeout"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for InboundEvent {
    fn format(&self, f: defmt::Formatter) {
        match self {
            InboundEvent::ConnAck { return_code } => defmt::write!(f, "ConnAck({})", return_code),
            InboundEvent::Disconnected(reason) => defmt::write!(f, "Disconnected({})", reason),
            InboundEvent::PublishReceived {
                qos, payload_len, ..
            } => defmt::write!(f, "PublishReceived({}, {} bytes)", qos, payload_len),
            InboundEvent::PubAck(id) => defmt::write!(f, "PubAck({})", id),
            InboundEvent::SubAck(id) => defmt::write!(f, "SubAck({})", id),
            InboundEvent::PingResp => defmt::write!(f, "PingResp"),
            InboundEvent::Unrecognized(kind) => defmt::write!(f, "Unrecognized({})", kind),
        }
    }
}
