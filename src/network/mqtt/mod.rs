//! MQTT 3.1.1 wire format.
//!
//! Only the packets a publishing device needs are encoded (CONNECT,
//! PUBLISH, PINGREQ, DISCONNECT). Inbound parsing recognizes CONNACK,
//! PUBLISH, PUBACK, SUBACK and PINGRESP and reports anything else as
//! [`Packet::Other`].

/// Packet constants, encoders and the inbound decoder.
pub mod packet;

pub use packet::{ConnectOptions, Packet, Publish, QoS};
