//! MQTT 3.1.1 control packet encoding and decoding.
//!
//! Outbound packets are serialized into a caller-provided fixed-capacity
//! buffer; inbound packets are parsed from the front of the receive buffer
//! without copying topic or payload bytes.

use heapless::Vec;
use serde::Deserialize;

// MQTT Control Packet types - these are the fixed header packet type values
/// MQTT CONNECT packet type identifier.
pub const CONNECT: u8 = 0x10;
/// MQTT CONNACK packet type identifier.
pub const CONNACK: u8 = 0x20;
/// MQTT PUBLISH packet type identifier.
pub const PUBLISH: u8 = 0x30;
/// MQTT PUBACK packet type identifier.
pub const PUBACK: u8 = 0x40;
/// MQTT SUBACK packet type identifier.
pub const SUBACK: u8 = 0x90;
/// MQTT PINGREQ packet type identifier.
pub const PINGREQ: u8 = 0xC0;
/// MQTT PINGRESP packet type identifier.
pub const PINGRESP: u8 = 0xD0;
/// MQTT DISCONNECT packet type identifier.
pub const DISCONNECT: u8 = 0xE0;

/// Protocol name carried in CONNECT.
const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT protocol level for version 3.1.1.
const PROTOCOL_LEVEL: u8 = 4;

/// Largest value the variable-length remaining length field can carry.
const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Quality of Service levels for MQTT messages.
///
/// ```rust
/// use cellmqtt::network::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::AtLeastOnce as u8, 1);
/// assert_eq!(QoS::ExactlyOnce as u8, 2);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QoS {
    /// **QoS 0**: fire and forget.
    AtMostOnce = 0,
    /// **QoS 1**: acknowledged with PUBACK, duplicates possible.
    AtLeastOnce = 1,
    /// **QoS 2**: four-way handshake, delivered once.
    ExactlyOnce = 2,
}

impl QoS {
    /// Decode the two QoS bits of a PUBLISH fixed header.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QoS {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "QoS{}", *self as u8)
    }
}

/// Codec failures.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The packet does not fit in the buffer.
    BufferOverflow,
    /// The bytes on the wire do not form a valid packet.
    Malformed,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::BufferOverflow => defmt::write!(f, "BufferOverflow"),
            Error::Malformed => defmt::write!(f, "Malformed"),
        }
    }
}

/// Fields of a CONNECT packet.
#[derive(Debug, Clone)]
pub struct ConnectOptions<'a> {
    /// The client identifier presented to the broker.
    pub client_id: &'a str,
    /// Keepalive interval in seconds, 0 disables it.
    pub keep_alive_seconds: u16,
    /// Ask the broker to discard previous session state.
    pub clean_session: bool,
}

/// Fields of an outbound PUBLISH packet.
#[derive(Debug, Clone, Copy)]
pub struct Publish<'a> {
    /// Topic name, without wildcards.
    pub topic: &'a str,
    /// Application payload.
    pub payload: &'a [u8],
    /// Delivery QoS.
    pub qos: QoS,
    /// Only encoded for QoS 1 and 2.
    pub message_id: u16,
    /// DUP flag.
    pub dup: bool,
    /// RETAIN flag.
    pub retain: bool,
}

/// A parsed inbound packet.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Packet {
    /// Connection acknowledgement.
    ConnAck {
        /// The broker resumed an existing session.
        session_present: bool,
        /// 0 means accepted.
        return_code: u8,
    },
    /// Message delivered by the broker.
    Publish {
        /// Delivery QoS.
        qos: QoS,
        /// Present for QoS 1 and 2.
        message_id: Option<u16>,
        /// Topic length in bytes.
        topic_len: usize,
        /// Payload length in bytes.
        payload_len: usize,
    },
    /// Publish acknowledgement.
    PubAck {
        /// Identifier of the acknowledged PUBLISH.
        message_id: u16,
    },
    /// Subscribe acknowledgement.
    SubAck {
        /// Identifier of the acknowledged SUBSCRIBE.
        message_id: u16,
    },
    /// Ping response.
    PingResp,
    /// Any other packet type, carrying the raw first header byte.
    Other(u8),
}

/// Encoded size of a CONNECT without will or credentials.
pub fn connect_len(client_id_len: usize) -> usize {
    framed_len(2 + PROTOCOL_NAME.len() + 1 + 1 + 2 + 2 + client_id_len)
}

/// Encoded size of a PUBLISH.
pub fn publish_len(topic_len: usize, payload_len: usize, qos: QoS) -> usize {
    let id_len = if qos == QoS::AtMostOnce { 0 } else { 2 };
    framed_len(2 + topic_len + id_len + payload_len)
}

/// Add the fixed header to a remaining length.
fn framed_len(remaining_len: usize) -> usize {
    let len_bytes = match remaining_len {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    };
    1 + len_bytes + remaining_len
}

/// Append a CONNECT packet to `out`.
pub fn encode_connect<const N: usize>(
    out: &mut Vec<u8, N>,
    options: &ConnectOptions<'_>,
) -> Result<(), Error> {
    let client_id = options.client_id.as_bytes();
    // protocol name (2 + 4), level, flags, keepalive (2), client id (2 + n)
    let remaining_len = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2 + 2 + client_id.len();

    let mut connect_flags = 0;
    if options.clean_session {
        connect_flags |= 0x02;
    }

    write_fixed_header(out, CONNECT, remaining_len)?;
    extend(out, &(PROTOCOL_NAME.len() as u16).to_be_bytes())?;
    extend(out, PROTOCOL_NAME)?;
    extend(out, &[PROTOCOL_LEVEL, connect_flags])?;
    extend(out, &options.keep_alive_seconds.to_be_bytes())?;
    write_str(out, client_id)
}

/// Append a PUBLISH packet to `out`.
pub fn encode_publish<const N: usize>(
    out: &mut Vec<u8, N>,
    publish: &Publish<'_>,
) -> Result<(), Error> {
    let topic = publish.topic.as_bytes();
    let id_len = if publish.qos == QoS::AtMostOnce { 0 } else { 2 };
    let remaining_len = 2 + topic.len() + id_len + publish.payload.len();

    let mut flags = PUBLISH | ((publish.qos as u8) << 1);
    if publish.dup {
        flags |= 0x08;
    }
    if publish.retain {
        flags |= 0x01;
    }

    write_fixed_header(out, flags, remaining_len)?;
    write_str(out, topic)?;
    if id_len > 0 {
        extend(out, &publish.message_id.to_be_bytes())?;
    }
    extend(out, publish.payload)
}

/// Append a PINGREQ packet to `out`.
pub fn encode_pingreq<const N: usize>(out: &mut Vec<u8, N>) -> Result<(), Error> {
    write_fixed_header(out, PINGREQ, 0)
}

/// Append a DISCONNECT packet to `out`.
pub fn encode_disconnect<const N: usize>(out: &mut Vec<u8, N>) -> Result<(), Error> {
    write_fixed_header(out, DISCONNECT, 0)
}

/// Parse one packet from the front of `buf`.
///
/// Returns `Ok(None)` while the packet is still incomplete, otherwise the
/// packet and the number of bytes it occupied.
pub fn decode(buf: &[u8]) -> Result<Option<(Packet, usize)>, Error> {
    let Some(&header) = buf.first() else {
        return Ok(None);
    };
    let Some((remaining_len, len_bytes)) = decode_remaining_length(&buf[1..])? else {
        return Ok(None);
    };
    let total = 1 + len_bytes + remaining_len;
    if buf.len() < total {
        return Ok(None);
    }
    let body = &buf[1 + len_bytes..total];

    let packet = match header & 0xF0 {
        CONNACK => {
            if body.len() != 2 {
                return Err(Error::Malformed);
            }
            Packet::ConnAck {
                session_present: body[0] & 0x01 != 0,
                return_code: body[1],
            }
        }
        PUBLISH => decode_publish(header, body)?,
        PUBACK => Packet::PubAck {
            message_id: read_u16(body)?,
        },
        SUBACK => Packet::SubAck {
            message_id: read_u16(body)?,
        },
        PINGRESP => Packet::PingResp,
        _ => Packet::Other(header),
    };

    Ok(Some((packet, total)))
}

fn decode_publish(header: u8, body: &[u8]) -> Result<Packet, Error> {
    let qos = QoS::from_bits((header >> 1) & 0x03).ok_or(Error::Malformed)?;
    let topic_len = read_u16(body)? as usize;
    let mut offset = 2 + topic_len;
    if body.len() < offset {
        return Err(Error::Malformed);
    }
    let message_id = if qos == QoS::AtMostOnce {
        None
    } else {
        let id = read_u16(&body[offset..])?;
        offset += 2;
        Some(id)
    };
    Ok(Packet::Publish {
        qos,
        message_id,
        topic_len,
        payload_len: body.len() - offset,
    })
}

fn read_u16(bytes: &[u8]) -> Result<u16, Error> {
    match bytes {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(Error::Malformed),
    }
}

fn write_fixed_header<const N: usize>(
    out: &mut Vec<u8, N>,
    first_byte: u8,
    remaining_len: usize,
) -> Result<(), Error> {
    let mut fixed_header: Vec<u8, 5> = Vec::new();
    fixed_header.push(first_byte).map_err(|_| Error::BufferOverflow)?;
    encode_remaining_length(&mut fixed_header, remaining_len)?;
    extend(out, &fixed_header)
}

fn write_str<const N: usize>(out: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), Error> {
    let len = u16::try_from(bytes.len()).map_err(|_| Error::Malformed)?;
    extend(out, &len.to_be_bytes())?;
    extend(out, bytes)
}

fn extend<const N: usize>(out: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), Error> {
    out.extend_from_slice(bytes)
        .map_err(|_| Error::BufferOverflow)
}

/// Encode the remaining length field for an MQTT packet.
///
/// Each byte carries 7 bits of the length, least significant group first;
/// the high bit flags that another byte follows. Four bytes cover values up
/// to 268,435,455.
fn encode_remaining_length(buf: &mut Vec<u8, 5>, mut len: usize) -> Result<(), Error> {
    if len > MAX_REMAINING_LENGTH {
        return Err(Error::Malformed);
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte).map_err(|_| Error::BufferOverflow)?;
        if len == 0 {
            break;
        }
    }
    Ok(())
}

/// Returns the decoded length and how many bytes encoded it, or `None` if
/// the field is not complete yet.
fn decode_remaining_length(bytes: &[u8]) -> Result<Option<(usize, usize)>, Error> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, &byte) in bytes.iter().enumerate() {
        if i == 4 {
            return Err(Error::Malformed);
        }
        value += (byte as usize & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        multiplier *= 128;
    }
    if bytes.len() >= 4 {
        return Err(Error::Malformed);
    }
    Ok(None)
}
