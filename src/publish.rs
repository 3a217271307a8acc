//! Outbound publish path.
//!
//! [`PublishGateway`] stamps every application publish with a fresh random
//! message identifier and hands it to the session. A successful return means
//! the packet was accepted for transmission; for QoS 1 and 2 delivery is
//! confirmed later by a [`PubAck`](crate::session::InboundEvent::PubAck)
//! carrying the same identifier.

use rand_core::RngCore;

use crate::error::SessionError;
use crate::network::mqtt::QoS;
use crate::session::SessionAdapter;

/// A PUBLISH as handed to the session adapter.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct OutboundMessage<'a> {
    /// Topic name, no wildcards.
    pub topic: &'a str,
    /// Message body.
    pub payload: &'a [u8],
    /// Delivery guarantee.
    pub qos: QoS,
    /// Identifier used to match the acknowledgment.
    pub message_id: u16,
    /// Redelivery flag.
    pub dup: bool,
    /// Ask the broker to keep the message for future subscribers.
    pub retain: bool,
}

/// Builds [`OutboundMessage`]s and forwards them to a session.
#[derive(Debug)]
pub struct PublishGateway<R: RngCore> {
    rng: R,
    last_message_id: Option<u16>,
}

impl<R: RngCore> PublishGateway<R> {
    /// Gateway drawing identifiers from `rng`.
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            last_message_id: None,
        }
    }

    /// Identifier of the most recent publish attempt.
    pub fn last_message_id(&self) -> Option<u16> {
        self.last_message_id
    }

    /// Publish `payload` on `topic`.
    ///
    /// Returns the message identifier once the session accepted the packet.
    /// Failures are returned as-is and never retried here.
    pub fn publish<S: SessionAdapter>(
        &mut self,
        session: &mut S,
        topic: &str,
        payload: &[u8],
        qos: QoS,
    ) -> Result<u16, SessionError> {
        let message = OutboundMessage {
            topic,
            payload,
            qos,
            message_id: self.next_message_id(),
            dup: false,
            retain: false,
        };
        self.last_message_id = Some(message.message_id);

        debug!(
            "Publishing {} bytes to {} as id {}",
            payload.len(),
            topic,
            message.message_id
        );
        session.publish(&message)?;
        Ok(message.message_id)
    }

    /// Random non-zero identifier, never equal to the previous one.
    fn next_message_id(&mut self) -> u16 {
        loop {
            let id = self.rng.next_u32() as u16;
            if id != 0 && Some(id) != self.last_message_id {
                return id;
            }
        }
    }
}
