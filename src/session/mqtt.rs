//! MQTT 3.1.1 session over a non-blocking stream transport.

use heapless::{Deque, String, Vec};

use super::{DisconnectReason, InboundEvent, SessionAdapter, SessionSettings, SessionState};
use crate::config::{DEFAULT_BUFFER_SIZE, MAX_CLIENT_ID_LEN};
use crate::error::SessionError;
use crate::network::mqtt::packet::{self, ConnectOptions, Packet, Publish};
use crate::network::{self, Close, Connect, Read};
use crate::publish::OutboundMessage;
use crate::resolver::BrokerEndpoint;
use crate::time::Clock;

/// Events buffered between two drains by the supervisor.
pub const EVENT_QUEUE_LEN: usize = 8;

/// Bytes pulled from the transport per read call.
const READ_CHUNK: usize = 64;

/// How long to wait for CONNACK when keepalive is disabled, in milliseconds.
pub const CONNACK_TIMEOUT_MS: u64 = 30_000;

/// Session state owned by [`MqttSession`].
///
/// `SIZE` is the capacity of each buffer; the configured buffer size may
/// only narrow it.
#[derive(Debug)]
pub struct ClientSession<const SIZE: usize> {
    rx: Vec<u8, SIZE>,
    tx: Vec<u8, SIZE>,
    buffer_limit: usize,
    client_id: String<MAX_CLIENT_ID_LEN>,
    endpoint: Option<BrokerEndpoint>,
    keepalive_ms: u64,
    state: SessionState,
}

impl<const SIZE: usize> ClientSession<SIZE> {
    fn new() -> Self {
        Self {
            rx: Vec::new(),
            tx: Vec::new(),
            buffer_limit: SIZE,
            client_id: String::new(),
            endpoint: None,
            keepalive_ms: 0,
            state: SessionState::Disconnected,
        }
    }

    /// Identifier presented in CONNECT.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Broker endpoint, once configured.
    pub fn endpoint(&self) -> Option<BrokerEndpoint> {
        self.endpoint
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Usable bytes in each buffer.
    pub fn buffer_limit(&self) -> usize {
        self.buffer_limit
    }

    fn check_tx_limit(&self) -> Result<(), SessionError> {
        if self.tx.len() > self.buffer_limit {
            return Err(SessionError::BufferOverflow);
        }
        Ok(())
    }

    /// Drop the first `used` bytes of the receive buffer.
    fn consume_rx(&mut self, used: usize) {
        let len = self.rx.len();
        self.rx.copy_within(used..len, 0);
        self.rx.truncate(len - used);
    }
}

/// [`SessionAdapter`] speaking MQTT 3.1.1 through a [`Connect`]or.
///
/// One connection at a time; `connect` closes any previous one first.
pub struct MqttSession<N: Connect, C: Clock, const SIZE: usize = DEFAULT_BUFFER_SIZE> {
    connector: N,
    clock: C,
    connection: Option<N::Connection>,
    session: ClientSession<SIZE>,
    events: Deque<InboundEvent, EVENT_QUEUE_LEN>,
    last_tx_ms: u64,
    ping_outstanding: bool,
}

impl<N: Connect, C: Clock, const SIZE: usize> core::fmt::Debug for MqttSession<N, C, SIZE> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MqttSession")
            .field("session", &self.session)
            .field("connected", &self.connection.is_some())
            .field("queued_events", &self.events.len())
            .field("ping_outstanding", &self.ping_outstanding)
            .finish_non_exhaustive()
    }
}

impl<N: Connect, C: Clock, const SIZE: usize> MqttSession<N, C, SIZE> {
    /// New, unconfigured session.
    pub fn new(connector: N, clock: C) -> Self {
        Self {
            connector,
            clock,
            connection: None,
            session: ClientSession::new(),
            events: Deque::new(),
            last_tx_ms: 0,
            ping_outstanding: false,
        }
    }

    /// Inspect the owned session state.
    pub fn session(&self) -> &ClientSession<SIZE> {
        &self.session
    }

    /// Borrow the live connection, if any.
    pub fn connection(&self) -> Option<&N::Connection> {
        self.connection.as_ref()
    }

    /// Mutably borrow the live connection, if any.
    pub fn connection_mut(&mut self) -> Option<&mut N::Connection> {
        self.connection.as_mut()
    }

    fn push_event(&mut self, event: InboundEvent) {
        if self.events.is_full() {
            warn!("Event queue full, dropping oldest event");
            self.events.pop_front();
        }
        // Room was made above.
        let _ = self.events.push_back(event);
    }

    /// Write the transmit buffer out.
    fn flush_tx(&mut self) -> Result<(), SessionError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(SessionError::NotConnected);
        };
        match network::write_all(connection, &self.session.tx) {
            Ok(()) => {
                self.last_tx_ms = self.clock.now_ms();
                Ok(())
            }
            Err(err) => {
                self.teardown(DisconnectReason::Transport(err));
                Err(SessionError::Transport(err))
            }
        }
    }

    fn close_transport(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(err) = connection.close() {
                let err: network::Error = err.into();
                debug!("Closing transport failed: {:?}", err);
            }
        }
        self.session.rx.clear();
        self.session.state = SessionState::Disconnected;
        self.ping_outstanding = false;
    }

    /// Close the transport and report why.
    fn teardown(&mut self, reason: DisconnectReason) {
        info!("MQTT client disconnected: {:?}", reason);
        self.close_transport();
        self.push_event(InboundEvent::Disconnected(reason));
    }

    fn handle_packet(&mut self, packet: Packet) {
        let event = match packet {
            Packet::ConnAck { return_code, .. } => {
                if return_code == 0 {
                    self.session.state = SessionState::Connected;
                } else {
                    self.close_transport();
                }
                InboundEvent::ConnAck { return_code }
            }
            Packet::Publish {
                qos,
                message_id,
                payload_len,
                ..
            } => InboundEvent::PublishReceived {
                qos,
                message_id,
                payload_len,
            },
            Packet::PubAck { message_id } => InboundEvent::PubAck(message_id),
            Packet::SubAck { message_id } => InboundEvent::SubAck(message_id),
            Packet::PingResp => {
                self.ping_outstanding = false;
                InboundEvent::PingResp
            }
            Packet::Other(header) => InboundEvent::Unrecognized(header >> 4),
        };
        self.push_event(event);
    }

    /// Turn every complete packet at the front of the receive buffer into an event.
    fn drain_rx(&mut self) -> Result<(), SessionError> {
        loop {
            match packet::decode(&self.session.rx) {
                Ok(Some((packet, used))) => {
                    self.session.consume_rx(used);
                    self.handle_packet(packet);
                    if self.connection.is_none() {
                        return Ok(());
                    }
                }
                Ok(None) => return Ok(()),
                Err(err) => {
                    self.teardown(DisconnectReason::Malformed);
                    return Err(err.into());
                }
            }
        }
    }
}

impl<N: Connect, C: Clock, const SIZE: usize> SessionAdapter for MqttSession<N, C, SIZE> {
    fn configure(&mut self, settings: &SessionSettings<'_>) -> Result<(), SessionError> {
        if settings.buffer_size > SIZE {
            return Err(SessionError::BufferTooLarge);
        }
        let client_id =
            String::try_from(settings.client_id).map_err(|_| SessionError::ClientIdTooLong)?;

        self.close_transport();
        self.session.client_id = client_id;
        self.session.endpoint = Some(settings.endpoint);
        self.session.buffer_limit = settings.buffer_size;
        self.session.keepalive_ms = u64::from(settings.keepalive_s) * 1000;
        debug!(
            "Session configured for {} as {}",
            settings.endpoint,
            settings.client_id
        );
        Ok(())
    }

    fn connect(&mut self) -> Result<(), SessionError> {
        let endpoint = self.session.endpoint.ok_or(SessionError::NotConfigured)?;
        self.close_transport();
        // Anything still queued belongs to the previous connection.
        self.events.clear();

        let connection = self
            .connector
            .connect(endpoint.socket_addr())
            .map_err(|err| SessionError::Transport(err.into()))?;
        self.connection = Some(connection);
        self.session.state = SessionState::Connecting;

        self.session.tx.clear();
        let options = ConnectOptions {
            client_id: &self.session.client_id,
            keep_alive_seconds: (self.session.keepalive_ms / 1000) as u16,
            clean_session: true,
        };
        let encoded = packet::encode_connect(&mut self.session.tx, &options)
            .map_err(SessionError::from)
            .and_then(|()| self.session.check_tx_limit());
        if let Err(err) = encoded {
            self.close_transport();
            return Err(err);
        }

        let sent = match self.connection.as_mut() {
            Some(connection) => network::write_all(connection, &self.session.tx),
            None => Err(network::Error::NotOpen),
        };
        match sent {
            Ok(()) => {
                self.last_tx_ms = self.clock.now_ms();
                self.ping_outstanding = false;
                Ok(())
            }
            Err(err) => {
                self.close_transport();
                Err(SessionError::Transport(err))
            }
        }
    }

    fn publish(&mut self, message: &OutboundMessage<'_>) -> Result<(), SessionError> {
        if self.session.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }

        self.session.tx.clear();
        let publish = Publish {
            topic: message.topic,
            payload: message.payload,
            qos: message.qos,
            message_id: message.message_id,
            dup: message.dup,
            retain: message.retain,
        };
        packet::encode_publish(&mut self.session.tx, &publish)?;
        self.session.check_tx_limit()?;
        self.flush_tx()
    }

    fn input(&mut self) -> Result<(), SessionError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let free = self.session.buffer_limit.saturating_sub(self.session.rx.len());
            if free == 0 {
                self.teardown(DisconnectReason::BufferOverflow);
                return Err(SessionError::BufferOverflow);
            }
            let Some(connection) = self.connection.as_mut() else {
                return Err(SessionError::NotConnected);
            };
            let want = free.min(READ_CHUNK);
            match connection.read(&mut chunk[..want]) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    // `want` never exceeds the remaining capacity.
                    let _ = self.session.rx.extend_from_slice(&chunk[..n]);
                    self.drain_rx()?;
                }
                Err(err) => {
                    let err: network::Error = err.into();
                    let reason = match err {
                        network::Error::ConnectionClosed => DisconnectReason::PeerClosed,
                        other => DisconnectReason::Transport(other),
                    };
                    self.teardown(reason);
                    return Err(SessionError::Transport(err));
                }
            }
        }
    }

    fn live(&mut self) -> Result<(), SessionError> {
        let elapsed = self.clock.now_ms().saturating_sub(self.last_tx_ms);
        match self.session.state {
            SessionState::Disconnected => return Err(SessionError::NotConnected),
            SessionState::Connecting => {
                // `last_tx_ms` still marks the CONNECT write.
                let timeout_ms = match self.session.keepalive_ms {
                    0 => CONNACK_TIMEOUT_MS,
                    keepalive_ms => keepalive_ms,
                };
                if elapsed < timeout_ms {
                    return Err(SessionError::WouldBlock);
                }
                self.teardown(DisconnectReason::ConnAckTimeout);
                return Err(SessionError::ConnAckTimeout);
            }
            SessionState::Connected => {}
        }
        if self.session.keepalive_ms == 0 {
            return Err(SessionError::WouldBlock);
        }
        if elapsed < self.session.keepalive_ms {
            return Err(SessionError::WouldBlock);
        }
        if self.ping_outstanding {
            self.teardown(DisconnectReason::KeepaliveTimeout);
            return Err(SessionError::KeepaliveTimeout);
        }

        self.session.tx.clear();
        packet::encode_pingreq(&mut self.session.tx)?;
        self.flush_tx()?;
        self.ping_outstanding = true;
        trace!("PINGREQ sent");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), SessionError> {
        if self.connection.is_none() {
            self.session.state = SessionState::Disconnected;
            return Ok(());
        }
        self.session.tx.clear();
        packet::encode_disconnect(&mut self.session.tx)?;
        let sent = self.flush_tx();
        self.close_transport();
        sent
    }

    fn next_event(&mut self) -> Option<InboundEvent> {
        self.events.pop_front()
    }

    fn state(&self) -> SessionState {
        self.session.state
    }
}
