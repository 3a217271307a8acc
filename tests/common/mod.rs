//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddrV4};

use cellmqtt::error::{LinkError, ResolveError, SessionError};
use cellmqtt::link::Modem;
use cellmqtt::network::mqtt::QoS;
use cellmqtt::network::{self, prelude::*};
use cellmqtt::publish::OutboundMessage;
use cellmqtt::resolver::{BrokerEndpoint, Candidates, Dns};
use cellmqtt::session::{InboundEvent, SessionAdapter, SessionSettings, SessionState};
use cellmqtt::time::{Clock, Delay};
use rand::RngCore;

/// Modem whose connect attempts follow a script; succeeds once the script runs out.
#[derive(Debug, Default)]
pub struct MockModem {
    pub script: VecDeque<Result<(), LinkError>>,
    pub connects: usize,
    pub power_requests: Vec<(&'static str, bool)>,
}

impl MockModem {
    /// Fail `failures` times, then come up.
    pub fn failing(failures: usize) -> Self {
        Self {
            script: std::iter::repeat_n(Err(LinkError::Rejected), failures).collect(),
            ..Self::default()
        }
    }
}

impl Modem for MockModem {
    fn request_psm(&mut self, enable: bool) -> Result<(), LinkError> {
        self.power_requests.push(("psm", enable));
        Ok(())
    }

    fn request_edrx(&mut self, enable: bool) -> Result<(), LinkError> {
        self.power_requests.push(("edrx", enable));
        Ok(())
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        self.connects += 1;
        self.script.pop_front().unwrap_or(Ok(()))
    }
}

/// Resolver returning a fixed answer.
#[derive(Debug)]
pub struct MockDns {
    pub answer: Result<Vec<IpAddr>, ResolveError>,
    pub lookups: Vec<String>,
}

impl MockDns {
    pub fn with(addrs: &[IpAddr]) -> Self {
        Self {
            answer: Ok(addrs.to_vec()),
            lookups: Vec::new(),
        }
    }

    pub fn ipv4(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self::with(&[IpAddr::from([a, b, c, d])])
    }

    pub fn failing(err: ResolveError) -> Self {
        Self {
            answer: Err(err),
            lookups: Vec::new(),
        }
    }
}

impl Dns for MockDns {
    fn lookup(&mut self, hostname: &str) -> Result<Candidates, ResolveError> {
        self.lookups.push(hostname.to_string());
        let addrs = self.answer.clone()?;
        let mut candidates = Candidates::new();
        for addr in addrs {
            candidates.push(addr).unwrap();
        }
        Ok(candidates)
    }
}

/// A publish as seen by [`MockSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPublish {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub message_id: u16,
    pub dup: bool,
    pub retain: bool,
}

/// Session adapter with scripted results and a record of every call.
#[derive(Debug)]
pub struct MockSession {
    pub connect_script: VecDeque<Result<(), SessionError>>,
    pub input_script: VecDeque<Result<(), SessionError>>,
    pub live_script: VecDeque<Result<(), SessionError>>,
    pub configure_result: Result<(), SessionError>,
    pub publish_result: Result<(), SessionError>,
    pub events: VecDeque<InboundEvent>,
    pub configured: Option<(BrokerEndpoint, String)>,
    pub published: Vec<SentPublish>,
    pub connects: usize,
    pub inputs: usize,
    pub lives: usize,
    pub disconnects: usize,
    pub state: SessionState,
}

impl Default for MockSession {
    fn default() -> Self {
        Self {
            connect_script: VecDeque::new(),
            input_script: VecDeque::new(),
            live_script: VecDeque::new(),
            configure_result: Ok(()),
            publish_result: Ok(()),
            events: VecDeque::new(),
            configured: None,
            published: Vec::new(),
            connects: 0,
            inputs: 0,
            lives: 0,
            disconnects: 0,
            state: SessionState::Disconnected,
        }
    }
}

impl MockSession {
    /// Connect fails `failures` times, then succeeds.
    pub fn failing_connects(failures: usize) -> Self {
        Self {
            connect_script: std::iter::repeat_n(
                Err(SessionError::Transport(network::Error::ConnectionRefused)),
                failures,
            )
            .collect(),
            ..Self::default()
        }
    }
}

impl SessionAdapter for MockSession {
    fn configure(&mut self, settings: &SessionSettings<'_>) -> Result<(), SessionError> {
        self.configure_result?;
        self.configured = Some((settings.endpoint, settings.client_id.to_string()));
        Ok(())
    }

    fn connect(&mut self) -> Result<(), SessionError> {
        self.connects += 1;
        let result = self.connect_script.pop_front().unwrap_or(Ok(()));
        self.state = match result {
            Ok(()) => SessionState::Connecting,
            Err(_) => SessionState::Disconnected,
        };
        result
    }

    fn publish(&mut self, message: &OutboundMessage<'_>) -> Result<(), SessionError> {
        self.publish_result?;
        self.published.push(SentPublish {
            topic: message.topic.to_string(),
            payload: message.payload.to_vec(),
            qos: message.qos,
            message_id: message.message_id,
            dup: message.dup,
            retain: message.retain,
        });
        Ok(())
    }

    fn input(&mut self) -> Result<(), SessionError> {
        self.inputs += 1;
        self.input_script.pop_front().unwrap_or(Ok(()))
    }

    fn live(&mut self) -> Result<(), SessionError> {
        self.lives += 1;
        self.live_script
            .pop_front()
            .unwrap_or(Err(SessionError::WouldBlock))
    }

    fn disconnect(&mut self) -> Result<(), SessionError> {
        self.disconnects += 1;
        self.state = SessionState::Disconnected;
        Ok(())
    }

    fn next_event(&mut self) -> Option<InboundEvent> {
        self.events.pop_front()
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

/// Records every requested delay instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub calls: Vec<u32>,
}

impl Delay for RecordingDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.calls.push(ms);
    }
}

/// Manually advanced clock.
#[derive(Debug, Default)]
pub struct MockClock {
    now: Cell<u64>,
}

impl MockClock {
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// RNG replaying fixed 32-bit values, then counting up from the last one.
#[derive(Debug)]
pub struct SequenceRng {
    values: VecDeque<u32>,
    last: u32,
}

impl SequenceRng {
    pub fn new(values: &[u32]) -> Self {
        Self {
            values: values.iter().copied().collect(),
            last: 0,
        }
    }
}

impl RngCore for SequenceRng {
    fn next_u32(&mut self) -> u32 {
        self.last = self.values.pop_front().unwrap_or(self.last.wrapping_add(1));
        self.last
    }

    fn next_u64(&mut self) -> u64 {
        u64::from(self.next_u32())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for byte in dest {
            *byte = self.next_u32() as u8;
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// In-memory transport. Inbound bytes are queued by the test; outbound
/// bytes are collected.
#[derive(Debug, Default)]
pub struct MockConnection {
    pub inbound: VecDeque<u8>,
    pub written: Vec<u8>,
    pub closed_by_peer: bool,
    pub read_error: Option<network::Error>,
    pub write_error: Option<network::Error>,
}

impl MockConnection {
    pub fn feed(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Take everything written so far.
    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }
}

impl Read for MockConnection {
    type Error = network::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if let Some(err) = self.read_error {
            return Err(err);
        }
        if self.inbound.is_empty() {
            if self.closed_by_peer {
                return Err(network::Error::ConnectionClosed);
            }
            return Ok(0);
        }
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockConnection {
    type Error = network::Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if let Some(err) = self.write_error {
            return Err(err);
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = network::Error;

    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for MockConnection {}

/// Connector whose attempts follow a script; connects once the script runs out.
#[derive(Debug, Default)]
pub struct MockConnector {
    pub script: VecDeque<Result<(), network::Error>>,
    pub remotes: Vec<SocketAddrV4>,
}

impl Connect for MockConnector {
    type Connection = MockConnection;
    type Error = network::Error;

    fn connect(&mut self, remote: SocketAddrV4) -> Result<Self::Connection, Self::Error> {
        self.remotes.push(remote);
        self.script.pop_front().unwrap_or(Ok(()))?;
        Ok(MockConnection::default())
    }
}

/// CONNACK with the given return code.
pub fn connack(return_code: u8) -> [u8; 4] {
    [0x20, 0x02, 0x00, return_code]
}

/// PUBACK for `id`.
pub fn puback(id: u16) -> [u8; 4] {
    let [hi, lo] = id.to_be_bytes();
    [0x40, 0x02, hi, lo]
}

pub const PINGRESP: [u8; 2] = [0xD0, 0x00];
