//! Connection-lifecycle supervisor.
//!
//! [`ConnectionSupervisor`] drives the device from power-on to a live broker
//! session and keeps it there:
//!
//! ```text
//! Init -> LinkAcquiring -> SessionConfiguring -> SessionConnecting -> Connected
//!              ^   |                                  ^   |             |
//!              +---+ link retry delay                 +---+ reconnect   |
//!                                                     ^     delay      |
//!                                                     +-----------------+
//!                                                      session dropped
//! ```
//!
//! Everything runs on the caller's thread. [`ConnectionSupervisor::step`]
//! performs the work of one state and returns the next one, which makes the
//! machine easy to drive from tests; [`ConnectionSupervisor::run`] loops it
//! forever and only returns on a fatal error.
//!
//! ```rust
//! use cellmqtt::config::Config;
//! use cellmqtt::error::{LinkError, ResolveError, SessionError};
//! use cellmqtt::input::NoEvents;
//! use cellmqtt::publish::OutboundMessage;
//! use cellmqtt::resolver::{Candidates, Dns};
//! use cellmqtt::session::{InboundEvent, SessionAdapter, SessionSettings, SessionState};
//! use cellmqtt::supervisor::{ConnectionSupervisor, State};
//! use cellmqtt::link::Modem;
//! use cellmqtt::time::Delay;
//! use rand::SeedableRng;
//!
//! struct AlwaysUp;
//! impl Modem for AlwaysUp {
//!     fn request_psm(&mut self, _: bool) -> Result<(), LinkError> { Ok(()) }
//!     fn request_edrx(&mut self, _: bool) -> Result<(), LinkError> { Ok(()) }
//!     fn connect(&mut self) -> Result<(), LinkError> { Ok(()) }
//! }
//!
//! struct Loopback;
//! impl Dns for Loopback {
//!     fn lookup(&mut self, _: &str) -> Result<Candidates, ResolveError> {
//!         let mut out = Candidates::new();
//!         out.push([127, 0, 0, 1].into()).unwrap();
//!         Ok(out)
//!     }
//! }
//!
//! struct Accepting(SessionState);
//! impl SessionAdapter for Accepting {
//!     fn configure(&mut self, _: &SessionSettings<'_>) -> Result<(), SessionError> { Ok(()) }
//!     fn connect(&mut self) -> Result<(), SessionError> {
//!         self.0 = SessionState::Connected;
//!         Ok(())
//!     }
//!     fn publish(&mut self, _: &OutboundMessage<'_>) -> Result<(), SessionError> { Ok(()) }
//!     fn input(&mut self) -> Result<(), SessionError> { Ok(()) }
//!     fn live(&mut self) -> Result<(), SessionError> { Err(SessionError::WouldBlock) }
//!     fn disconnect(&mut self) -> Result<(), SessionError> { Ok(()) }
//!     fn next_event(&mut self) -> Option<InboundEvent> { None }
//!     fn state(&self) -> SessionState { self.0 }
//! }
//!
//! struct NoSleep;
//! impl Delay for NoSleep {
//!     fn delay_ms(&mut self, _: u32) {}
//! }
//!
//! let mut supervisor = ConnectionSupervisor::new(
//!     Config::default(),
//!     AlwaysUp,
//!     Loopback,
//!     Accepting(SessionState::Disconnected),
//!     NoSleep,
//!     NoEvents,
//!     rand::rngs::StdRng::seed_from_u64(7),
//! )
//! .unwrap();
//!
//! while supervisor.state() != State::Connected {
//!     supervisor.step().unwrap();
//! }
//! assert_eq!(supervisor.endpoint().unwrap().to_string(), "127.0.0.1:1883");
//! ```

use core::convert::Infallible;

use rand_core::RngCore;

use crate::config::{Config, RuntimeErrorPolicy, UnresolvedPolicy};
use crate::error::{ConfigError, ResolveError, SessionError, SupervisorError};
use crate::input::{EventSource, TriggerBinding};
use crate::link::{LinkManager, Modem};
use crate::publish::PublishGateway;
use crate::resolver::{BrokerEndpoint, BrokerResolver, Dns};
use crate::session::{InboundEvent, SessionAdapter, SessionSettings};
use crate::time::Delay;

/// Supervisor states.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    /// Nothing done yet.
    Init,
    /// Bringing the radio link up.
    LinkAcquiring,
    /// Resolving the broker and configuring the session.
    SessionConfiguring,
    /// Opening the broker session.
    SessionConnecting,
    /// Session up; ticking.
    Connected,
}

#[cfg(feature = "defmt")]
impl defmt::Format for State {
    fn format(&self, f: defmt::Formatter) {
        match self {
            State::Init => defmt::write!(f, "Init"),
            State::LinkAcquiring => defmt::write!(f, "LinkAcquiring"),
            State::SessionConfiguring => defmt::write!(f, "SessionConfiguring"),
            State::SessionConnecting => defmt::write!(f, "SessionConnecting"),
            State::Connected => defmt::write!(f, "Connected"),
        }
    }
}

/// Owns the link, the session and the trigger source, and keeps the broker
/// session alive.
#[derive(Debug)]
pub struct ConnectionSupervisor<M, D, S, T, E, R>
where
    M: Modem,
    D: Dns,
    S: SessionAdapter,
    T: Delay,
    E: EventSource,
    R: RngCore,
{
    link: LinkManager<M>,
    dns: D,
    session: S,
    delay: T,
    events: E,
    gateway: PublishGateway<R>,
    trigger: TriggerBinding,
    config: Config,
    state: State,
    connect_attempts: u32,
    endpoint: Option<BrokerEndpoint>,
}

impl<M, D, S, T, E, R> ConnectionSupervisor<M, D, S, T, E, R>
where
    M: Modem,
    D: Dns,
    S: SessionAdapter,
    T: Delay,
    E: EventSource,
    R: RngCore,
{
    /// Assemble a supervisor in [`State::Init`]. Fails if `config` does not
    /// validate.
    pub fn new(
        config: Config,
        modem: M,
        dns: D,
        session: S,
        delay: T,
        events: E,
        rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            link: LinkManager::new(modem),
            dns,
            session,
            delay,
            events,
            gateway: PublishGateway::new(rng),
            trigger: TriggerBinding::new(config.button_index),
            config,
            state: State::Init,
            connect_attempts: 0,
            endpoint: None,
        })
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Broker endpoint, once resolved.
    pub fn endpoint(&self) -> Option<BrokerEndpoint> {
        self.endpoint
    }

    /// Session connect attempts made so far in this run.
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    /// The link manager.
    pub fn link(&self) -> &LinkManager<M> {
        &self.link
    }

    /// The name resolver.
    pub fn dns(&self) -> &D {
        &self.dns
    }

    /// The session adapter.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Mutable access to the session adapter.
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// The delay provider.
    pub fn delay(&self) -> &T {
        &self.delay
    }

    /// Mutable access to the trigger source, e.g. to feed a queue.
    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    /// The publish gateway.
    pub fn gateway(&self) -> &PublishGateway<R> {
        &self.gateway
    }

    /// Do the work of the current state and move to the next one.
    ///
    /// Blocks for as long as the state requires: the whole link attempt in
    /// [`State::LinkAcquiring`], a retry or tick delay elsewhere.
    pub fn step(&mut self) -> Result<State, SupervisorError> {
        if self.state != State::Connected {
            self.drop_stale_triggers();
        }

        let next = match self.state {
            State::Init => {
                self.link.configure();
                State::LinkAcquiring
            }
            State::LinkAcquiring => self.acquire_link(),
            State::SessionConfiguring => {
                self.configure_session()?;
                State::SessionConnecting
            }
            State::SessionConnecting => self.connect_session(),
            State::Connected => self.tick(),
        };

        if next != self.state {
            debug!("Supervisor {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        Ok(next)
    }

    /// Step forever. Only returns when a step fails fatally.
    pub fn run(&mut self) -> Result<Infallible, SupervisorError> {
        loop {
            self.step()?;
        }
    }

    fn acquire_link(&mut self) -> State {
        match self.link.connect_blocking() {
            Ok(()) => State::SessionConfiguring,
            Err(_) => {
                let delay_ms = self.config.link_retry_delay_ms();
                info!("Retrying LTE link in {} ms", delay_ms);
                self.delay.delay_ms(delay_ms);
                State::LinkAcquiring
            }
        }
    }

    fn configure_session(&mut self) -> Result<(), SupervisorError> {
        let port = self.config.broker_port;
        let endpoint = match BrokerResolver::resolve(&mut self.dns, &self.config.broker_hostname, port)
        {
            Ok(endpoint) => endpoint,
            Err(ResolveError::NoUsableAddress)
                if self.config.unresolved_policy == UnresolvedPolicy::Unspecified =>
            {
                warn!("Continuing without a broker address");
                BrokerEndpoint::unspecified(port)
            }
            Err(err) => return Err(err.into()),
        };

        let settings = SessionSettings {
            endpoint,
            client_id: &self.config.client_id,
            keepalive_s: self.config.keepalive_s,
            buffer_size: self.config.buffer_size,
        };
        self.session.configure(&settings).map_err(|err| {
            error!("Session configuration rejected: {:?}", err);
            SupervisorError::Configure(err)
        })?;

        self.endpoint = Some(endpoint);
        self.connect_attempts = 0;
        Ok(())
    }

    fn connect_session(&mut self) -> State {
        if self.connect_attempts > 0 {
            let delay_ms = self.config.reconnect_delay_ms();
            info!("Reconnecting in {} ms", delay_ms);
            self.delay.delay_ms(delay_ms);
        }
        self.connect_attempts = self.connect_attempts.saturating_add(1);

        match self.session.connect() {
            Ok(()) => {
                info!("MQTT connect sent, attempt {}", self.connect_attempts);
                State::Connected
            }
            Err(err) => {
                error!("MQTT connect failed: {:?}", err);
                State::SessionConnecting
            }
        }
    }

    /// One steady-state iteration.
    fn tick(&mut self) -> State {
        let input = self.session.input();

        if self.dispatch_events() {
            return State::SessionConnecting;
        }
        if let Err(err) = input {
            error!("MQTT input failed: {:?}", err);
            if let Some(next) = self.apply_runtime_policy() {
                return next;
            }
        }

        self.service_triggers();

        match self.session.live() {
            Ok(()) | Err(SessionError::WouldBlock) => {}
            Err(err) => {
                error!("MQTT keepalive failed: {:?}", err);
                if let Some(next) = self.apply_runtime_policy() {
                    return next;
                }
            }
        }

        self.delay.delay_ms(self.config.tick_interval_ms);
        State::Connected
    }

    /// Drain queued session events. Returns true if one of them ended the
    /// session.
    fn dispatch_events(&mut self) -> bool {
        while let Some(event) = self.session.next_event() {
            match event {
                InboundEvent::ConnAck { return_code: 0 } => info!("MQTT client connected"),
                InboundEvent::ConnAck { return_code } => {
                    error!("MQTT connect refused, return code {}", return_code);
                }
                InboundEvent::Disconnected(reason) => {
                    info!("MQTT client disconnected: {:?}", reason);
                }
                InboundEvent::PubAck(id) => info!("PUBACK packet id: {}", id),
                InboundEvent::SubAck(id) => info!("SUBACK packet id: {}", id),
                InboundEvent::PingResp => debug!("PINGRESP packet"),
                InboundEvent::PublishReceived { payload_len, .. } => {
                    info!("PUBLISH received, {} bytes", payload_len);
                }
                InboundEvent::Unrecognized(kind) => debug!("Unhandled MQTT packet type {}", kind),
            }
            if event.ends_session() {
                return true;
            }
        }
        false
    }

    fn apply_runtime_policy(&mut self) -> Option<State> {
        match self.config.runtime_error_policy {
            RuntimeErrorPolicy::LogOnly => None,
            RuntimeErrorPolicy::Reconnect => {
                if let Err(err) = self.session.disconnect() {
                    debug!("Disconnect before reconnect failed: {:?}", err);
                }
                Some(State::SessionConnecting)
            }
        }
    }

    fn service_triggers(&mut self) {
        while let Some(event) = self.events.poll_event() {
            if !self.trigger.matches(&event) {
                continue;
            }
            let published = self.gateway.publish(
                &mut self.session,
                &self.config.publish_topic,
                self.config.button_payload.as_bytes(),
                self.config.button_qos,
            );
            match published {
                Ok(id) => info!("Button event published as id {}", id),
                Err(err) => error!("Failed to send MQTT message: {:?}", err),
            }
        }
    }

    fn drop_stale_triggers(&mut self) {
        let mut dropped = 0u32;
        while self.events.poll_event().is_some() {
            dropped = dropped.saturating_add(1);
        }
        if dropped > 0 {
            warn!("Dropped {} input events while not connected", dropped);
        }
    }
}
