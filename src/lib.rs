//! # cellmqtt
//!
//! Keeps an embedded device's MQTT session alive over a cellular link.
//!
//! The device has to bring a radio link up, find its broker, open an MQTT
//! 3.1.1 session, keep it alive and publish a message whenever a button is
//! pressed, recovering on its own from failures at either layer. This crate
//! is that control loop plus the small pieces it is built from. It runs on a
//! single cooperative thread and supports `no_std` targets.
//!
//! ## Layout
//!
//! - [`supervisor`]: the connection-lifecycle state machine
//! - [`link`]: radio link control behind the [`link::Modem`] trait
//! - [`resolver`]: broker hostname to IPv4 endpoint
//! - [`session`]: the [`session::SessionAdapter`] seam and an MQTT
//!   implementation over [`network`] transports
//! - [`publish`]: message identifiers and outbound publishes
//! - [`input`]: button events and the trigger binding
//! - [`config`]: runtime settings, loadable from JSON
//! - [`time`]: delay and clock traits
//! - `platform` (feature `std`): adapters for running on a host
//!
//! ## Features
//!
//! - `std`: host platform adapters built on `std::net` and `std::thread`
//! - `log`: log through the [`log`](https://docs.rs/log) facade
//! - `defmt`: log through [`defmt`](https://docs.rs/defmt) and implement
//!   `defmt::Format` for public types
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! cellmqtt = "0.1.0"
//! ```
//!
//! On a host, with the `std` feature:
//!
//! ```rust,ignore
//! use cellmqtt::config::Config;
//! use cellmqtt::input::NoEvents;
//! use cellmqtt::platform::std::{HostLink, StdClock, StdDelay, SystemDns, TcpConnector};
//! use cellmqtt::session::MqttSession;
//! use cellmqtt::supervisor::ConnectionSupervisor;
//!
//! let clock = StdClock::new();
//! let session: MqttSession<_, _> = MqttSession::new(TcpConnector, clock);
//! let mut supervisor = ConnectionSupervisor::new(
//!     Config::default(),
//!     HostLink,
//!     SystemDns,
//!     session,
//!     StdDelay,
//!     NoEvents,
//!     rand::rngs::OsRng,
//! )?;
//! supervisor.run()?;
//! ```

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod input;
pub mod link;
pub mod network;
pub mod publish;
pub mod resolver;
pub mod session;
pub mod supervisor;
pub mod time;

#[cfg(feature = "std")]
pub mod platform;

pub use config::Config;
pub use error::{ConfigError, LinkError, ResolveError, SessionError, SupervisorError};
pub use supervisor::{ConnectionSupervisor, State};
