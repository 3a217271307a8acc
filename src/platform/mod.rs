//! Platform adapters.
//!
//! Implementations of the crate's collaborator traits for a given target.
//! Only the host (`std`) platform ships with the crate; firmware provides
//! its own [`Modem`](crate::link::Modem), [`Dns`](crate::resolver::Dns) and
//! transport implementations.

pub mod std;
