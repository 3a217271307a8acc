//! Broker address resolution.
//!
//! The session transport is IPv4-only. [`BrokerResolver::resolve`] walks the
//! lookup result in order and keeps the first IPv4 address, skipping other
//! families with a warning.

use core::net::{IpAddr, Ipv4Addr, SocketAddrV4};

use heapless::Vec;

use crate::error::ResolveError;

/// Upper bound on addresses a lookup may return.
pub const MAX_CANDIDATES: usize = 8;

/// Addresses produced by a lookup, in resolver order.
pub type Candidates = Vec<IpAddr, MAX_CANDIDATES>;

/// Platform name lookup.
pub trait Dns {
    /// Look up `hostname`. Extra addresses beyond [`MAX_CANDIDATES`] may be
    /// dropped by the implementation.
    fn lookup(&mut self, hostname: &str) -> Result<Candidates, ResolveError>;
}

impl<D: Dns + ?Sized> Dns for &mut D {
    fn lookup(&mut self, hostname: &str) -> Result<Candidates, ResolveError> {
        (**self).lookup(hostname)
    }
}

/// A connectable broker address.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct BrokerEndpoint {
    addr: SocketAddrV4,
}

impl BrokerEndpoint {
    /// Endpoint for `ip:port`.
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            addr: SocketAddrV4::new(ip, port),
        }
    }

    /// The unset endpoint `0.0.0.0:port`.
    pub fn unspecified(port: u16) -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED, port)
    }

    /// Whether this is the unset endpoint.
    pub fn is_unspecified(&self) -> bool {
        self.addr.ip().is_unspecified()
    }

    /// IPv4 address.
    pub fn ip(&self) -> Ipv4Addr {
        *self.addr.ip()
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Socket address for the transport.
    pub fn socket_addr(&self) -> SocketAddrV4 {
        self.addr
    }
}

impl core::fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.addr)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BrokerEndpoint {
    fn format(&self, f: defmt::Formatter) {
        let [a, b, c, d] = self.addr.ip().octets();
        defmt::write!(f, "{}.{}.{}.{}:{}", a, b, c, d, self.addr.port())
    }
}

/// Resolves the configured broker hostname.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrokerResolver;

impl BrokerResolver {
    /// Resolve `hostname` and pair the first IPv4 address with `port`.
    pub fn resolve<D: Dns>(
        dns: &mut D,
        hostname: &str,
        port: u16,
    ) -> Result<BrokerEndpoint, ResolveError> {
        let candidates = dns.lookup(hostname).inspect_err(|err| {
            error!("Lookup of {} failed: {:?}", hostname, err);
        })?;

        for candidate in candidates {
            match candidate {
                IpAddr::V4(ip) => {
                    let endpoint = BrokerEndpoint::new(ip, port);
                    info!("IPv4 address found {}", endpoint);
                    return Ok(endpoint);
                }
                IpAddr::V6(_) => {
                    warn!("Skipping non-IPv4 candidate for {}", hostname);
                }
            }
        }

        warn!("No IPv4 address for {}", hostname);
        Err(ResolveError::NoUsableAddress)
    }
}
