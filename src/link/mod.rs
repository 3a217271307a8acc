//! Radio link control.
//!
//! [`LinkManager`] wraps a platform [`Modem`] and tracks [`LinkState`]. It
//! performs exactly one attempt per call; retrying with a fixed delay is the
//! supervisor's job.

use crate::error::LinkError;

/// State of the radio link.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LinkState {
    /// No link.
    Down,
    /// An attempt is in progress.
    Connecting,
    /// Registered and able to carry traffic.
    Up,
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            LinkState::Down => defmt::write!(f, "Down"),
            LinkState::Connecting => defmt::write!(f, "Connecting"),
            LinkState::Up => defmt::write!(f, "Up"),
        }
    }
}

/// Platform access to the cellular modem.
pub trait Modem {
    /// Request or release power saving mode (PSM).
    fn request_psm(&mut self, enable: bool) -> Result<(), LinkError>;

    /// Request or release extended discontinuous reception (eDRX).
    fn request_edrx(&mut self, enable: bool) -> Result<(), LinkError>;

    /// Bring the link up.
    ///
    /// Blocks until the network registers the device or the radio stack
    /// reports a definitive failure.
    fn connect(&mut self) -> Result<(), LinkError>;
}

impl<M: Modem + ?Sized> Modem for &mut M {
    fn request_psm(&mut self, enable: bool) -> Result<(), LinkError> {
        (**self).request_psm(enable)
    }

    fn request_edrx(&mut self, enable: bool) -> Result<(), LinkError> {
        (**self).request_edrx(enable)
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        (**self).connect()
    }
}

/// Owns the modem and the link state.
#[derive(Debug)]
pub struct LinkManager<M: Modem> {
    modem: M,
    state: LinkState,
}

impl<M: Modem> LinkManager<M> {
    /// Wrap a modem. The link starts `Down`.
    pub fn new(modem: M) -> Self {
        Self {
            modem,
            state: LinkState::Down,
        }
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Turn off power saving so the device stays responsive.
    ///
    /// Some networks reject timer updates once the device is registered, so
    /// this must run before the first [`connect_blocking`](Self::connect_blocking).
    /// A rejected request is logged and otherwise ignored.
    pub fn configure(&mut self) {
        info!("Disabling PSM and eDRX");
        if let Err(err) = self.modem.request_psm(false) {
            warn!("PSM request failed: {:?}", err);
        }
        if let Err(err) = self.modem.request_edrx(false) {
            warn!("eDRX request failed: {:?}", err);
        }
    }

    /// Make one attempt to bring the link up, blocking until it resolves.
    pub fn connect_blocking(&mut self) -> Result<(), LinkError> {
        info!("LTE link connecting...");
        self.state = LinkState::Connecting;
        match self.modem.connect() {
            Ok(()) => {
                self.state = LinkState::Up;
                info!("LTE link connected");
                Ok(())
            }
            Err(err) => {
                self.state = LinkState::Down;
                warn!("Failed to establish LTE link: {:?}", err);
                Err(err)
            }
        }
    }

    /// Borrow the modem.
    pub fn modem(&self) -> &M {
        &self.modem
    }
}
