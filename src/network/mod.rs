//! Transport abstraction for the session layer.
//!
//! The session adapter talks to the broker through these traits so the same
//! code runs over a modem's socket API, an embedded TCP/IP stack or
//! `std::net` on a host.
//!
//! Reads are non-blocking: `Ok(0)` means "nothing available right now", and
//! a peer that closed the stream is reported as
//! [`Error::ConnectionClosed`](error::Error::ConnectionClosed).

#![allow(missing_docs)]
#![deny(unsafe_code)]

use core::net::SocketAddrV4;

/// Common error types for transport operations
pub mod error;

/// MQTT 3.1.1 packet codec used by the session adapter
pub mod mqtt;

pub use error::Error;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, Write};
}

pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug + Into<Error>;
    /// Read whatever is available into `buf`, returning `Ok(0)` when nothing is pending
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug + Into<Error>;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug + Into<Error>;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A stream connection to the broker
pub trait Connection: Read + Write + Close {}

/// Opens stream connections (client side)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug + Into<Error>;
    /// Open a connection to `remote`
    fn connect(&mut self, remote: SocketAddrV4) -> Result<Self::Connection, Self::Error>;
}

/// Write all of `buf`, looping over short writes.
pub fn write_all<W: Write>(writer: &mut W, mut buf: &[u8]) -> Result<(), Error> {
    while !buf.is_empty() {
        match writer.write(buf) {
            Ok(0) => return Err(Error::WriteError),
            Ok(n) => buf = &buf[n..],
            Err(e) => return Err(e.into()),
        }
    }
    writer.flush().map_err(Into::into)
}
