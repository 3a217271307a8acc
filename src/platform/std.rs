//! Host adapters over `std::net`, `std::thread` and `std::time`.
//!
//! Useful for running the supervisor against a real broker from a desktop
//! machine. The radio link is simulated by [`HostLink`], which is always up.

use ::std::io::{self, Read as _, Write as _};
use ::std::net::{Shutdown, SocketAddr, SocketAddrV4, TcpStream, ToSocketAddrs};
use ::std::thread;
use ::std::time::{Duration, Instant};

use crate::error::{LinkError, ResolveError};
use crate::link::Modem;
use crate::network::{self, Close, Connect, Connection, Read, Write};
use crate::resolver::{Candidates, Dns};
use crate::time::{Clock, Delay};

/// How long a read waits for data before reporting "nothing yet".
const READ_POLL: Duration = Duration::from_millis(1);

/// Upper bound on opening a TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a single blocking write.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// [`Delay`] backed by [`thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// [`Clock`] counting from its own creation.
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    /// Clock starting at zero now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Opens [`TcpConnection`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connect for TcpConnector {
    type Connection = TcpConnection;
    type Error = network::Error;

    fn connect(&mut self, remote: SocketAddrV4) -> Result<Self::Connection, Self::Error> {
        if remote.ip().is_unspecified() {
            return Err(network::Error::InvalidAddress);
        }
        let stream = TcpStream::connect_timeout(&SocketAddr::V4(remote), CONNECT_TIMEOUT)
            .map_err(|err| match err.kind() {
                io::ErrorKind::ConnectionRefused => network::Error::ConnectionRefused,
                io::ErrorKind::TimedOut => network::Error::Timeout,
                _ => network::Error::NotOpen,
            })?;
        stream
            .set_read_timeout(Some(READ_POLL))
            .and_then(|()| stream.set_write_timeout(Some(WRITE_TIMEOUT)))
            .and_then(|()| stream.set_nodelay(true))
            .map_err(|_| network::Error::NotOpen)?;
        Ok(TcpConnection { stream })
    }
}

/// A TCP stream polled with a very short read timeout.
///
/// `read` returns `Ok(0)` when no data arrived within the poll window and
/// [`network::Error::ConnectionClosed`] once the peer closed the stream.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    /// Wrap an already connected stream, applying the polling timeouts.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_read_timeout(Some(READ_POLL))?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        Ok(Self { stream })
    }
}

impl Read for TcpConnection {
    type Error = network::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.stream.read(buf) {
            Ok(0) if !buf.is_empty() => Err(network::Error::ConnectionClosed),
            Ok(n) => Ok(n),
            Err(err) => match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                    Ok(0)
                }
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                    Err(network::Error::ConnectionClosed)
                }
                _ => Err(network::Error::ReadError),
            },
        }
    }
}

impl Write for TcpConnection {
    type Error = network::Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream.write(buf).map_err(|err| match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => network::Error::Timeout,
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => {
                network::Error::ConnectionClosed
            }
            _ => network::Error::WriteError,
        })
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream
            .flush()
            .map_err(|_| network::Error::WriteError)
    }
}

impl Close for TcpConnection {
    type Error = network::Error;

    fn close(self) -> Result<(), Self::Error> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(_) => Err(network::Error::NotOpen),
        }
    }
}

impl Connection for TcpConnection {}

/// [`Dns`] backed by the operating system resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDns;

impl Dns for SystemDns {
    fn lookup(&mut self, hostname: &str) -> Result<Candidates, ResolveError> {
        let addrs = (hostname, 0)
            .to_socket_addrs()
            .map_err(|_| ResolveError::LookupFailed)?;
        let mut candidates = Candidates::new();
        for addr in addrs {
            if candidates.push(addr.ip()).is_err() {
                break;
            }
        }
        Ok(candidates)
    }
}

/// A [`Modem`] for hosts, where the network is simply there.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostLink;

impl Modem for HostLink {
    fn request_psm(&mut self, enable: bool) -> Result<(), LinkError> {
        debug!("Host link ignores PSM request ({})", enable);
        Ok(())
    }

    fn request_edrx(&mut self, enable: bool) -> Result<(), LinkError> {
        debug!("Host link ignores eDRX request ({})", enable);
        Ok(())
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let clock = StdClock::new();
        let a = clock.now_ms();
        thread::sleep(Duration::from_millis(2));
        assert!(clock.now_ms() >= a);
    }

    #[test]
    fn unspecified_address_is_rejected() {
        let remote = SocketAddrV4::new(core::net::Ipv4Addr::UNSPECIFIED, 1883);
        assert_eq!(
            TcpConnector.connect(remote).err(),
            Some(network::Error::InvalidAddress)
        );
    }

    #[test]
    fn localhost_resolves() {
        let candidates = SystemDns.lookup("localhost").unwrap();
        assert!(!candidates.is_empty());
    }

    #[test]
    fn loopback_stream_reports_idle_and_close() {
        let listener = ::std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = match listener.local_addr().unwrap() {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => unreachable!(),
        };
        let mut connection = TcpConnector.connect(addr).unwrap();
        let (peer, _) = listener.accept().unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(connection.read(&mut buf), Ok(0));

        drop(peer);
        let mut result = Ok(0);
        for _ in 0..1000 {
            result = connection.read(&mut buf);
            if result != Ok(0) {
                break;
            }
        }
        assert_eq!(result, Err(network::Error::ConnectionClosed));
    }
}
