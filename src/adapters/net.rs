//! TCP/IP adapter over `std::net`.
//!
//! Implements [`NetworkPort`] and [`SocketPort`].  ESP-IDF ships a `std`
//! with lwIP behind `std::net`, so the same code runs on target and on
//! host; only the link flag differs.
//!
//! ## Link state
//!
//! The station link is an `Arc<AtomicBool>` owned by whoever brings the
//! interface up (Wi-Fi bring-up in `main`).  Host builds usually start
//! with the link up.
//!
//! ## Connection model
//!
//! 1. `open_socket()` hands out an unconnected [`TcpSocket`].
//! 2. `connect()` makes one attempt bounded by its timeout.  A failed
//!    attempt leaves the socket unconnected so it can be retried.
//! 3. `read_timeout()` blocks at most the given time and maps an idle
//!    socket to [`NetError::Timeout`], end of stream to `Ok(0)`.
//! 4. `disconnect()` shuts the connection down; `close()` drops it.

use core::net::{Ipv4Addr, SocketAddrV4};
use core::time::Duration;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::app::ports::{NetError, NetworkPort, SocketPort};

/// Shortest timeout handed to the OS; `std` rejects a zero duration.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

// ───────────────────────────────────────────────────────────────
// StdNetwork
// ───────────────────────────────────────────────────────────────

/// Station interface as seen through `std::net`.
pub struct StdNetwork {
    link: Arc<AtomicBool>,
}

impl StdNetwork {
    /// Track the link through a flag shared with the Wi-Fi bring-up.
    pub fn new(link: Arc<AtomicBool>) -> Self {
        Self { link }
    }

    /// A network whose link is permanently up (host runs).
    pub fn always_up() -> Self {
        Self::new(Arc::new(AtomicBool::new(true)))
    }

    /// The shared link flag.
    pub fn link_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.link)
    }
}

impl NetworkPort for StdNetwork {
    type Socket = TcpSocket;

    fn link_up(&self) -> bool {
        self.link.load(Ordering::Acquire)
    }

    fn resolve(&mut self, host: &str) -> Result<Ipv4Addr, NetError> {
        // Dotted-quad literals skip the resolver.
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(ip);
        }
        let addrs = (host, 0u16).to_socket_addrs().map_err(|e| {
            debug!("resolve {} failed: {}", host, e);
            NetError::Resolve
        })?;
        addrs
            .filter_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(*v4.ip()),
                SocketAddr::V6(_) => None,
            })
            .next()
            .ok_or(NetError::Resolve)
    }

    fn open_socket(&mut self) -> Result<TcpSocket, NetError> {
        Ok(TcpSocket::new())
    }
}

// ───────────────────────────────────────────────────────────────
// TcpSocket
// ───────────────────────────────────────────────────────────────

/// One TCP connection, established lazily by [`SocketPort::connect`].
#[derive(Default)]
pub struct TcpSocket {
    stream: Option<TcpStream>,
    read_timeout: Option<Duration>,
}

impl TcpSocket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a connection is established.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> Result<&mut TcpStream, NetError> {
        self.stream.as_mut().ok_or(NetError::Closed)
    }
}

fn map_io(e: &std::io::Error) -> NetError {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => NetError::Timeout,
        ErrorKind::ConnectionRefused => NetError::Refused,
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof => NetError::Closed,
        _ => NetError::Io,
    }
}

impl SocketPort for TcpSocket {
    fn connect(&mut self, addr: SocketAddrV4, timeout: Duration) -> Result<(), NetError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = TcpStream::connect_timeout(&SocketAddr::V4(addr), timeout.max(MIN_TIMEOUT))
            .map_err(|e| map_io(&e))?;
        // Requests are tiny; don't hold them back.
        let _ = stream.set_nodelay(true);
        info!("TCP: connected to {}", addr);
        self.stream = Some(stream);
        self.read_timeout = None;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, NetError> {
        self.stream()?.write(data).map_err(|e| map_io(&e))
    }

    fn flush(&mut self) -> Result<(), NetError> {
        self.stream()?.flush().map_err(|e| map_io(&e))
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, NetError> {
        let timeout = timeout.max(MIN_TIMEOUT);
        if self.read_timeout != Some(timeout) {
            self.stream()?
                .set_read_timeout(Some(timeout))
                .map_err(|e| map_io(&e))?;
            self.read_timeout = Some(timeout);
        }
        let stream = self.stream()?;
        loop {
            match stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io(&e)),
            }
        }
    }

    fn disconnect(&mut self) {
        if let Some(stream) = &self.stream {
            let _ = stream.shutdown(Shutdown::Both);
            debug!("TCP: disconnected");
        }
    }

    fn close(&mut self) {
        self.stream = None;
        self.read_timeout = None;
    }
}
