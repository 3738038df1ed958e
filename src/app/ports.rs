//! Port traits: the hexagonal boundary between the provisioning logic and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ FetchMachine / ProvisioningService (domain)
//! ```
//!
//! Driven adapters (network stack, persistent config, clock, event sinks)
//! implement these traits.  The state machine consumes them via generics,
//! so the transaction logic never touches sockets or flash directly.
//!
//! ## Security notes
//!
//! - **ConfigStore** implementations MUST NOT persist anything before
//!   `commit()`; a failed transaction leaves the stored config untouched.
//! - Passwords handed to `set_credentials` are secrets.  Implementations
//!   SHOULD keep them on an encrypted partition and MUST NOT log them.

use core::net::{Ipv4Addr, SocketAddrV4};
use core::time::Duration;

use crate::config::{DeviceConfig, NetworkConfig};
use crate::identity::{DeviceIdentity, MacAddress};

// ───────────────────────────────────────────────────────────────
// Network ports (driven adapter: domain ↔ TCP/IP stack)
// ───────────────────────────────────────────────────────────────

/// A TCP socket on the station interface.
///
/// One socket serves exactly one connection; it is released with
/// [`close`](Self::close) and never reused.
pub trait SocketPort {
    /// Connect to `addr`, giving up after `timeout`.
    fn connect(&mut self, addr: SocketAddrV4, timeout: Duration) -> Result<(), NetError>;

    /// Write some of `data`.  Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, NetError>;

    /// Flush buffered output to the peer.
    fn flush(&mut self) -> Result<(), NetError>;

    /// Read into `buf`, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` at end of stream and [`NetError::Timeout`] when no
    /// data arrived in time.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, NetError>;

    /// Shut down the TCP connection.  No-op when not connected.
    fn disconnect(&mut self);

    /// Release the socket.
    fn close(&mut self);

    /// Write all of `data`, looping over short writes.
    fn write_all(&mut self, mut data: &[u8]) -> Result<(), NetError> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => return Err(NetError::Closed),
                n => data = &data[n..],
            }
        }
        Ok(())
    }
}

/// Name resolution and socket allocation on the station interface.
pub trait NetworkPort {
    type Socket: SocketPort;

    /// Whether the station link is up.
    fn link_up(&self) -> bool;

    /// Resolve `host` to an IPv4 address.
    fn resolve(&mut self, host: &str) -> Result<Ipv4Addr, NetError>;

    /// Allocate a fresh TCP socket.
    fn open_socket(&mut self) -> Result<Self::Socket, NetError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration store (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Device and network configuration as seen by the provisioning logic.
///
/// The setters stage values; only [`commit`](Self::commit) makes them
/// durable.
pub trait ConfigStore {
    /// Identity presented to the manufacturing server.
    fn identity(&self) -> DeviceIdentity;

    /// Current device record (identity, serial number, password).
    fn device_config(&self) -> DeviceConfig;

    /// Current network record.
    fn network_config(&self) -> NetworkConfig;

    /// Stage the station MAC address.
    fn set_mac(&mut self, mac: MacAddress) -> Result<(), StorageError>;

    /// Stage serial number and password.  Values longer than the stored
    /// bounds are truncated.
    fn set_credentials(&mut self, serial_number: &str, password: &str) -> Result<(), StorageError>;

    /// Persist everything staged since the last commit.
    fn commit(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Monotonic time since boot.
pub trait TimePort {
    fn uptime_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → console / logging)
// ───────────────────────────────────────────────────────────────

/// The service emits [`AppEvent`](super::events::AppEvent)s through this
/// port.  Adapters decide where they go (serial log, telnet session, ...).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`NetworkPort`] and [`SocketPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    /// Hostname did not resolve to an IPv4 address.
    Resolve,
    /// No socket could be allocated.
    NoSocket,
    /// The operation did not complete in time.
    Timeout,
    /// The peer refused the connection.
    Refused,
    /// The connection is closed.
    Closed,
    /// Any other I/O failure.
    Io,
}

/// Errors from [`ConfigStore`] and the NVS backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Stored blob failed deserialisation.
    Corrupted,
}

/// Errors from loading or validating the provisioning configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for NetError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Resolve => write!(f, "name resolution failed"),
            Self::NoSocket => write!(f, "no socket available"),
            Self::Timeout => write!(f, "timed out"),
            Self::Refused => write!(f, "connection refused"),
            Self::Closed => write!(f, "connection closed"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "stored data corrupted"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
