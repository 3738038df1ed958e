//! Per-transaction state threaded through every fetch handler.
//!
//! [`TransferContext`] is owned by exactly one [`FetchMachine`](super::FetchMachine)
//! and dies with it: socket, receive buffer, retry counters and
//! timestamps never survive a fetch.  [`FetchEnv`] bundles the borrowed
//! ports and the request the handlers act on.

use core::net::SocketAddrV4;

use crate::app::ports::{ConfigStore, NetworkPort, TimePort};
use crate::config::{HostName, Password, ProvisioningConfig, SerialNumber};
use crate::error::{ProvisionError, Result};
use crate::http::response::RESPONSE_BUFFER_LEN;
use crate::identity::{DeviceIdentity, MacAddress};

// ---------------------------------------------------------------------------
// Request / result records
// ---------------------------------------------------------------------------

/// What one fetch asks the manufacturing server for.
#[derive(Debug, Clone)]
pub struct ProvisioningRequest {
    pub host: HostName,
    pub port: u16,
    pub identity: DeviceIdentity,
}

/// What a successful fetch produced.  Never built from a partial response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningResult {
    pub mac: MacAddress,
    pub serial_number: SerialNumber,
    pub password: Password,
}

// ---------------------------------------------------------------------------
// FetchEnv
// ---------------------------------------------------------------------------

/// Ports and tunables borrowed for the duration of one fetch.
pub struct FetchEnv<'a, N, S, C> {
    pub net: &'a mut N,
    pub store: &'a mut S,
    pub clock: &'a C,
    pub config: &'a ProvisioningConfig,
    pub request: ProvisioningRequest,
}

impl<'a, N, S, C> FetchEnv<'a, N, S, C>
where
    N: NetworkPort,
    S: ConfigStore,
    C: TimePort,
{
    pub fn new(
        net: &'a mut N,
        store: &'a mut S,
        clock: &'a C,
        config: &'a ProvisioningConfig,
    ) -> Self {
        let request = ProvisioningRequest {
            host: config.host.clone(),
            port: config.port,
            identity: store.identity(),
        };
        Self {
            net,
            store,
            clock,
            config,
            request,
        }
    }
}

// ---------------------------------------------------------------------------
// TransferContext
// ---------------------------------------------------------------------------

/// Mutable state of one in-flight fetch.
pub struct TransferContext<Sock> {
    // -- Transport --
    /// Socket allocated in `OpenSocket`; taken in `CloseSocket`.
    pub socket: Option<Sock>,
    /// True between a successful connect and the disconnect.
    pub connected: bool,
    /// Resolved server address.
    pub address: Option<SocketAddrV4>,

    // -- Receive --
    /// Bounded response buffer.
    pub buffer: heapless::Vec<u8, RESPONSE_BUFFER_LEN>,

    // -- Retry bookkeeping --
    /// Connect attempts made so far.
    pub connect_attempts: u8,
    /// Consecutive empty reads while waiting for the first response bytes.
    pub data_retries: u8,

    // -- Timing (ms since boot) --
    pub request_sent_ms: Option<u64>,
    pub last_rx_ms: Option<u64>,

    // -- Result --
    /// First failure, or the parsed result.
    pub outcome: Option<Result<ProvisioningResult>>,
}

impl<Sock> TransferContext<Sock> {
    pub fn new() -> Self {
        Self {
            socket: None,
            connected: false,
            address: None,
            buffer: heapless::Vec::new(),
            connect_attempts: 0,
            data_retries: 0,
            request_sent_ms: None,
            last_rx_ms: None,
            outcome: None,
        }
    }

    /// Record a failure.  The first failure wins.
    pub fn fail(&mut self, err: ProvisionError) {
        if self.outcome.is_none() {
            self.outcome = Some(Err(err));
        }
    }

    /// Whether the fetch has produced a result.
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Some(Ok(_)))
    }

    /// Milliseconds between sending the request and the latest data.
    pub fn response_latency_ms(&self) -> Option<u64> {
        Some(self.last_rx_ms?.saturating_sub(self.request_sent_ms?))
    }
}

impl<Sock> Default for TransferContext<Sock> {
    fn default() -> Self {
        Self::new()
    }
}
