//! State handler functions.
//!
//! One plain function per state.  Each does its piece of the transaction
//! and returns the next state; failures are recorded in the context and
//! route towards the teardown states.
//!
//! ```text
//!  RESOLVE_DNS ──fail──────────────────────────────────────────┐
//!      │                                                       │
//!  OPEN_SOCKET ──fail──────────────────────────────────────────┤
//!      │                                                       │
//!  CONNECT ◀─┐ retry                                           │
//!      │ └───┘ ──exhausted───────────────────┐                 │
//!  SEND_REQUEST ──fail───────────────────────┤                 │
//!      │                                     ▼                 ▼
//!  READ_HEADER ──▶ CLOSE_CONNECTION ──▶ CLOSE_SOCKET ──▶     DONE
//! ```

use core::net::SocketAddrV4;
use core::time::Duration;

use log::{debug, info, warn};

use super::StateId;
use super::context::{FetchEnv, ProvisioningResult, TransferContext};
use crate::app::ports::{ConfigStore, NetError, NetworkPort, SocketPort, TimePort};
use crate::error::{ProvisionError, Result};
use crate::http::{build_request, is_complete, parse_response};

/// Bytes pulled from the socket per read call.
const READ_CHUNK_LEN: usize = 256;

type Ctx<N> = TransferContext<<N as NetworkPort>::Socket>;

// ═══════════════════════════════════════════════════════════════════════════
//  RESOLVE_DNS
// ═══════════════════════════════════════════════════════════════════════════

pub(super) fn resolve_dns<N, S, C>(env: &mut FetchEnv<'_, N, S, C>, ctx: &mut Ctx<N>) -> StateId
where
    N: NetworkPort,
    S: ConfigStore,
    C: TimePort,
{
    let host = env.request.host.as_str();
    info!("DNS lookup for site: {}", host);

    match env.net.resolve(host) {
        Ok(ip) => {
            info!("IP address {}", ip);
            ctx.address = Some(SocketAddrV4::new(ip, env.request.port));
            StateId::OpenSocket
        }
        Err(e) => {
            warn!(
                "Failed to get IP address for {} ({}), aborting fetch for {}",
                host, e, env.request.identity.product_name
            );
            ctx.fail(ProvisionError::Resolve);
            StateId::Done
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  OPEN_SOCKET
// ═══════════════════════════════════════════════════════════════════════════

pub(super) fn open_socket<N, S, C>(env: &mut FetchEnv<'_, N, S, C>, ctx: &mut Ctx<N>) -> StateId
where
    N: NetworkPort,
    S: ConfigStore,
    C: TimePort,
{
    match env.net.open_socket() {
        Ok(socket) => {
            ctx.socket = Some(socket);
            StateId::Connect
        }
        Err(e) => {
            warn!("Failed to create socket on station interface ({}), aborting", e);
            ctx.fail(ProvisionError::SocketOpen);
            StateId::Done
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECT (one attempt per step)
// ═══════════════════════════════════════════════════════════════════════════

pub(super) fn connect<N, S, C>(env: &mut FetchEnv<'_, N, S, C>, ctx: &mut Ctx<N>) -> StateId
where
    N: NetworkPort,
    S: ConfigStore,
    C: TimePort,
{
    let Some(addr) = ctx.address else {
        ctx.fail(ProvisionError::Resolve);
        return StateId::CloseSocket;
    };

    let max_attempts = env.config.max_connect_attempts.max(1);
    let timeout = Duration::from_millis(u64::from(env.config.connect_timeout_ms));
    ctx.connect_attempts += 1;

    let attempt = match ctx.socket.as_mut() {
        Some(socket) => socket.connect(addr, timeout),
        None => Err(NetError::NoSocket),
    };

    match attempt {
        Ok(()) => {
            ctx.connected = true;
            info!(
                "Connected to {} on port {} (attempt {})",
                env.request.host,
                addr.port(),
                ctx.connect_attempts
            );
            StateId::SendRequest
        }
        Err(e) if ctx.connect_attempts < max_attempts => {
            debug!(
                "Connect attempt {}/{} to {} failed: {}",
                ctx.connect_attempts, max_attempts, addr, e
            );
            StateId::Connect
        }
        Err(e) => {
            warn!(
                "Failed to connect to {} on port {} after {} attempts ({})",
                env.request.host,
                addr.port(),
                ctx.connect_attempts,
                e
            );
            ctx.fail(ProvisionError::ConnectExhausted {
                attempts: ctx.connect_attempts,
            });
            StateId::CloseSocket
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  SEND_REQUEST
// ═══════════════════════════════════════════════════════════════════════════

pub(super) fn send_request<N, S, C>(env: &mut FetchEnv<'_, N, S, C>, ctx: &mut Ctx<N>) -> StateId
where
    N: NetworkPort,
    S: ConfigStore,
    C: TimePort,
{
    let request = match build_request(&env.request.host, &env.request.identity) {
        Ok(r) => r,
        Err(e) => {
            warn!("Cannot format query: {}", e);
            ctx.fail(e);
            return StateId::CloseSocket;
        }
    };
    debug!("Sending query: {}", request.trim_end());

    let Some(socket) = ctx.socket.as_mut() else {
        ctx.fail(ProvisionError::Send);
        return StateId::CloseSocket;
    };

    match socket
        .write_all(request.as_bytes())
        .and_then(|()| socket.flush())
    {
        Ok(()) => {
            let now = env.clock.uptime_ms();
            ctx.request_sent_ms = Some(now);
            ctx.last_rx_ms = Some(now);
            ctx.data_retries = 0;
            StateId::ReadHeader
        }
        Err(e) => {
            warn!("FAILED to send request ({})", e);
            ctx.fail(ProvisionError::Send);
            StateId::CloseSocket
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  READ_HEADER
// ═══════════════════════════════════════════════════════════════════════════

pub(super) fn read_header<N, S, C>(env: &mut FetchEnv<'_, N, S, C>, ctx: &mut Ctx<N>) -> StateId
where
    N: NetworkPort,
    S: ConfigStore,
    C: TimePort,
{
    let outcome = receive(env, ctx)
        .and_then(|()| {
            info!(
                "Received: {} bytes in {} ms",
                ctx.buffer.len(),
                ctx.response_latency_ms().unwrap_or(0)
            );
            parse_response(&ctx.buffer)
        })
        .and_then(|result| persist(env.store, &result).map(|()| result));

    match &outcome {
        Ok(result) => info!(
            "Setting MAC to: {}, serial number: {}",
            result.mac, result.serial_number
        ),
        Err(e) => warn!("Provisioning response rejected: {}", e),
    }
    ctx.outcome = Some(outcome);
    StateId::CloseConnection
}

/// Fill the receive buffer until the response is complete, the peer
/// closes, or the data goes stale.
fn receive<N, S, C>(env: &FetchEnv<'_, N, S, C>, ctx: &mut Ctx<N>) -> Result<()>
where
    N: NetworkPort,
    C: TimePort,
{
    let timeout = Duration::from_millis(u64::from(env.config.recv_timeout_ms));
    let socket = ctx.socket.as_mut().ok_or(ProvisionError::Receive)?;
    let mut chunk = [0u8; READ_CHUNK_LEN];

    loop {
        if is_complete(&ctx.buffer) {
            return Ok(());
        }
        let room = ctx.buffer.capacity() - ctx.buffer.len();
        if room == 0 {
            return Err(ProvisionError::ResponseTooLarge);
        }
        let want = room.min(chunk.len());

        match socket.read_timeout(&mut chunk[..want], timeout) {
            Ok(0) | Err(NetError::Closed) => return Ok(()),
            Ok(n) => {
                // n <= want <= room, so this cannot overflow.
                let _ = ctx.buffer.extend_from_slice(&chunk[..n]);
                ctx.last_rx_ms = Some(env.clock.uptime_ms());
            }
            Err(NetError::Timeout) if !ctx.buffer.is_empty() => {
                debug!("No data for {} ms, treating response as complete", timeout.as_millis());
                return Ok(());
            }
            Err(NetError::Timeout) => {
                if ctx.data_retries >= env.config.max_data_retries {
                    return Err(ProvisionError::ReceiveTimeout);
                }
                ctx.data_retries += 1;
                debug!(
                    "Waiting for response ({}/{})",
                    ctx.data_retries, env.config.max_data_retries
                );
            }
            Err(e) => {
                warn!("Read failed: {}", e);
                return Err(ProvisionError::Receive);
            }
        }
    }
}

/// The single success side effect: stage MAC and credentials, then commit.
fn persist<S: ConfigStore>(store: &mut S, result: &ProvisioningResult) -> Result<()> {
    store
        .set_mac(result.mac)
        .and_then(|()| store.set_credentials(&result.serial_number, &result.password))
        .and_then(|()| store.commit())
        .map_err(|e| {
            warn!("Failed to save provisioned configuration: {}", e);
            ProvisionError::Storage
        })
}

// ═══════════════════════════════════════════════════════════════════════════
//  CLOSE_CONNECTION / CLOSE_SOCKET
// ═══════════════════════════════════════════════════════════════════════════

pub(super) fn close_connection<N, S, C>(
    _env: &mut FetchEnv<'_, N, S, C>,
    ctx: &mut Ctx<N>,
) -> StateId
where
    N: NetworkPort,
    S: ConfigStore,
    C: TimePort,
{
    if ctx.connected {
        if let Some(socket) = ctx.socket.as_mut() {
            socket.disconnect();
        }
        ctx.connected = false;
    }
    StateId::CloseSocket
}

pub(super) fn close_socket<N, S, C>(_env: &mut FetchEnv<'_, N, S, C>, ctx: &mut Ctx<N>) -> StateId
where
    N: NetworkPort,
    S: ConfigStore,
    C: TimePort,
{
    if let Some(mut socket) = ctx.socket.take() {
        if ctx.connected {
            socket.disconnect();
            ctx.connected = false;
        }
        socket.close();
    }

    if ctx.succeeded() {
        info!("Got the MAC Address.");
    } else {
        warn!("Get MAC Address failed.");
    }
    StateId::Done
}
