//! Provisioning fetch state machine.
//!
//! Classic embedded blocking state machine, kept explicit:
//!
//! ```text
//! ┌──────────────────┬──────────────────────┬──────────────────────────┐
//! │ StateId          │ handler              │ next                     │
//! ├──────────────────┼──────────────────────┼──────────────────────────┤
//! │ ResolveDns       │ states::resolve_dns  │ OpenSocket | Done        │
//! │ OpenSocket       │ states::open_socket  │ Connect | Done           │
//! │ Connect          │ states::connect      │ SendRequest | Connect    │
//! │                  │                      │   | CloseSocket          │
//! │ SendRequest      │ states::send_request │ ReadHeader | CloseSocket │
//! │ ReadHeader       │ states::read_header  │ CloseConnection          │
//! │ CloseConnection  │ close_connection     │ CloseSocket              │
//! │ CloseSocket      │ close_socket         │ Done                     │
//! │ Done             │ -                    │ -                        │
//! └──────────────────┴──────────────────────┴──────────────────────────┘
//! ```
//!
//! Each [`step`](FetchMachine::step) runs the handler for the **current**
//! state and moves to the state it returns.  States only move forward,
//! except `Connect → Connect` while connect attempts remain.  Every path
//! that opened a socket passes through `CloseSocket`.

pub mod context;
pub mod states;

use context::{FetchEnv, ProvisioningResult, TransferContext};
use log::{info, warn};

use crate::app::ports::{ConfigStore, NetworkPort, TimePort};
use crate::config::ProvisioningConfig;
use crate::error::{ProvisionError, Result};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Every state of a fetch, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum StateId {
    ResolveDns = 0,
    OpenSocket = 1,
    Connect = 2,
    SendRequest = 3,
    ReadHeader = 4,
    CloseConnection = 5,
    CloseSocket = 6,
    Done = 7,
}

impl StateId {
    /// Total number of states.
    pub const COUNT: usize = 8;

    pub const fn name(self) -> &'static str {
        match self {
            Self::ResolveDns => "RESOLVE_DNS",
            Self::OpenSocket => "OPEN_SOCKET",
            Self::Connect => "CONNECT",
            Self::SendRequest => "SEND_REQUEST",
            Self::ReadHeader => "READ_HEADER",
            Self::CloseConnection => "CLOSE_CONNECTION",
            Self::CloseSocket => "CLOSE_SOCKET",
            Self::Done => "DONE",
        }
    }

    /// Whether `self → next` is a legal move.
    pub fn can_move_to(self, next: StateId) -> bool {
        next > self || (self == Self::Connect && next == Self::Connect)
    }
}

/// Capacity of the visited-state trace: every state once plus the retries
/// of the longest allowed connect loop.
pub const TRACE_LEN: usize = StateId::COUNT + 32;

pub type Trace = heapless::Vec<StateId, TRACE_LEN>;

// ---------------------------------------------------------------------------
// FetchMachine
// ---------------------------------------------------------------------------

/// One provisioning fetch, from DNS lookup to socket release.
///
/// Owns its [`TransferContext`]; the ports are borrowed for its lifetime.
/// Build one per fetch and [`run`](Self::run) it to completion.
pub struct FetchMachine<'a, N: NetworkPort, S, C> {
    env: FetchEnv<'a, N, S, C>,
    ctx: TransferContext<N::Socket>,
    state: StateId,
    trace: Trace,
}

impl<'a, N, S, C> FetchMachine<'a, N, S, C>
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
        let mut trace = Trace::new();
        let _ = trace.push(StateId::ResolveDns);
        Self {
            env: FetchEnv::new(net, store, clock, config),
            ctx: TransferContext::new(),
            state: StateId::ResolveDns,
            trace,
        }
    }

    /// Run the transaction to `Done` and return its outcome.
    ///
    /// Blocks for DNS, the connect attempts and the receive timeouts.
    /// Fails with [`ProvisionError::LinkDown`] without touching the network
    /// when the station link is down.
    pub fn run(&mut self) -> Result<ProvisioningResult> {
        if self.state == StateId::ResolveDns && !self.env.net.link_up() {
            warn!("Wi-Fi offline, retry when online");
            self.ctx.fail(ProvisionError::LinkDown);
            self.state = StateId::Done;
        }

        info!("FSM starting in state: {}", self.state.name());
        while self.state != StateId::Done {
            self.step();
        }
        // Every path into Done records an outcome; without one, no
        // response was ever received.
        self.outcome().unwrap_or(Err(ProvisionError::Receive))
    }

    /// Run the handler of the current state and move to its successor.
    /// Returns the new state.  A no-op once `Done`.
    pub fn step(&mut self) -> StateId {
        let env = &mut self.env;
        let ctx = &mut self.ctx;
        let next = match self.state {
            StateId::ResolveDns => states::resolve_dns(env, ctx),
            StateId::OpenSocket => states::open_socket(env, ctx),
            StateId::Connect => states::connect(env, ctx),
            StateId::SendRequest => states::send_request(env, ctx),
            StateId::ReadHeader => states::read_header(env, ctx),
            StateId::CloseConnection => states::close_connection(env, ctx),
            StateId::CloseSocket => states::close_socket(env, ctx),
            StateId::Done => return StateId::Done,
        };
        self.transition(next);
        next
    }

    /// The current state.
    pub fn current_state(&self) -> StateId {
        self.state
    }

    /// States visited so far, starting with `ResolveDns`.
    pub fn trace(&self) -> &[StateId] {
        &self.trace
    }

    /// Whether the machine entered `state` at any point.
    pub fn visited(&self, state: StateId) -> bool {
        self.trace.contains(&state)
    }

    /// Connect attempts made so far.
    pub fn connect_attempts(&self) -> u8 {
        self.ctx.connect_attempts
    }

    /// The recorded outcome, or `None` while the fetch has neither failed
    /// nor parsed a response.
    pub fn outcome(&self) -> Option<Result<ProvisioningResult>> {
        self.ctx.outcome.clone()
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: StateId) {
        debug_assert!(
            self.state.can_move_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        if next != self.state {
            info!("FSM transition: {} -> {}", self.state.name(), next.name());
        }
        self.state = next;
        // The trace is diagnostic; a full trace only drops later entries.
        let _ = self.trace.push(next);
    }
}
