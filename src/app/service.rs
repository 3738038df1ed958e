//! Provisioning service, the hexagonal core.
//!
//! [`ProvisioningService`] owns the ports and the provisioning config and
//! turns [`AppCommand`]s into fetches.  Each fetch builds a fresh
//! [`FetchMachine`]; nothing from one fetch survives into the next except
//! what the configuration store committed.
//!
//! ```text
//!  console line ──▶ ┌─────────────────────────┐ ──▶ EventSink
//!                   │   ProvisioningService    │
//!  NetworkPort ◀──  │   FetchMachine per fetch │  ──▶ ConfigStore
//!                   └─────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::{ProvisioningConfig, bounded};
use crate::error::{ProvisionError, Result};
use crate::fsm::FetchMachine;
use crate::fsm::context::ProvisioningResult;

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{ConfigStore, EventSink, NetworkPort, TimePort};

// ───────────────────────────────────────────────────────────────
// ProvisioningService
// ───────────────────────────────────────────────────────────────

/// Runs provisioning fetches on behalf of the console.
pub struct ProvisioningService<N, S, C> {
    net: N,
    store: S,
    clock: C,
    config: ProvisioningConfig,
    fetch_count: u32,
    last_error: Option<ProvisionError>,
}

impl<N, S, C> ProvisioningService<N, S, C>
where
    N: NetworkPort,
    S: ConfigStore,
    C: TimePort,
{
    pub fn new(net: N, store: S, clock: C, config: ProvisioningConfig) -> Self {
        Self {
            net,
            store,
            clock,
            config,
            fetch_count: 0,
            last_error: None,
        }
    }

    // ── Fetch ─────────────────────────────────────────────────

    /// Run one provisioning fetch to completion.
    pub fn fetch(&mut self) -> Result<ProvisioningResult> {
        self.fetch_count += 1;
        info!(
            "Provisioning fetch #{} from {}:{}",
            self.fetch_count, self.config.host, self.config.port
        );

        let outcome =
            FetchMachine::new(&mut self.net, &mut self.store, &self.clock, &self.config).run();
        self.last_error = outcome.as_ref().err().copied();
        outcome
    }

    /// Run one fetch and report only whether it succeeded.
    pub fn provision(&mut self) -> bool {
        self.fetch().is_ok()
    }

    // ── Commands ──────────────────────────────────────────────

    /// Execute a command, reporting through `sink`.
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) {
        match cmd {
            AppCommand::GetSnMac => match self.fetch() {
                Ok(result) => sink.emit(&AppEvent::ProvisioningSucceeded {
                    mac: result.mac,
                    serial_number: result.serial_number,
                    password_len: result.password.len(),
                }),
                Err(e) => sink.emit(&AppEvent::ProvisioningFailed(e)),
            },
            AppCommand::ShowIdentity => {
                let device = self.store.device_config();
                sink.emit(&AppEvent::Identity {
                    identity: device.identity,
                    serial_number: device.serial_number,
                    mac: self.store.network_config().mac,
                });
            }
            AppCommand::Help => sink.emit(&AppEvent::Help),
        }
    }

    /// Parse and execute one console line.  Blank lines are ignored.
    pub fn handle_line(&mut self, line: &str, sink: &mut impl EventSink) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match AppCommand::parse(line) {
            Some(cmd) => self.handle_command(cmd, sink),
            None => {
                warn!("Unknown command: {}", line);
                sink.emit(&AppEvent::UnknownCommand(bounded(line)));
            }
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn net_mut(&mut self) -> &mut N {
        &mut self.net
    }

    /// Number of fetches started since construction.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count
    }

    /// Failure of the most recent fetch, if it failed.
    pub fn last_error(&self) -> Option<ProvisionError> {
        self.last_error
    }
}
