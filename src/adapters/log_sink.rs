//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the ESP-IDF
//! logger (UART / USB-CDC in production).  Provisioning passwords never
//! reach the log; only their length does.

use log::{info, warn};

use crate::app::commands::COMMANDS;
use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::ProvisioningSucceeded {
                mac,
                serial_number,
                password_len,
            } => {
                info!(
                    "Successfully got SN: {}, and MAC: {} (password: {} chars)",
                    serial_number, mac, password_len
                );
            }
            AppEvent::ProvisioningFailed(e) => {
                warn!("Failed to get SN, PW and MAC: {}", e);
            }
            AppEvent::Identity {
                identity,
                serial_number,
                mac,
            } => {
                info!(
                    "Product: {}, ID: 0x{:08X}, CPU ID: 0x{}",
                    identity.product_name,
                    identity.product_id,
                    identity.cpu_id_hex()
                );
                match mac {
                    Some(mac) => info!("Serial number: {}, MAC: {}", serial_number, mac),
                    None => info!("Serial number: {}, MAC: not provisioned", serial_number),
                }
            }
            AppEvent::Help => {
                for spec in COMMANDS {
                    info!("  {:<10} {}", spec.name, spec.help);
                }
            }
            AppEvent::UnknownCommand(line) => {
                warn!("Unknown command: {} (type ? for help)", line);
            }
        }
    }
}
