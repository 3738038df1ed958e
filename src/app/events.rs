//! Outbound application events.
//!
//! The [`ProvisioningService`](super::service::ProvisioningService) emits
//! these through the [`EventSink`](super::ports::EventSink) port.  Adapters
//! on the other side decide what to do with them, e.g. print to the serial
//! console.

use crate::config::SerialNumber;
use crate::error::ProvisionError;
use crate::identity::{DeviceIdentity, MacAddress};

/// Longest unknown-command token echoed back.
pub const ECHO_LEN: usize = 32;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A fetch succeeded and the results were committed.
    /// The password itself is never carried, only its length.
    ProvisioningSucceeded {
        mac: MacAddress,
        serial_number: SerialNumber,
        password_len: usize,
    },

    /// A fetch failed; configuration is unchanged.
    ProvisioningFailed(ProvisionError),

    /// Identity and stored provisioning data.
    Identity {
        identity: DeviceIdentity,
        serial_number: SerialNumber,
        mac: Option<MacAddress>,
    },

    /// The command list was requested.
    Help,

    /// The console line did not name a command.
    UnknownCommand(heapless::String<ECHO_LEN>),
}
