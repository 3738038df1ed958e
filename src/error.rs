//! Error types for the provisioning client.
//!
//! A single [`ProvisionError`] enum covers every way one provisioning
//! transaction can fail.  All variants are `Copy` so the state machine can
//! record the first failure in its context and carry it through the
//! teardown states without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Provisioning transaction errors
// ---------------------------------------------------------------------------

/// Every terminal failure of a provisioning fetch funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionError {
    /// The station link is down; nothing was attempted.
    LinkDown,
    /// The manufacturing hostname could not be resolved.
    Resolve,
    /// No transport socket could be allocated on the station interface.
    SocketOpen,
    /// Every connection attempt failed.
    ConnectExhausted { attempts: u8 },
    /// The formatted request does not fit the request buffer.
    RequestTooLarge,
    /// Writing or flushing the request failed.
    Send,
    /// The connection failed while reading the response.
    Receive,
    /// No response data arrived within the data-wait budget.
    ReceiveTimeout,
    /// The response does not fit the receive buffer.
    ResponseTooLarge,
    /// Status line or header terminator missing.
    MalformedResponse,
    /// The server answered 404 for this device.
    NotFound,
    /// The server answered with a status other than 200 or 404.
    UnexpectedStatus(u16),
    /// The response body holds no `{ ... }` object.
    JsonNotFound,
    /// The JSON object is malformed or lacks `mac`, `sn` or `pw`.
    JsonParse,
    /// The `mac` field is not six colon-separated hex bytes.
    InvalidMac,
    /// The configuration store rejected the write or commit.
    Storage,
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkDown => write!(f, "Wi-Fi offline, retry when online"),
            Self::Resolve => write!(f, "failed to resolve manufacturing host"),
            Self::SocketOpen => write!(f, "failed to create socket on station interface"),
            Self::ConnectExhausted { attempts } => {
                write!(f, "failed to connect after {attempts} attempts")
            }
            Self::RequestTooLarge => write!(f, "request exceeds buffer"),
            Self::Send => write!(f, "failed to send request"),
            Self::Receive => write!(f, "failed to read response"),
            Self::ReceiveTimeout => write!(f, "timed out waiting for response"),
            Self::ResponseTooLarge => write!(f, "response exceeds buffer"),
            Self::MalformedResponse => write!(f, "malformed HTTP response"),
            Self::NotFound => write!(f, "MAC URL not found"),
            Self::UnexpectedStatus(code) => write!(f, "unexpected HTTP status {code}"),
            Self::JsonNotFound => write!(f, "JSON not found in body"),
            Self::JsonParse => write!(f, "JSON parsing failed"),
            Self::InvalidMac => write!(f, "invalid MAC address"),
            Self::Storage => write!(f, "failed to persist configuration"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, ProvisionError>;
