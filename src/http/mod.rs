//! Minimal HTTP/1.1 client helpers for the manufacturing endpoint.
//!
//! Only what one provisioning round trip needs: format a GET into a
//! fixed-capacity buffer, and pick apart a bounded response buffer.
//! Nothing here allocates beyond `heapless` buffers and the `serde_json`
//! parse of the isolated JSON object.

pub mod request;
pub mod response;

pub use request::{RequestBuffer, build_request};
pub use response::{ProvisioningPayload, is_complete, parse_response};
