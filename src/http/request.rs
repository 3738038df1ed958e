//! Request formatting.

use core::fmt::Write;

use crate::error::{ProvisionError, Result};
use crate::identity::DeviceIdentity;

/// Capacity of the outgoing request buffer.
pub const REQUEST_BUFFER_LEN: usize = 256;

pub type RequestBuffer = heapless::String<REQUEST_BUFFER_LEN>;

/// Format the device lookup query for `host`.
///
/// The CPU id and product id travel as `0x`-prefixed upper-case hex query
/// parameters.  A request that does not fit [`REQUEST_BUFFER_LEN`] is an
/// error rather than a truncated request.
pub fn build_request(host: &str, identity: &DeviceIdentity) -> Result<RequestBuffer> {
    let mut req = RequestBuffer::new();
    write!(
        req,
        "GET /device?cpuid=0x{}&productid=0x{:08X} HTTP/1.1\r\n\
         Host: {}\r\n\
         Connection: close\r\n\
         \r\n",
        identity.cpu_id_hex(),
        identity.product_id,
        host
    )
    .map_err(|_| ProvisionError::RequestTooLarge)?;
    Ok(req)
}
