//! Response parsing.
//!
//! ```text
//!  HTTP/1.1 200 OK\r\n            ── status line  → status_code()
//!  Content-Length: 57\r\n          ── headers      → content_length()
//!  \r\n                            ── terminator   → find_header_end()
//!  {"mac":"..","sn":"..","pw":".."} ── body        → isolate_json_object()
//! ```

use serde::Deserialize;

use crate::config::{Password, SerialNumber};
use crate::error::{ProvisionError, Result};
use crate::fsm::context::ProvisioningResult;
use crate::identity::MacAddress;

/// Capacity of the receive buffer.
pub const RESPONSE_BUFFER_LEN: usize = 1024;

/// Longest `mac` string accepted before MAC validation.
pub const MAC_STRING_LEN: usize = 20;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

const STATUS_OK: u16 = 200;
const STATUS_NOT_FOUND: u16 = 404;

/// The JSON object served by the manufacturing endpoint.
///
/// Every field is bounded; an over-long value fails deserialisation.
#[derive(Debug, Deserialize)]
pub struct ProvisioningPayload {
    pub mac: heapless::String<MAC_STRING_LEN>,
    pub sn: SerialNumber,
    pub pw: Password,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Offset of the first body byte, if the header terminator has arrived.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    find(buf, HEADER_TERMINATOR).map(|i| i + HEADER_TERMINATOR.len())
}

/// Status code from an `HTTP/1.x NNN ...` status line.
pub fn status_code(head: &[u8]) -> Option<u16> {
    let line_end = find(head, b"\r\n").unwrap_or(head.len());
    let line = core::str::from_utf8(&head[..line_end]).ok()?;
    let mut parts = line.split(' ');
    if !parts.next()?.starts_with("HTTP/1.") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

/// Value of the `Content-Length` header, matched case-insensitively.
pub fn content_length(head: &[u8]) -> Option<usize> {
    let head = core::str::from_utf8(head).ok()?;
    head.split("\r\n").skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Whether `buf` holds a whole response: headers plus, when announced,
/// `Content-Length` bytes of body.
///
/// Without a `Content-Length` the response only ends with the stream,
/// so this returns `false` and the reader runs until EOF or timeout.
pub fn is_complete(buf: &[u8]) -> bool {
    let Some(body_start) = find_header_end(buf) else {
        return false;
    };
    match content_length(&buf[..body_start]) {
        Some(len) => buf.len() - body_start >= len,
        None => false,
    }
}

/// The first `{ ... }` object in `body`, with braces matched by depth.
///
/// Braces inside JSON strings (including escaped quotes) do not count.
pub fn isolate_json_object(body: &[u8]) -> Option<&[u8]> {
    let start = body.iter().position(|&b| b == b'{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in body.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Validate a complete response and extract the provisioning record.
///
/// Status is checked before the body is looked at: a 404 is
/// [`ProvisionError::NotFound`] and never reaches the JSON parser.
pub fn parse_response(buf: &[u8]) -> Result<ProvisioningResult> {
    let body_start = find_header_end(buf).ok_or(ProvisionError::MalformedResponse)?;
    let head = &buf[..body_start];

    match status_code(head).ok_or(ProvisionError::MalformedResponse)? {
        STATUS_OK => {}
        STATUS_NOT_FOUND => return Err(ProvisionError::NotFound),
        other => return Err(ProvisionError::UnexpectedStatus(other)),
    }

    let mut body = &buf[body_start..];
    if let Some(len) = content_length(head) {
        body = &body[..len.min(body.len())];
    }

    let json = isolate_json_object(body).ok_or(ProvisionError::JsonNotFound)?;
    let payload: ProvisioningPayload =
        serde_json::from_slice(json).map_err(|_| ProvisionError::JsonParse)?;
    let mac: MacAddress = payload.mac.parse()?;

    Ok(ProvisioningResult {
        mac,
        serial_number: payload.sn,
        password: payload.pw,
    })
}
