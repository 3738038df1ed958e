//! Fuzz target: `parse_response`
//!
//! Drives arbitrary server responses through the completeness check and
//! the parser, and asserts that a successful parse only ever comes from
//! a 200 response with a brace-delimited body.
//!
//! cargo fuzz run fuzz_response_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use mfgprov::http::response::{find_header_end, isolate_json_object, status_code};
use mfgprov::http::{is_complete, parse_response};

fuzz_target!(|data: &[u8]| {
    let _ = is_complete(data);

    if parse_response(data).is_ok() {
        let body_start = find_header_end(data).expect("success without header terminator");
        assert_eq!(status_code(&data[..body_start]), Some(200));
        assert!(isolate_json_object(&data[body_start..]).is_some());
    }
});
