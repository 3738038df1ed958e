//! Device identity and MAC address types.
//!
//! The CPU serial words and product id identify the board to the
//! manufacturing server; the MAC address is what the server hands back.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// Maximum product-name length in bytes.
pub const PRODUCT_NAME_LEN: usize = 32;

/// Product reported to the manufacturing server.
pub const PRODUCT_NAME: &str = "mfgprov";
pub const PRODUCT_ID: u32 = 0x1000_0001;

/// 6-byte station MAC address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = ProvisionError;

    /// Parse `XX:XX:XX:XX:XX:XX`: exactly six groups of two hex digits,
    /// either case, nothing before or after.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut groups = s.split(':');
        for octet in &mut octets {
            let group = groups.next().ok_or(ProvisionError::InvalidMac)?;
            if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ProvisionError::InvalidMac);
            }
            *octet = u8::from_str_radix(group, 16).map_err(|_| ProvisionError::InvalidMac)?;
        }
        if groups.next().is_some() {
            return Err(ProvisionError::InvalidMac);
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Identity the device presents to the manufacturing server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// The three 32-bit words of the CPU unique id.
    pub cpu_serial: [u32; 3],
    pub product_id: u32,
    pub product_name: heapless::String<PRODUCT_NAME_LEN>,
}

impl DeviceIdentity {
    pub fn new(cpu_serial: [u32; 3], product_id: u32) -> Self {
        Self {
            cpu_serial,
            product_id,
            product_name: heapless::String::new(),
        }
    }

    /// The 96-bit CPU id as 24 upper-case hex digits.
    pub fn cpu_id_hex(&self) -> heapless::String<24> {
        use core::fmt::Write;
        let mut out = heapless::String::new();
        let [s1, s2, s3] = self.cpu_serial;
        // 24 hex digits always fit.
        let _ = write!(out, "{s1:08X}{s2:08X}{s3:08X}");
        out
    }
}

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn factory_mac() -> [u8; 6] {
    let mut mac = [0u8; 6];
    // SAFETY: the buffer is exactly the six bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: a deterministic fake factory MAC.
#[cfg(not(target_os = "espidf"))]
pub fn factory_mac() -> [u8; 6] {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Identity burned in at the factory.
///
/// The chip exposes a 48-bit unique id rather than a 96-bit one, so the
/// first serial word is zero and the MAC fills the remaining 64 bits.
pub fn factory_identity() -> DeviceIdentity {
    let m = factory_mac();
    let mut identity = DeviceIdentity::new(
        [
            0,
            u32::from(u16::from_be_bytes([m[0], m[1]])),
            u32::from_be_bytes([m[2], m[3], m[4], m[5]]),
        ],
        PRODUCT_ID,
    );
    // PRODUCT_NAME fits PRODUCT_NAME_LEN.
    let _ = identity.product_name.push_str(PRODUCT_NAME);
    identity
}
