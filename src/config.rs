//! Configuration records.
//!
//! [`ProvisioningConfig`] holds the tunables of the fetch transaction.
//! [`DeviceConfig`] and [`NetworkConfig`] are the persisted records the
//! transaction writes on success.  All of them are stored in NVS as
//! `postcard` blobs by the [`NvsConfigStore`](crate::adapters::nvs::NvsConfigStore).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::identity::{DeviceIdentity, MacAddress};

/// Maximum stored serial-number length in bytes.
pub const SERIAL_NUMBER_LEN: usize = 16;
/// Maximum stored password length in bytes.
pub const PASSWORD_LEN: usize = 32;
/// Maximum manufacturing hostname length in bytes.
pub const HOST_LEN: usize = 64;

pub type SerialNumber = heapless::String<SERIAL_NUMBER_LEN>;
pub type Password = heapless::String<PASSWORD_LEN>;
pub type HostName = heapless::String<HOST_LEN>;

/// Default manufacturing server.
pub const DEFAULT_HOST: &str = "mfg.imatrix.io";

/// Tunables for one provisioning fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Manufacturing server hostname.
    pub host: HostName,
    /// HTTP port on the manufacturing server.
    pub port: u16,
    /// Timeout of a single TCP connect attempt (milliseconds).
    pub connect_timeout_ms: u32,
    /// Connect attempts before the transaction gives up.
    pub max_connect_attempts: u8,
    /// Receive timeout of a single read (milliseconds).
    pub recv_timeout_ms: u32,
    /// Empty reads tolerated before the transaction gives up.
    pub max_data_retries: u8,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        let mut host = HostName::new();
        // DEFAULT_HOST is well under HOST_LEN.
        let _ = host.push_str(DEFAULT_HOST);
        Self {
            host,
            port: 80,
            connect_timeout_ms: 1000,
            max_connect_attempts: 5,
            recv_timeout_ms: 2000,
            max_data_retries: 2,
        }
    }
}

impl ProvisioningConfig {
    /// Range-check every field before the config is used or persisted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("host must not be empty"));
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationFailed("port must be non-zero"));
        }
        if !(100..=30_000).contains(&self.connect_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "connect_timeout_ms must be 100-30000",
            ));
        }
        if !(1..=20).contains(&self.max_connect_attempts) {
            return Err(ConfigError::ValidationFailed(
                "max_connect_attempts must be 1-20",
            ));
        }
        if !(100..=30_000).contains(&self.recv_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "recv_timeout_ms must be 100-30000",
            ));
        }
        if self.max_data_retries > 20 {
            return Err(ConfigError::ValidationFailed("max_data_retries must be 0-20"));
        }
        Ok(())
    }
}

/// Persisted device record: identity plus manufacturing credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub identity: DeviceIdentity,
    pub serial_number: SerialNumber,
    pub password: Password,
}

/// Persisted network record for the station interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Station MAC assigned by manufacturing, if any.
    pub mac: Option<MacAddress>,
}

/// Copy `src` into a bounded string, truncating at a char boundary.
pub fn bounded<const N: usize>(src: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in src.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
