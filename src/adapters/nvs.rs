//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigStore`] for the provisioning logic and persists the
//! [`ProvisioningConfig`] tunables.
//!
//! # Layout
//!
//! | Namespace | Key       | Blob (postcard)       |
//! |-----------|-----------|-----------------------|
//! | `mfgprov` | `device`  | [`DeviceConfig`]      |
//! | `mfgprov` | `network` | [`NetworkConfig`]     |
//! | `mfgprov` | `provcfg` | [`ProvisioningConfig`]|
//!
//! # Security
//!
//! - Staged writes: `set_mac` / `set_credentials` only touch memory.
//!   `commit()` writes both records and issues a single `nvs_commit()`.
//! - Encrypted NVS: on ESP32 the partition is encrypted when
//!   `CONFIG_NVS_ENCRYPTION` is set, which covers the stored password.
//!   The simulation backend is plaintext (dev/test only).
//! - Config validation: the provisioning tunables are range-checked
//!   before persistence.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigStore, StorageError};
use crate::config::{DeviceConfig, NetworkConfig, ProvisioningConfig, bounded};
use crate::identity::{DeviceIdentity, MacAddress, factory_identity};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "mfgprov";
const DEVICE_KEY: &str = "device";
const NETWORK_KEY: &str = "network";
const PROVISIONING_KEY: &str = "provcfg";

/// Upper bound on any blob this adapter reads back.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 512;

/// NVS-backed configuration store.
pub struct NvsConfigStore {
    device: DeviceConfig,
    network: NetworkConfig,
    staged_device: Option<DeviceConfig>,
    staged_network: Option<NetworkConfig>,

    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
    /// Simulation: reject all writes, as a full partition would.
    #[cfg(not(target_os = "espidf"))]
    read_only: bool,
}

impl NvsConfigStore {
    /// Initialise NVS flash and load the stored records.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised.  Missing or corrupted records fall back to
    /// defaults with the factory identity.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other
            // NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsConfigStore: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsConfigStore: simulation backend");

        let mut this = Self {
            device: DeviceConfig::default(),
            network: NetworkConfig::default(),
            staged_device: None,
            staged_network: None,
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            read_only: false,
        };
        this.reload();
        Ok(this)
    }

    /// Re-read both records from flash, dropping anything staged.
    pub fn reload(&mut self) {
        self.staged_device = None;
        self.staged_network = None;

        self.device = match self.load_record::<DeviceConfig>(DEVICE_KEY) {
            Ok(Some(device)) => device,
            Ok(None) => {
                info!("NvsConfigStore: no device record, using factory identity");
                DeviceConfig::default()
            }
            Err(e) => {
                warn!("NvsConfigStore: device record unreadable ({}), using defaults", e);
                DeviceConfig::default()
            }
        };
        if self.device.identity == DeviceIdentity::default() {
            self.device.identity = factory_identity();
        }

        self.network = match self.load_record::<NetworkConfig>(NETWORK_KEY) {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                warn!("NvsConfigStore: network record unreadable ({}), using defaults", e);
                NetworkConfig::default()
            }
        };
    }

    /// Whether writes are staged but not yet committed.
    pub fn has_pending(&self) -> bool {
        self.staged_device.is_some() || self.staged_network.is_some()
    }

    // ── Provisioning tunables ─────────────────────────────────

    /// Load the stored tunables, or defaults when none are stored.
    /// A stored record outside the valid ranges is an error.
    pub fn load_provisioning_config(&self) -> Result<ProvisioningConfig, ConfigError> {
        match self.load_record::<ProvisioningConfig>(PROVISIONING_KEY) {
            Ok(Some(cfg)) => {
                cfg.validate()?;
                info!("NvsConfigStore: loaded provisioning config");
                Ok(cfg)
            }
            Ok(None) => {
                info!("NvsConfigStore: no stored provisioning config, using defaults");
                Ok(ProvisioningConfig::default())
            }
            Err(StorageError::Corrupted) => Err(ConfigError::Corrupted),
            Err(_) => Err(ConfigError::IoError),
        }
    }

    /// Validate and persist the tunables.
    pub fn save_provisioning_config(
        &mut self,
        config: &ProvisioningConfig,
    ) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blobs(&[(PROVISIONING_KEY, bytes.as_slice())])
            .map_err(|_| ConfigError::IoError)?;
        info!("NvsConfigStore: provisioning config saved");
        Ok(())
    }

    // ── Simulation hooks ──────────────────────────────────────

    /// Simulation: make every write fail with [`StorageError::Full`].
    #[cfg(not(target_os = "espidf"))]
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    // ── Blob helpers ──────────────────────────────────────────

    fn load_record<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        match self.read_blob(key)? {
            Some(bytes) => postcard::from_bytes(&bytes)
                .map(Some)
                .map_err(|_| StorageError::Corrupted),
            None => Ok(None),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(key: &str) -> String {
        format!("{}::{}", NAMESPACE, key)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.store.get(&Self::composite_key(key)).cloned())
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blobs(&mut self, blobs: &[(&str, &[u8])]) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::Full);
        }
        for (key, data) in blobs {
            self.store.insert(Self::composite_key(key), data.to_vec());
        }
        Ok(())
    }

    /// NUL-terminated copy of an NVS namespace or key name (max 15 bytes).
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open the namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(NAMESPACE);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let key_buf = Self::c_name(key);
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            // First call: get size
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        });

        match result {
            Ok(bytes) => Ok(Some(bytes)),
            // A namespace that was never written cannot be opened read-only.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(StorageError::Corrupted),
            Err(e) => {
                warn!("NvsConfigStore: NVS read error {}", e);
                Err(StorageError::IoError)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blobs(&mut self, blobs: &[(&str, &[u8])]) -> Result<(), StorageError> {
        let result = Self::with_nvs_handle(true, |handle| {
            for (key, data) in blobs {
                let key_buf = Self::c_name(key);
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|e| {
            warn!("NvsConfigStore: NVS write error {}", e);
            if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }
}

impl ConfigStore for NvsConfigStore {
    fn identity(&self) -> DeviceIdentity {
        self.device.identity.clone()
    }

    fn device_config(&self) -> DeviceConfig {
        self.device.clone()
    }

    fn network_config(&self) -> NetworkConfig {
        self.network
    }

    fn set_mac(&mut self, mac: MacAddress) -> Result<(), StorageError> {
        let staged = self.staged_network.get_or_insert(self.network);
        staged.mac = Some(mac);
        Ok(())
    }

    fn set_credentials(&mut self, serial_number: &str, password: &str) -> Result<(), StorageError> {
        let staged = self
            .staged_device
            .get_or_insert_with(|| self.device.clone());
        staged.serial_number = bounded(serial_number);
        staged.password = bounded(password);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if !self.has_pending() {
            return Ok(());
        }
        // Staged writes belong to one transaction; a failed commit drops them.
        let device = self
            .staged_device
            .take()
            .unwrap_or_else(|| self.device.clone());
        let network = self.staged_network.take().unwrap_or(self.network);

        let device_bytes = postcard::to_allocvec(&device).map_err(|_| StorageError::IoError)?;
        let network_bytes = postcard::to_allocvec(&network).map_err(|_| StorageError::IoError)?;
        self.write_blobs(&[
            (DEVICE_KEY, device_bytes.as_slice()),
            (NETWORK_KEY, network_bytes.as_slice()),
        ])?;

        self.device = device;
        self.network = network;
        info!(
            "NvsConfigStore: committed ({} + {} bytes)",
            device_bytes.len(),
            network_bytes.len()
        );
        Ok(())
    }
}
