//! Wi-Fi station bring-up.
//!
//! The provisioning fetch needs a station link before it can resolve the
//! manufacturing server.  [`connect_station`] joins the configured access
//! point with `esp-idf-svc`'s `BlockingWifi` and raises the shared link
//! flag that [`StdNetwork`](super::net::StdNetwork) reads.  Station
//! events on the system loop keep the flag current after bring-up, so a
//! fetch started while the access point is gone fails with `LinkDown`.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF Wi-Fi driver.
//! - **all other targets**: only credential validation is compiled.

use core::fmt;

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(
                f,
                "password invalid (must be 8-64 bytes for WPA2, or empty for open)"
            ),
            Self::ConnectionFailed => write!(f, "Wi-Fi connection failed"),
        }
    }
}

impl std::error::Error for WifiError {}

/// Station credentials, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, WifiError> {
        if ssid.is_empty() || !ssid.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
            return Err(WifiError::InvalidSsid);
        }
        if !password.is_empty() && !(8..=64).contains(&password.len()) {
            return Err(WifiError::InvalidPassword);
        }
        let mut creds = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        creds.ssid.push_str(ssid).map_err(|_| WifiError::InvalidSsid)?;
        creds
            .password
            .push_str(password)
            .map_err(|_| WifiError::InvalidPassword)?;
        Ok(creds)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// Station bring-up (ESP-IDF)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::{StationLink, connect_station};

#[cfg(target_os = "espidf")]
mod esp {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{
        AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi, WifiEvent,
    };
    use log::{info, warn};

    use super::{WifiCredentials, WifiError};

    const CONNECT_ATTEMPTS: u32 = 5;
    const RETRY_DELAY_MS: u64 = 3_000;

    /// A joined station.  Dropping it stops the driver and the link
    /// tracking.
    pub struct StationLink {
        _wifi: Box<EspWifi<'static>>,
        _subscription: EspSubscription<'static, System>,
    }

    /// Keep `link` in step with the station state.  A dropped station
    /// lowers the flag and asks the driver to reconnect.
    fn track_link(
        sys_loop: &EspSystemEventLoop,
        link: &Arc<AtomicBool>,
    ) -> anyhow::Result<EspSubscription<'static, System>> {
        let link = Arc::clone(link);
        let subscription = sys_loop.subscribe::<WifiEvent, _>(move |event: WifiEvent| match event {
            WifiEvent::StaDisconnected(_) => {
                if link.swap(false, Ordering::AcqRel) {
                    warn!("WiFi: station disconnected, reconnecting");
                }
                let ret = unsafe { esp_idf_svc::sys::esp_wifi_connect() };
                if ret != esp_idf_svc::sys::ESP_OK {
                    warn!("WiFi: reconnect request failed ({})", ret);
                }
            }
            WifiEvent::StaConnected(_) => {
                if !link.swap(true, Ordering::AcqRel) {
                    info!("WiFi: station connected");
                }
            }
            _ => {}
        })?;
        Ok(subscription)
    }

    /// Join the access point and raise `link` once the netif is up.
    /// Later disconnects and reconnects update `link` as they happen.
    ///
    /// The returned handle must stay alive for as long as the link is used.
    pub fn connect_station(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        creds: &WifiCredentials,
        link: &Arc<AtomicBool>,
    ) -> anyhow::Result<StationLink> {
        let mut esp_wifi = Box::new(EspWifi::new(modem, sys_loop.clone(), nvs)?);
        let mut wifi = BlockingWifi::wrap(esp_wifi.as_mut(), sys_loop.clone())?;

        let auth_method = if creds.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: creds
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| WifiError::InvalidSsid)?,
            password: creds
                .password
                .as_str()
                .try_into()
                .map_err(|_| WifiError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        }))?;

        wifi.start()?;
        info!("WiFi: started, connecting to '{}'", creds.ssid());

        for attempt in 1..=CONNECT_ATTEMPTS {
            match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
                Ok(()) => {
                    let ip = wifi.wifi().sta_netif().get_ip_info()?;
                    info!("WiFi: connected on attempt {}, IP {}", attempt, ip.ip);
                    link.store(true, Ordering::Release);
                    drop(wifi);
                    let subscription = track_link(&sys_loop, link)?;
                    return Ok(StationLink {
                        _wifi: esp_wifi,
                        _subscription: subscription,
                    });
                }
                Err(e) => {
                    warn!("WiFi: attempt {}/{} failed: {}", attempt, CONNECT_ATTEMPTS, e);
                    if attempt < CONNECT_ATTEMPTS {
                        let _ = wifi.disconnect();
                        thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                    }
                }
            }
        }

        link.store(false, Ordering::Release);
        let _ = wifi.stop();
        Err(WifiError::ConnectionFailed.into())
    }
}
