//! Manufacturing provisioning firmware: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Adapters (outer ring)                    │
//! │                                                          │
//! │  StdNetwork     NvsConfigStore   SystemClock  LogEventSink│
//! │  (NetworkPort)  (ConfigStore)    (TimePort)   (EventSink) │
//! │                                                          │
//! │  ─────────────── Port Trait Boundary ──────────────      │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────┐      │
//! │  │   ProvisioningService (pure logic)             │      │
//! │  │   FetchMachine · HTTP request/response         │      │
//! │  └────────────────────────────────────────────────┘      │
//! │                                                          │
//! │  Serial console: one command per line                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use mfgprov::adapters::log_sink::LogEventSink;
use mfgprov::adapters::net::StdNetwork;
use mfgprov::adapters::nvs::NvsConfigStore;
use mfgprov::adapters::time::SystemClock;
use mfgprov::adapters::wifi::{self, WifiCredentials};
use mfgprov::app::commands::AppCommand;
use mfgprov::app::ports::ConfigStore;
use mfgprov::app::service::ProvisioningService;
use mfgprov::config::ProvisioningConfig;

/// Station credentials baked in at build time.
const WIFI_SSID: &str = match option_env!("MFGPROV_WIFI_SSID") {
    Some(s) => s,
    None => "",
};
const WIFI_PASS: &str = match option_env!("MFGPROV_WIFI_PASS") {
    Some(s) => s,
    None => "",
};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("mfgprov v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration store ────────────────────────────────
    let store = NvsConfigStore::new().map_err(|e| anyhow::anyhow!("NVS init failed: {}", e))?;
    let config = match store.load_provisioning_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Provisioning config load failed ({}), using defaults", e);
            ProvisioningConfig::default()
        }
    };
    let identity = store.identity();
    info!(
        "Setting up {}, Product ID: 0x{:08X}, CPU ID: 0x{}",
        identity.product_name,
        identity.product_id,
        identity.cpu_id_hex()
    );

    // ── 3. Station link ───────────────────────────────────────
    let net = StdNetwork::new(Default::default());
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take().ok();

    // Keeps the driver and the link tracking alive for the rest of the run.
    let _wifi = match WifiCredentials::new(WIFI_SSID, WIFI_PASS) {
        Ok(creds) => match wifi::connect_station(
            peripherals.modem,
            sys_loop,
            nvs_partition,
            &creds,
            &net.link_flag(),
        ) {
            Ok(driver) => Some(driver),
            Err(e) => {
                warn!("Wi-Fi bring-up failed ({}), provisioning unavailable", e);
                None
            }
        },
        Err(e) => {
            warn!("No usable Wi-Fi credentials ({}), provisioning unavailable", e);
            None
        }
    };

    // ── 4. Service + console loop ─────────────────────────────
    let mut service = ProvisioningService::new(net, store, SystemClock::new(), config);
    let mut sink = LogEventSink::new();

    if service.store().network_config().mac.is_none() {
        info!("No MAC address provisioned, fetching from manufacturing server");
        service.handle_command(AppCommand::GetSnMac, &mut sink);
    }

    info!("Console ready, type ? for help");
    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) => service.handle_line(&line, &mut sink),
            Err(e) => {
                warn!("Console read failed: {}", e);
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
        }
    }
    Ok(())
}
