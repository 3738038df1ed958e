//! Manufacturing provisioning firmware library.
//!
//! Fetches the station MAC address, serial number and password for a
//! freshly built device from the manufacturing server over plain HTTP, and
//! commits them to the device configuration.  All ESP-IDF-specific code is
//! guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod http;
pub mod identity;
