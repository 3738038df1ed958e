//! Application core: provisioning orchestration, zero direct I/O.
//!
//! The [`service`] turns console commands into provisioning fetches and
//! reports outcomes as events.  All interaction with the network, flash
//! and clock happens through the **port traits** in [`ports`].

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
