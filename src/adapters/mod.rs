//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements            | Connects to                   |
//! |------------|-----------------------|-------------------------------|
//! | `log_sink` | EventSink             | Serial log output             |
//! | `net`      | NetworkPort           | `std::net` (lwIP on target)   |
//! |            | SocketPort            |                               |
//! | `nvs`      | ConfigStore           | NVS / in-memory store         |
//! | `time`     | TimePort              | ESP32 system timer            |
//! | `wifi`     | (link flag)           | ESP-IDF Wi-Fi STA             |

pub mod log_sink;
pub mod net;
pub mod nvs;
pub mod time;
pub mod wifi;
