//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements        | Connects to                  |
//! |------------|-------------------|------------------------------|
//! | `hardware` | SpectralPort      | AS7265x over embedded-hal I2C|
//! | `log_sink` | TelemetrySink     | Serial log output (JSON)     |
//! |            | DisplaySink       | Serial log + frame buffer    |
//! | `time`     | Clock             | ESP32 system timer / sim     |
//! | `update`   | UpdateDelegate    | Version manifest + transport |

pub mod hardware;
pub mod log_sink;
pub mod time;
pub mod update;
