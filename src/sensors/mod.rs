//! Spectral sensor subsystem.
//!
//! ```text
//!   As7265x (driver) ──▶ VirtualRegisterBridge ──▶ embedded-hal I2c
//!        │                      │
//!   SpectralSample        registers (map, bit fields)
//! ```
//!
//! On host builds [`sim`] provides an in-memory AS7265x that speaks the
//! same virtual-register protocol over the `I2c` trait.

pub mod as7265x;
pub mod bridge;
pub mod registers;
pub mod sample;

#[cfg(not(target_os = "espidf"))]
pub mod sim;
