//! GPIO / peripheral pin assignments for the Waterly sensor board.
//!
//! Single source of truth for the wiring.  The typed pins `main` takes from
//! the peripherals (`gpio21`, `gpio22`) must match these numbers.

// ---------------------------------------------------------------------------
// I²C bus (AS7265x spectral sensor, SSD1306 status display)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;

/// Standard-mode clock.  The AS7265x tolerates 400 kHz but the display
/// wiring on the reference board does not.
pub const I2C_FREQ_HZ: u32 = 100_000;
