//! Hardware adapter: exposes the AS7265x driver through [`SpectralPort`].
//!
//! The driver is generic over any `embedded-hal` 1.0 bus and delay, so the
//! same impl serves the ESP-IDF `I2cDriver` and the host simulation.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::app::ports::SpectralPort;
use crate::error::{BusError, SensorError};
use crate::sensors::as7265x::As7265x;
use crate::sensors::registers::{BulbCurrent, Gain, MeasurementMode};
use crate::sensors::sample::SpectralSample;

// ── SpectralPort implementation ───────────────────────────────

impl<I2C: I2c, D: DelayNs> SpectralPort for As7265x<I2C, D> {
    fn init(&mut self) -> Result<(), SensorError> {
        As7265x::init(self)
    }

    fn set_illumination(&mut self, current: BulbCurrent, enable: bool) -> Result<(), BusError> {
        self.set_bulb_current(current, enable)
    }

    fn set_integration_time(&mut self, units: u8) -> Result<(), BusError> {
        As7265x::set_integration_time(self, units)
    }

    fn configure(&mut self, mode: MeasurementMode, gain: Gain) -> Result<(), BusError> {
        self.set_config(mode, gain)
    }

    fn data_ready(&mut self) -> Result<bool, BusError> {
        As7265x::data_ready(self)
    }

    fn read_all_channels(&mut self) -> Result<SpectralSample, SensorError> {
        As7265x::read_all_channels(self)
    }

    fn integration_units(&self) -> u8 {
        self.config().integration_units
    }

    fn delay_ms(&mut self, ms: u32) {
        As7265x::delay_ms(self, ms);
    }
}
