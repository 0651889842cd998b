//! AS7265x triad spectral sensor driver.
//!
//! Three chips share one I2C address: the AS72651 (NIR) acts as master and
//! serves the virtual registers of the AS72652 (VIS) and AS72653 (UV)
//! through DEV_SEL.  Banked registers (LED_CONFIG and the calibrated data
//! block) follow the current DEV_SEL value, so every multi-device operation
//! runs under a [`BankGuard`] that puts DEV_SEL back on the master when it
//! goes out of scope, whichever way the operation ends.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use super::bridge::VirtualRegisterBridge;
use super::registers::{
    BYTES_PER_CHANNEL, BulbCurrent, CONFIG_DATA_RDY, CONFIG_SOFT_RESET, DeviceSelector, Gain,
    HW_TYPE_AS7265X, IndicatorCurrent, MeasurementConfig, MeasurementMode, VIRT_CALIBRATED_START,
    VIRT_CONFIG, VIRT_DEV_SEL, VIRT_HW_VERSION, VIRT_INT_TIME, VIRT_LED_CONFIG, merge_bulb,
    merge_config, merge_indicator,
};
use super::sample::{Channel, SpectralSample, decode_channel};
use crate::error::{BusError, SensorError};
use crate::retry::{RetryPolicy, poll_until_with};

/// HW_VERSION probe while the chip boots: 5 tries, 50 ms apart.
pub const IDENTITY_RETRY: RetryPolicy = RetryPolicy::new(50, 5);
/// Time the chipset needs after a soft reset.
pub const RESET_SETTLE_MS: u32 = 1200;
/// Pause after switching DEV_SEL to a slave before reading its data.
pub const SLAVE_SETTLE_MS: u32 = 5;

pub struct As7265x<I2C, D> {
    bridge: VirtualRegisterBridge<I2C, D>,
    /// Last DEV_SEL value the chip acknowledged.
    selected: DeviceSelector,
    config: MeasurementConfig,
}

impl<I2C: I2c, D: DelayNs> As7265x<I2C, D> {
    pub fn new(bridge: VirtualRegisterBridge<I2C, D>) -> Self {
        Self {
            bridge,
            selected: DeviceSelector::Master,
            config: MeasurementConfig::default(),
        }
    }

    /// Identify the chipset, soft-reset it, and load the default
    /// acquisition settings.
    pub fn init(&mut self) -> Result<(), SensorError> {
        // Bus errors here just mean the chip has not finished booting.
        let found = poll_until_with(
            IDENTITY_RETRY,
            &mut self.bridge,
            |b, ms| b.delay_ms(ms),
            |b| -> Result<Option<()>, Infallible> {
                match b.read(VIRT_HW_VERSION) {
                    Ok(HW_TYPE_AS7265X) => Ok(Some(())),
                    Ok(other) => {
                        debug!("AS7265x: HW_VERSION {:#04x}, waiting", other);
                        Ok(None)
                    }
                    Err(e) => {
                        debug!("AS7265x: identity probe failed: {}", e);
                        Ok(None)
                    }
                }
            },
        );
        if found.is_err() {
            warn!("AS7265x: no device answered at 0x49");
            return Err(SensorError::DeviceNotFound);
        }

        self.bridge.write(VIRT_CONFIG, CONFIG_SOFT_RESET)?;
        self.bridge.delay_ms(RESET_SETTLE_MS);
        self.selected = DeviceSelector::Master;

        let defaults = MeasurementConfig::default();
        self.set_config(defaults.mode, defaults.gain)?;
        self.set_integration_time(defaults.integration_units)?;
        info!(
            "AS7265x: ready ({:?}, gain {:?}, {} units)",
            defaults.mode, defaults.gain, defaults.integration_units
        );
        Ok(())
    }

    /// Set the bank mode and gain, leaving the other CONFIG bits alone.
    pub fn set_config(&mut self, mode: MeasurementMode, gain: Gain) -> Result<(), BusError> {
        let current = self.bridge.read(VIRT_CONFIG)?;
        self.bridge.write(VIRT_CONFIG, merge_config(current, mode, gain))?;
        self.config.mode = mode;
        self.config.gain = gain;
        Ok(())
    }

    pub fn set_integration_time(&mut self, units: u8) -> Result<(), BusError> {
        self.bridge.write(VIRT_INT_TIME, units)?;
        self.config.integration_units = units;
        Ok(())
    }

    /// Drive the illumination bulb of all three chips.
    pub fn set_bulb_current(&mut self, current: BulbCurrent, enable: bool) -> Result<(), BusError> {
        let mut guard = self.bank_guard();
        for device in DeviceSelector::ALL {
            guard.select(device)?;
            let led = guard.bridge.read(VIRT_LED_CONFIG)?;
            guard
                .bridge
                .write(VIRT_LED_CONFIG, merge_bulb(led, current, enable))?;
        }
        Ok(())
    }

    /// The master chip's indicator LED.
    pub fn set_indicator_led(
        &mut self,
        enable: bool,
        current: IndicatorCurrent,
    ) -> Result<(), BusError> {
        let mut guard = self.bank_guard();
        guard.select(DeviceSelector::Master)?;
        let led = guard.bridge.read(VIRT_LED_CONFIG)?;
        guard
            .bridge
            .write(VIRT_LED_CONFIG, merge_indicator(led, current, enable))
    }

    /// Non-blocking check of the DATA_RDY flag.
    pub fn data_ready(&mut self) -> Result<bool, BusError> {
        Ok(self.bridge.read(VIRT_CONFIG)? & CONFIG_DATA_RDY != 0)
    }

    /// Read all 18 calibrated channels, master bank first.
    ///
    /// A channel whose bytes cannot be read holds the sentinel and is
    /// flagged in the sample.  A slave bank that cannot be selected
    /// degrades its six channels.  Only a failure to select the master
    /// bank is an error.
    pub fn read_all_channels(&mut self) -> Result<SpectralSample, SensorError> {
        let mut sample = SpectralSample::default();
        let mut guard = self.bank_guard();

        for device in DeviceSelector::ALL {
            if let Err(e) = guard.select(device) {
                if device == DeviceSelector::Master {
                    return Err(e.into());
                }
                warn!("AS7265x: cannot select {:?} ({}), bank degraded", device, e);
                for channel in Channel::bank(device) {
                    sample.mark_degraded(channel);
                }
                continue;
            }
            if device != DeviceSelector::Master {
                guard.bridge.delay_ms(SLAVE_SETTLE_MS);
            }
            for (i, channel) in Channel::bank(device).into_iter().enumerate() {
                match guard.read_channel(i) {
                    Ok(value) => sample.set(channel, value),
                    Err(e) => {
                        warn!(
                            "AS7265x: {} on {} ({})",
                            SensorError::ChannelReadDegraded,
                            channel.label(),
                            e
                        );
                        sample.mark_degraded(channel);
                    }
                }
            }
        }
        drop(guard);

        if !sample.is_complete() {
            warn!(
                "AS7265x: sample has {} degraded channel(s)",
                sample.degraded_count()
            );
        }
        Ok(sample)
    }

    /// Driver view of DEV_SEL.
    pub fn selector(&self) -> DeviceSelector {
        self.selected
    }

    pub fn config(&self) -> MeasurementConfig {
        self.config
    }

    /// Suspend through the bridge's delay provider.
    pub fn delay_ms(&mut self, ms: u32) {
        self.bridge.delay_ms(ms);
    }

    pub fn release(self) -> VirtualRegisterBridge<I2C, D> {
        self.bridge
    }

    fn bank_guard(&mut self) -> BankGuard<'_, I2C, D> {
        BankGuard {
            bridge: &mut self.bridge,
            selected: &mut self.selected,
        }
    }
}

// ── DEV_SEL scope ─────────────────────────────────────────────

/// Borrow of the bridge for a multi-device operation.  Writes
/// DEV_SEL = Master on drop.
struct BankGuard<'a, I2C: I2c, D: DelayNs> {
    bridge: &'a mut VirtualRegisterBridge<I2C, D>,
    selected: &'a mut DeviceSelector,
}

impl<I2C: I2c, D: DelayNs> BankGuard<'_, I2C, D> {
    fn select(&mut self, device: DeviceSelector) -> Result<(), BusError> {
        self.bridge.write(VIRT_DEV_SEL, device as u8)?;
        *self.selected = device;
        Ok(())
    }

    fn read_channel(&mut self, index: usize) -> Result<f32, BusError> {
        let base = VIRT_CALIBRATED_START + index as u8 * BYTES_PER_CHANNEL;
        let mut bytes = [0u8; 4];
        for (offset, byte) in (0u8..).zip(bytes.iter_mut()) {
            *byte = self.bridge.read(base + offset)?;
        }
        Ok(decode_channel(bytes))
    }
}

impl<I2C: I2c, D: DelayNs> Drop for BankGuard<'_, I2C, D> {
    fn drop(&mut self) {
        if let Err(e) = self.select(DeviceSelector::Master) {
            warn!("AS7265x: DEV_SEL restore failed: {}", e);
        }
    }
}
