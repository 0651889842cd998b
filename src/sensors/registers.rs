//! AS7265x register map and typed register fields.
//!
//! The chipset exposes three *physical* I2C registers.  Everything else is
//! a *virtual* register served by the master chip's secondary controller
//! and reached through the handshake in [`super::bridge`].

use serde::{Deserialize, Serialize};

/// Fixed 7-bit I2C address of the master chip.
pub const I2C_ADDRESS: u8 = 0x49;

// ---------------------------------------------------------------------------
// Physical registers
// ---------------------------------------------------------------------------

pub const PHY_STATUS: u8 = 0x00;
pub const PHY_WRITE: u8 = 0x01;
pub const PHY_READ: u8 = 0x02;

/// Master still holds an unconsumed byte in WRITE.
pub const STATUS_TX_VALID: u8 = 0x02;
/// READ holds a byte for us.
pub const STATUS_RX_VALID: u8 = 0x01;

/// Set on the address byte to request a virtual write.
pub const WRITE_MARKER: u8 = 0x80;

// ---------------------------------------------------------------------------
// Virtual registers
// ---------------------------------------------------------------------------

pub const VIRT_HW_VERSION: u8 = 0x00;
pub const VIRT_CONFIG: u8 = 0x04;
pub const VIRT_INT_TIME: u8 = 0x05;
pub const VIRT_LED_CONFIG: u8 = 0x07;
pub const VIRT_DEV_SEL: u8 = 0x4F;
/// First byte of the six calibrated float channels of the selected device.
pub const VIRT_CALIBRATED_START: u8 = 0x14;

/// Value of HW_VERSION identifying an AS7265x.
pub const HW_TYPE_AS7265X: u8 = 0x40;

// CONFIG bits
pub const CONFIG_SOFT_RESET: u8 = 0x80;
pub const CONFIG_DATA_RDY: u8 = 0x02;
pub const CONFIG_BANK_SHIFT: u8 = 2;
pub const CONFIG_GAIN_SHIFT: u8 = 4;
pub const CONFIG_MODE_GAIN_MASK: u8 = 0b0011_1100;

// LED_CONFIG bits
pub const LED_BULB_ENABLE: u8 = 1 << 3;
pub const LED_BULB_CURRENT_SHIFT: u8 = 4;
pub const LED_BULB_MASK: u8 = 0b0011_1000;
pub const LED_INDICATOR_ENABLE: u8 = 1;
pub const LED_INDICATOR_CURRENT_SHIFT: u8 = 1;
pub const LED_INDICATOR_MASK: u8 = 0b0000_0111;

/// Channels per sub-device and bytes per channel.
pub const CHANNELS_PER_DEVICE: usize = 6;
pub const BYTES_PER_CHANNEL: u8 = 4;

// ---------------------------------------------------------------------------
// Typed fields
// ---------------------------------------------------------------------------

/// Which of the three chips subsequent banked reads target (DEV_SEL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceSelector {
    /// AS72651; NIR, also hosts the virtual-register controller.
    Master = 0,
    /// AS72652; visible.
    SlaveA = 1,
    /// AS72653; UV.
    SlaveB = 2,
}

impl DeviceSelector {
    pub const ALL: [Self; 3] = [Self::Master, Self::SlaveA, Self::SlaveB];

    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw & 0x03 {
            0 => Some(Self::Master),
            1 => Some(Self::SlaveA),
            2 => Some(Self::SlaveB),
            _ => None,
        }
    }
}

/// CONFIG bank mode (bits 2–3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MeasurementMode {
    FourChannel = 0,
    FourChannelAlt = 1,
    SixChannelContinuous = 2,
    SixChannelOneShot = 3,
}

/// Analog gain (bits 4–5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Gain {
    X1 = 0,
    X3_7 = 1,
    X16 = 2,
    X64 = 3,
}

/// Illumination bulb drive current (LED_CONFIG bits 4–5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BulbCurrent {
    Ma12_5 = 0,
    Ma25 = 1,
    Ma50 = 2,
    Ma100 = 3,
}

impl BulbCurrent {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Indicator LED drive current (LED_CONFIG bits 1–2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum IndicatorCurrent {
    Ma1 = 0,
    Ma2 = 1,
    Ma4 = 2,
    Ma8 = 3,
}

/// Acquisition settings applied through CONFIG and INT_TIME.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementConfig {
    pub mode: MeasurementMode,
    pub gain: Gain,
    /// Integration time in 2.8 ms units.
    pub integration_units: u8,
}

impl MeasurementConfig {
    /// Real integration time for one sub-device.
    pub fn integration_time_ms(&self) -> f32 {
        integration_time_ms(self.integration_units)
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            mode: MeasurementMode::SixChannelContinuous,
            gain: Gain::X64,
            integration_units: 50,
        }
    }
}

/// `units × 2.8 ms`.
pub fn integration_time_ms(units: u8) -> f32 {
    f32::from(units) * 2.8
}

/// Merge mode and gain into an existing CONFIG value, preserving every
/// other bit.
pub fn merge_config(current: u8, mode: MeasurementMode, gain: Gain) -> u8 {
    (current & !CONFIG_MODE_GAIN_MASK)
        | ((mode as u8) << CONFIG_BANK_SHIFT)
        | ((gain as u8) << CONFIG_GAIN_SHIFT)
}

/// Merge bulb enable/current into an existing LED_CONFIG value.
pub fn merge_bulb(current: u8, bulb: BulbCurrent, enable: bool) -> u8 {
    let cleared = current & !LED_BULB_MASK;
    if enable {
        cleared | LED_BULB_ENABLE | (bulb.code() << LED_BULB_CURRENT_SHIFT)
    } else {
        cleared
    }
}

/// Merge indicator enable/current into an existing LED_CONFIG value.
pub fn merge_indicator(current: u8, indicator: IndicatorCurrent, enable: bool) -> u8 {
    let cleared = current & !LED_INDICATOR_MASK;
    if enable {
        cleared | LED_INDICATOR_ENABLE | ((indicator as u8) << LED_INDICATOR_CURRENT_SHIFT)
    } else {
        cleared
    }
}
