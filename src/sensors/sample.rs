//! 18-channel spectral sample.
//!
//! Each sub-device contributes six calibrated channels, stored on the chip
//! as big-endian IEEE-754 floats in four consecutive virtual registers.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::registers::{CHANNELS_PER_DEVICE, DeviceSelector};

/// Value stored in a channel whose read failed.
pub const CHANNEL_SENTINEL: f32 = 0.0;

/// Total channels across the three chips.
pub const CHANNEL_COUNT: usize = 18;

/// Named spectral channels, ordered by wavelength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    A = 0,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    R,
    I,
    S,
    J,
    T,
    U,
    V,
    W,
    K,
    L,
}

impl Channel {
    pub const ALL: [Self; CHANNEL_COUNT] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::R,
        Self::I,
        Self::S,
        Self::J,
        Self::T,
        Self::U,
        Self::V,
        Self::W,
        Self::K,
        Self::L,
    ];

    /// Nominal centre wavelength in nanometres.
    pub const fn wavelength_nm(self) -> u16 {
        match self {
            Self::A => 410,
            Self::B => 435,
            Self::C => 460,
            Self::D => 485,
            Self::E => 510,
            Self::F => 535,
            Self::G => 560,
            Self::H => 585,
            Self::R => 610,
            Self::I => 645,
            Self::S => 680,
            Self::J => 705,
            Self::T => 730,
            Self::U => 760,
            Self::V => 810,
            Self::W => 860,
            Self::K => 900,
            Self::L => 940,
        }
    }

    /// Telemetry key, e.g. `"A_410nm"`.
    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "A_410nm",
            Self::B => "B_435nm",
            Self::C => "C_460nm",
            Self::D => "D_485nm",
            Self::E => "E_510nm",
            Self::F => "F_535nm",
            Self::G => "G_560nm",
            Self::H => "H_585nm",
            Self::R => "R_610nm",
            Self::I => "I_645nm",
            Self::S => "S_680nm",
            Self::J => "J_705nm",
            Self::T => "T_730nm",
            Self::U => "U_760nm",
            Self::V => "V_810nm",
            Self::W => "W_860nm",
            Self::K => "K_900nm",
            Self::L => "L_940nm",
        }
    }

    /// The six channels a sub-device reports, in register order.
    pub const fn bank(device: DeviceSelector) -> [Self; CHANNELS_PER_DEVICE] {
        match device {
            DeviceSelector::Master => [Self::R, Self::S, Self::T, Self::U, Self::V, Self::W],
            DeviceSelector::SlaveA => [Self::G, Self::H, Self::I, Self::J, Self::K, Self::L],
            DeviceSelector::SlaveB => [Self::A, Self::B, Self::C, Self::D, Self::E, Self::F],
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Decode one calibrated channel from its four register bytes (MSB first).
pub fn decode_channel(bytes: [u8; 4]) -> f32 {
    f32::from_be_bytes(bytes)
}

/// One complete 18-channel reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralSample {
    values: [f32; CHANNEL_COUNT],
    /// Bit `n` set = channel with index `n` holds [`CHANNEL_SENTINEL`].
    degraded: u32,
}

impl Default for SpectralSample {
    fn default() -> Self {
        Self {
            values: [CHANNEL_SENTINEL; CHANNEL_COUNT],
            degraded: 0,
        }
    }
}

impl SpectralSample {
    pub fn get(&self, channel: Channel) -> f32 {
        self.values[channel.index()]
    }

    pub fn set(&mut self, channel: Channel, value: f32) {
        self.values[channel.index()] = value;
        self.degraded &= !(1 << channel.index());
    }

    /// Replace a channel with the sentinel and flag it.
    pub fn mark_degraded(&mut self, channel: Channel) {
        self.values[channel.index()] = CHANNEL_SENTINEL;
        self.degraded |= 1 << channel.index();
    }

    pub fn is_degraded(&self, channel: Channel) -> bool {
        self.degraded & (1 << channel.index()) != 0
    }

    pub fn degraded_count(&self) -> u32 {
        self.degraded.count_ones()
    }

    /// `true` when every channel was read successfully.
    pub fn is_complete(&self) -> bool {
        self.degraded == 0
    }

    /// Channels in wavelength order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, f32)> + '_ {
        Channel::ALL.iter().map(|&ch| (ch, self.get(ch)))
    }
}

impl Serialize for SpectralSample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CHANNEL_COUNT))?;
        for (channel, value) in self.iter() {
            map.serialize_entry(channel.label(), &value)?;
        }
        map.end()
    }
}
