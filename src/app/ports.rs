//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppController (domain)
//! ```
//!
//! Driven adapters (spectral sensor, display, telemetry, update client,
//! clock, watchdog) implement these traits.  The
//! [`AppController`](super::controller::AppController) consumes them through
//! a [`Board`] bundle, so the domain core never touches hardware directly.

use embedded_hal::delay::DelayNs;

use crate::error::{BusError, Error, SensorError};
use crate::sensors::registers::{BulbCurrent, Gain, MeasurementMode};
use crate::sensors::sample::SpectralSample;

// ───────────────────────────────────────────────────────────────
// Spectral port (driven adapter: sensor ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Operations the measurement sequencer needs from the spectral device.
pub trait SpectralPort {
    /// Identify and reset the device.  Called once at controller start.
    fn init(&mut self) -> Result<(), SensorError>;

    /// Switch the illumination bulb on every sub-device.
    fn set_illumination(&mut self, current: BulbCurrent, enable: bool) -> Result<(), BusError>;

    /// Integration time in 2.8 ms units.
    fn set_integration_time(&mut self, units: u8) -> Result<(), BusError>;

    /// Apply bank mode and gain.  Writing one-shot mode starts a conversion.
    fn configure(&mut self, mode: MeasurementMode, gain: Gain) -> Result<(), BusError>;

    fn data_ready(&mut self) -> Result<bool, BusError>;

    fn read_all_channels(&mut self) -> Result<SpectralSample, SensorError>;

    /// Current integration time in 2.8 ms units.
    fn integration_units(&self) -> u8;

    /// Suspension point used for settle and poll delays.
    fn delay_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Display sink (driven adapter: domain → status screen)
// ───────────────────────────────────────────────────────────────

/// Character-cell status display (8 rows on the reference OLED).
pub trait DisplaySink {
    fn clear(&mut self);

    /// Print `text` starting at `row`, `col`.
    fn print(&mut self, row: u8, col: u8, text: &str);
}

// ───────────────────────────────────────────────────────────────
// Telemetry sink (driven adapter: domain → broker / log)
// ───────────────────────────────────────────────────────────────

pub trait TelemetrySink {
    fn publish(&mut self, sample: &SpectralSample) -> Result<(), TelemetryError>;
}

// ───────────────────────────────────────────────────────────────
// Update delegate (driven adapter: domain → OTA client)
// ───────────────────────────────────────────────────────────────

/// Checks for and applies a firmware update.
///
/// A successful update restarts the device from inside the call and never
/// returns.  `Ok(())` therefore means "nothing newer than
/// `current_version` was found".
pub trait UpdateDelegate {
    fn check_and_update(&mut self, current_version: u32) -> Result<(), UpdateError>;
}

// ───────────────────────────────────────────────────────────────
// Clock and liveness
// ───────────────────────────────────────────────────────────────

/// Monotonic time plus a blocking delay.
pub trait Clock: DelayNs {
    /// Milliseconds since boot.
    fn now_ms(&self) -> u64;
}

/// Liveness token refreshed once per controller iteration.
pub trait LivenessPort {
    /// Returns [`Error::FatalWatchdogStarvation`] if the previous refresh
    /// came too late.
    fn feed(&mut self) -> Result<(), Error>;
}

// ───────────────────────────────────────────────────────────────
// Board bundle
// ───────────────────────────────────────────────────────────────

/// The set of concrete adapters a controller runs against.
pub trait Board {
    type Sensor: SpectralPort;
    type Display: DisplaySink;
    type Telemetry: TelemetrySink;
    type Updater: UpdateDelegate;
    type Clock: Clock;
    type Watchdog: LivenessPort;
}

/// Owned instances of a [`Board`]'s adapters.
pub struct Peripherals<B: Board> {
    pub sensor: B::Sensor,
    pub display: B::Display,
    pub telemetry: B::Telemetry,
    pub updater: B::Updater,
    pub clock: B::Clock,
    pub watchdog: B::Watchdog,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`TelemetrySink::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// No broker session is established.
    NotConnected,
    /// The payload did not fit the outgoing buffer.
    Encode,
    /// The transport refused the message.
    Rejected,
}

/// Errors from [`UpdateDelegate::check_and_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// Version manifest could not be fetched.
    ManifestUnavailable,
    /// Image download or flash write failed.
    DownloadFailed,
    /// The new image failed validation.
    InvalidImage,
}

/// Errors from configuration loading and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The override document is not valid JSON for [`SystemConfig`].
    ///
    /// [`SystemConfig`]: crate::config::SystemConfig
    Malformed,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Encode => write!(f, "payload encode failed"),
            Self::Rejected => write!(f, "publish rejected"),
        }
    }
}

impl core::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ManifestUnavailable => write!(f, "version manifest unavailable"),
            Self::DownloadFailed => write!(f, "image download failed"),
            Self::InvalidImage => write!(f, "image rejected"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed config"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Malformed => Error::Config("malformed"),
            ConfigError::ValidationFailed(msg) => Error::Config(msg),
        }
    }
}
