//! Unified error types for the Waterly firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! controller loop's error handling uniform.  All variants are `Copy` so
//! they can be passed through the sequencer and FSM without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The virtual-register handshake failed.
    Bus(BusError),
    /// The spectral device misbehaved above the bus layer.
    Sensor(SensorError),
    /// A measurement cycle did not produce a sample.
    Measurement(MeasurementError),
    /// The controller event queue is at capacity.
    QueueFull,
    /// The liveness token was not refreshed before the watchdog deadline.
    FatalWatchdogStarvation,
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Measurement(e) => write!(f, "measurement: {e}"),
            Self::QueueFull => write!(f, "event queue full"),
            Self::FatalWatchdogStarvation => write!(f, "watchdog starved"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bus errors (virtual-register bridge)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// A status poll exhausted its retry budget.
    Timeout,
    /// The physical I2C transfer failed.
    TransactionFailure,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "status poll timed out"),
            Self::TransactionFailure => write!(f, "I2C transaction failed"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors (spectral device driver)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// A register access failed at the bus layer.
    Bus(BusError),
    /// The hardware-identity register never reported the expected type.
    DeviceNotFound,
    /// One or more channels of a sample hold the sentinel value.
    ChannelReadDegraded,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "{e}"),
            Self::DeviceNotFound => write!(f, "AS7265x not found"),
            Self::ChannelReadDegraded => write!(f, "channel read degraded"),
        }
    }
}

impl From<BusError> for SensorError {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        match e {
            SensorError::Bus(b) => Self::Bus(b),
            other => Self::Sensor(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Measurement errors (sequencer)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementError {
    /// The data-ready flag never rose within the poll budget.
    SequenceTimeout,
    /// A bus error ended the cycle early.
    BusFailure(BusError),
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SequenceTimeout => write!(f, "sensor never signalled data ready"),
            Self::BusFailure(e) => write!(f, "bus failure ({e})"),
        }
    }
}

impl From<MeasurementError> for Error {
    fn from(e: MeasurementError) -> Self {
        Self::Measurement(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
