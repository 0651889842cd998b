//! One measurement cycle: illuminate, trigger, wait, read.
//!
//! ```text
//!  bulb on ─▶ settle ─▶ one-shot trigger ─▶ poll DATA_RDY ─▶ bulb off ─▶ read
//!     │          │             │                  │
//!     └──────────┴─────────────┴── bus error ─────┴──▶ bulb off ─▶ BusFailure
//!                                   never ready ──────▶ bulb off ─▶ Timeout
//! ```
//!
//! The bulb is switched off by [`Illumination`]'s `Drop`, so no exit path
//! can leave it energised.

use log::{debug, info, warn};

use crate::app::ports::SpectralPort;
use crate::config::SystemConfig;
use crate::error::{BusError, MeasurementError, SensorError};
use crate::retry::{RetryError, RetryPolicy, poll_until_with};
use crate::sensors::registers::{BulbCurrent, Gain, MeasurementMode};
use crate::sensors::sample::{Channel, SpectralSample};

/// Sub-devices converting in sequence during a one-shot acquisition.
const CONVERTING_DEVICES: u32 = 3;

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasurementOutcome {
    Success(SpectralSample),
    /// DATA_RDY never rose within the poll budget.
    Timeout,
    BusFailure(BusError),
}

impl MeasurementOutcome {
    pub fn into_result(self) -> Result<SpectralSample, MeasurementError> {
        match self {
            Self::Success(s) => Ok(s),
            Self::Timeout => Err(MeasurementError::SequenceTimeout),
            Self::BusFailure(e) => Err(MeasurementError::BusFailure(e)),
        }
    }
}

/// Timing and drive parameters for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerSettings {
    pub bulb_current: BulbCurrent,
    pub gain: Gain,
    pub settle_ms: u32,
    pub poll_interval_ms: u32,
    pub poll_margin_ms: u32,
}

impl SequencerSettings {
    pub fn from_config(cfg: &SystemConfig) -> Self {
        Self {
            bulb_current: cfg.bulb_current,
            gain: cfg.gain,
            settle_ms: cfg.bulb_settle_ms,
            poll_interval_ms: cfg.poll_interval_ms,
            poll_margin_ms: cfg.poll_margin_ms,
        }
    }
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

pub struct MeasurementSequencer {
    settings: SequencerSettings,
}

impl MeasurementSequencer {
    pub fn new(settings: SequencerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> SequencerSettings {
        self.settings
    }

    /// Data-ready poll policy for the given integration time: three
    /// conversions plus the margin, in whole poll intervals.
    pub fn poll_policy(&self, integration_units: u8) -> RetryPolicy {
        // units × 2.8 ms × 3, computed in tenths of a millisecond.
        let conversion_ms = (u32::from(integration_units) * 28 * CONVERTING_DEVICES).div_ceil(10);
        RetryPolicy::within(
            self.settings.poll_interval_ms,
            conversion_ms.saturating_add(self.settings.poll_margin_ms),
        )
    }

    /// Run one cycle to completion.  Never leaves the bulb on.
    pub fn run<S: SpectralPort>(&self, sensor: &mut S) -> MeasurementOutcome {
        let policy = self.poll_policy(sensor.integration_units());
        debug!(
            "Sequencer: start (poll {} x {} ms)",
            policy.attempts(),
            policy.interval_ms
        );

        let ready = {
            let lamp = match Illumination::on(sensor, self.settings.bulb_current) {
                Ok(lamp) => lamp,
                Err(e) => {
                    warn!("Sequencer: bulb on failed: {}", e);
                    return MeasurementOutcome::BusFailure(e);
                }
            };
            let sensor = &mut *lamp.sensor;

            sensor.delay_ms(self.settings.settle_ms);
            if let Err(e) = sensor.configure(MeasurementMode::SixChannelOneShot, self.settings.gain)
            {
                warn!("Sequencer: trigger failed: {}", e);
                return MeasurementOutcome::BusFailure(e);
            }

            poll_until_with(
                policy,
                sensor,
                |s, ms| s.delay_ms(ms),
                |s| s.data_ready().map(|ready| ready.then_some(())),
            )
            // Lamp drops here.
        };

        match ready {
            Ok(()) => {}
            Err(RetryError::Exhausted) => {
                warn!("Sequencer: data never ready ({} ms)", policy.budget_ms());
                return MeasurementOutcome::Timeout;
            }
            Err(RetryError::Aborted(e)) => {
                warn!("Sequencer: data-ready poll failed: {}", e);
                return MeasurementOutcome::BusFailure(e);
            }
        }

        match sensor.read_all_channels() {
            Ok(sample) => {
                info!(
                    "Sequencer: UV(A) {:.1} | VIS(G) {:.1} | NIR(W) {:.1}",
                    sample.get(Channel::A),
                    sample.get(Channel::G),
                    sample.get(Channel::W)
                );
                MeasurementOutcome::Success(sample)
            }
            Err(SensorError::Bus(e)) => {
                warn!("Sequencer: channel read failed: {}", e);
                MeasurementOutcome::BusFailure(e)
            }
            Err(other) => {
                warn!("Sequencer: channel read failed: {}", other);
                MeasurementOutcome::BusFailure(BusError::TransactionFailure)
            }
        }
    }
}

impl Default for MeasurementSequencer {
    fn default() -> Self {
        Self::new(SequencerSettings::default())
    }
}

// ── Illumination scope ────────────────────────────────────────

/// Bulb that is on for exactly as long as this value lives.
struct Illumination<'a, S: SpectralPort> {
    sensor: &'a mut S,
    current: BulbCurrent,
}

impl<'a, S: SpectralPort> Illumination<'a, S> {
    fn on(sensor: &'a mut S, current: BulbCurrent) -> Result<Self, BusError> {
        let lamp = Self { sensor, current };
        // A half-applied enable still gets switched off by Drop.
        lamp.sensor.set_illumination(current, true)?;
        Ok(lamp)
    }
}

impl<S: SpectralPort> Drop for Illumination<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.sensor.set_illumination(self.current, false) {
            warn!("Sequencer: bulb off failed: {}", e);
        }
    }
}
