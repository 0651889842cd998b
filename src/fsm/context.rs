//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to.  It owns the board's adapters, the measurement sequencer,
//! configuration, training-phase timing and the per-outcome counters.
//! Think of it as the "blackboard" in a blackboard architecture.

use core::fmt::Write;

use log::warn;

use crate::app::ports::{Board, DisplaySink, LivenessPort, Peripherals, SpectralPort};
use crate::config::SystemConfig;
use crate::control::sequencer::{MeasurementSequencer, SequencerSettings};
use crate::error::Error;
use crate::sensors::sample::{Channel, SpectralSample};

// ---------------------------------------------------------------------------
// Display layout
// ---------------------------------------------------------------------------

pub const ROW_BANNER: u8 = 0;
pub const ROW_UV: u8 = 2;
pub const ROW_VIS: u8 = 3;
pub const ROW_NIR: u8 = 4;
pub const ROW_STATUS: u8 = 7;

/// One rendered display line.
pub type DisplayLine = heapless::String<24>;

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Outcome counters since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Sequencer runs started.
    pub cycles: u32,
    pub successes: u32,
    pub timeouts: u32,
    pub bus_failures: u32,
    pub publish_failures: u32,
    /// Measurements skipped because the sensor never initialised.
    pub skipped_offline: u32,
    /// Training cycles that ran past the sampling period.
    pub overruns: u32,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext<B: Board> {
    // -- Timing --
    /// Start time of the current training cycle (ms since boot).
    pub phase_anchor_ms: u64,

    // -- Adapters --
    pub sensor: B::Sensor,
    pub display: B::Display,
    pub telemetry: B::Telemetry,
    pub updater: B::Updater,
    pub clock: B::Clock,
    pub watchdog: B::Watchdog,

    // -- Measurement --
    pub sequencer: MeasurementSequencer,
    /// `false` if the sensor failed to initialise; measurements are skipped.
    pub sensor_ok: bool,
    pub last_sample: Option<SpectralSample>,
    pub stats: ControllerStats,
    /// The screen currently shows the last sample's readings.
    pub readings_on_screen: bool,

    // -- Configuration --
    pub config: SystemConfig,
}

impl<B: Board> FsmContext<B> {
    pub fn new(config: SystemConfig, hw: Peripherals<B>) -> Self {
        Self {
            phase_anchor_ms: 0,
            sensor: hw.sensor,
            display: hw.display,
            telemetry: hw.telemetry,
            updater: hw.updater,
            clock: hw.clock,
            watchdog: hw.watchdog,
            sequencer: MeasurementSequencer::new(SequencerSettings::from_config(&config)),
            sensor_ok: false,
            last_sample: None,
            stats: ControllerStats::default(),
            readings_on_screen: false,
            config,
        }
    }

    /// Refresh the liveness token.
    pub fn feed_watchdog(&mut self) -> Result<(), Error> {
        self.watchdog.feed()
    }

    /// Switch the bulb off outside a measurement cycle.
    pub fn lamp_off(&mut self) {
        if let Err(e) = self
            .sensor
            .set_illumination(self.config.bulb_current, false)
        {
            warn!("Controller: bulb off failed: {}", e);
        }
    }

    // -- Display helpers --

    pub fn show(&mut self, row: u8, text: &str) {
        self.display.print(row, 0, text);
    }

    pub fn show_status(&mut self, text: &str) {
        self.show(ROW_STATUS, text);
    }

    pub fn clear_display(&mut self) {
        self.display.clear();
        self.readings_on_screen = false;
    }

    /// Full readings screen for a fresh sample.
    pub fn show_readings(&mut self, sample: &SpectralSample) {
        self.display.clear();
        self.show(ROW_BANNER, "--- WATERLY ---");
        for (row, prefix, channel) in [
            (ROW_UV, "UV ", Channel::A),
            (ROW_VIS, "VIS", Channel::G),
            (ROW_NIR, "NIR", Channel::W),
        ] {
            let line = reading_line(prefix, sample.get(channel));
            self.show(row, &line);
        }
        self.show_status("Status: OK  MQTT>>");
        self.readings_on_screen = true;
    }
}

/// Largest magnitude a reading line shows; anything beyond saturates.
pub const READING_LIMIT: f32 = 999_999.9;

/// `"UV :  123.4"` style line; the value is right-aligned in six columns.
pub fn reading_line(prefix: &str, value: f32) -> DisplayLine {
    let mut line = DisplayLine::new();
    let shown = value.clamp(-READING_LIMIT, READING_LIMIT);
    // Fits: a saturated value is at most nine characters.
    let _ = write!(line, "{}: {:6.1}", prefix, shown);
    line
}
