//! Simulated board for integration tests.
//!
//! The real `As7265x` driver talks to `SimAs7265x` over the `I2c` trait and
//! delays on the same `SimClock` the controller and the simulated watchdog
//! use, so every bus wait, settle delay and training period shows up in
//! virtual time.

use core::convert::Infallible;

use waterly::adapters::log_sink::LogDisplay;
use waterly::adapters::time::SimClock;
use waterly::adapters::update::{ImageTransport, ManifestUpdater};
use waterly::app::controller::AppController;
use waterly::app::ports::{
    Board, ConfigError, Peripherals, TelemetryError, TelemetrySink, UpdateError,
};
use waterly::config::SystemConfig;
use waterly::drivers::watchdog::Watchdog;
use waterly::events::EventQueue;
use waterly::sensors::as7265x::As7265x;
use waterly::sensors::bridge::VirtualRegisterBridge;
use waterly::sensors::registers::{CONFIG_BANK_SHIFT, MeasurementMode};
use waterly::sensors::sample::SpectralSample;
use waterly::sensors::sim::SimAs7265x;

// ── Telemetry ─────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub published: Vec<SpectralSample>,
    /// Reject this many upcoming publishes.
    pub reject: u32,
}

impl TelemetrySink for RecordingSink {
    fn publish(&mut self, sample: &SpectralSample) -> Result<(), TelemetryError> {
        if self.reject > 0 {
            self.reject -= 1;
            return Err(TelemetryError::NotConnected);
        }
        self.published.push(*sample);
        Ok(())
    }
}

// ── Update transport ──────────────────────────────────────────

pub struct ScriptedTransport {
    pub manifest: Option<String>,
    pub installs: Vec<String>,
    /// Virtual time a manifest fetch takes.
    pub fetch_ms: u64,
    clock: SimClock,
}

impl ScriptedTransport {
    pub fn new(clock: SimClock, manifest: Option<&str>) -> Self {
        Self {
            manifest: manifest.map(str::to_owned),
            installs: Vec::new(),
            fetch_ms: 200,
            clock,
        }
    }
}

impl ImageTransport for ScriptedTransport {
    fn fetch_manifest(&mut self, _url: &str, buf: &mut [u8]) -> Result<usize, UpdateError> {
        self.clock.advance_ms(self.fetch_ms);
        let body = self.manifest.as_ref().ok_or(UpdateError::ManifestUnavailable)?;
        let n = body.len().min(buf.len());
        buf[..n].copy_from_slice(&body.as_bytes()[..n]);
        Ok(n)
    }

    fn install(&mut self, url: &str) -> Result<Infallible, UpdateError> {
        self.installs.push(url.to_owned());
        Err(UpdateError::InvalidImage)
    }
}

// ── Board ─────────────────────────────────────────────────────

pub struct SimBoard;

impl Board for SimBoard {
    type Sensor = As7265x<SimAs7265x, SimClock>;
    type Display = LogDisplay;
    type Telemetry = RecordingSink;
    type Updater = ManifestUpdater<ScriptedTransport>;
    type Clock = SimClock;
    type Watchdog = Watchdog;
}

/// Handles onto the simulated hardware shared with a controller.
pub struct Rig {
    pub sim: SimAs7265x,
    pub clock: SimClock,
    pub config: SystemConfig,
    pub manifest: Option<String>,
    pub watchdog_timeout_ms: u32,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        let sim = SimAs7265x::new();
        sim.load_pattern();
        let config = SystemConfig::default();
        Self {
            sim,
            clock: SimClock::new(),
            watchdog_timeout_ms: config.watchdog_timeout_ms,
            config,
            manifest: Some(r#"{"version":1,"url":"https://host/waterly.bin"}"#.to_owned()),
        }
    }

    /// Rig running a validated JSON override, watchdog included.
    pub fn with_config(json: &str) -> Result<Self, ConfigError> {
        let config = SystemConfig::from_json(json)?;
        Ok(Self {
            watchdog_timeout_ms: config.watchdog_timeout_ms,
            config,
            ..Self::new()
        })
    }

    pub fn controller<'q>(&self, queue: &'q EventQueue) -> AppController<'q, SimBoard> {
        let bridge = VirtualRegisterBridge::new(self.sim.clone(), self.clock.clone());
        let transport = ScriptedTransport::new(self.clock.clone(), self.manifest.as_deref());
        let hw = Peripherals::<SimBoard> {
            sensor: As7265x::new(bridge),
            display: LogDisplay::new(),
            telemetry: RecordingSink::default(),
            updater: ManifestUpdater::new(self.config.update_manifest_url.clone(), transport),
            clock: self.clock.clone(),
            watchdog: Watchdog::new(self.watchdog_timeout_ms, self.clock.clone()),
        };
        AppController::new(self.config.clone(), hw, queue)
    }

    /// One-shot CONFIG writes seen by the device, i.e. sequencer triggers.
    pub fn triggers(&self) -> usize {
        self.sim
            .config_writes()
            .iter()
            .filter(|&&v| (v >> CONFIG_BANK_SHIFT) & 0b11 == MeasurementMode::SixChannelOneShot as u8)
            .count()
    }
}
