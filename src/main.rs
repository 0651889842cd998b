//! Waterly Firmware: Main Entry Point
//!
//! Hexagonal architecture around a function-pointer FSM.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  As7265x (I2C)   LogDisplay   LogTelemetrySink   SystemClock   │
//! │  (SpectralPort)  (Display)    (Telemetry)        (Clock)       │
//! │  ManifestUpdater              Watchdog (TWDT)                  │
//! │  (UpdateDelegate)             (LivenessPort)                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppController (pure logic)                │    │
//! │  │  FSM · MeasurementSequencer · EventQueue               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  power::execute (deep sleep / restart, never returns)          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals as EspPeripherals;
use esp_idf_hal::units::Hertz;
use log::{info, warn};

use waterly::adapters::log_sink::{LogDisplay, LogTelemetrySink};
use waterly::adapters::time::SystemClock;
use waterly::adapters::update::{self, ManifestUpdater, OfflineTransport};
use waterly::app::controller::AppController;
use waterly::app::ports::{Board, Peripherals};
use waterly::config::SystemConfig;
use waterly::drivers::watchdog::Watchdog;
use waterly::events::{ControllerEvent, EVENTS, push_event};
use waterly::pins;
use waterly::power;
use waterly::sensors::as7265x::As7265x;
use waterly::sensors::bridge::VirtualRegisterBridge;

/// Compile-time JSON override for [`SystemConfig`].
const CONFIG_OVERRIDE: Option<&str> = option_env!("WATERLY_CONFIG_JSON");

// ── Board bundle ──────────────────────────────────────────────

struct EspBoard;

impl Board for EspBoard {
    type Sensor = As7265x<I2cDriver<'static>, FreeRtos>;
    type Display = LogDisplay;
    type Telemetry = LogTelemetrySink;
    type Updater = ManifestUpdater<OfflineTransport>;
    type Clock = SystemClock;
    type Watchdog = Watchdog;
}

fn load_config() -> SystemConfig {
    let Some(json) = CONFIG_OVERRIDE else {
        return SystemConfig::default();
    };
    match SystemConfig::from_json(json) {
        Ok(cfg) => {
            info!("Config: compile-time override applied");
            cfg
        }
        Err(e) => {
            warn!("Config: override rejected ({}), using defaults", e);
            SystemConfig::default()
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Waterly v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
    info!("System Init...");
    info!("Boot: {:?}", power::wake_reason());

    // ── 1b. OTA rollback check ────────────────────────────────
    update::check_rollback();

    // ── 2. Configuration ──────────────────────────────────────
    let config = load_config();
    let watchdog = Watchdog::new(config.watchdog_timeout_ms);

    // ── 3. I²C bus + spectral sensor ──────────────────────────
    let peripherals = EspPeripherals::take()?;
    info!(
        "I2C: SDA GPIO{} SCL GPIO{} @ {} Hz",
        pins::I2C_SDA_GPIO,
        pins::I2C_SCL_GPIO,
        pins::I2C_FREQ_HZ
    );
    let i2c_config = I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ));
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &i2c_config,
    )?;
    let sensor = As7265x::new(VirtualRegisterBridge::new(i2c, FreeRtos));

    // ── 4. Construct adapters + controller ────────────────────
    let hw = Peripherals::<EspBoard> {
        sensor,
        display: LogDisplay::new(),
        telemetry: LogTelemetrySink::new(),
        updater: ManifestUpdater::new(config.update_manifest_url.clone(), OfflineTransport),
        clock: SystemClock::new(),
        watchdog,
    };
    let mut controller = AppController::new(config, hw, &EVENTS);
    controller.start();

    // Network association is handled outside the controller; once it is up
    // the node waits for commands in Idle.
    if !push_event(ControllerEvent::GoIdle) {
        warn!("Startup: event queue full");
    }

    info!("System ready. Entering controller loop.");

    // ── 5. Controller loop ────────────────────────────────────
    let terminal = controller.run();
    info!(
        "Controller halted after {} iterations: {:?}",
        controller.iterations(),
        controller.stats()
    );
    power::execute(terminal)
}
