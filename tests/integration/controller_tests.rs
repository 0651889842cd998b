//! Integration tests for the AppController → FSM → sequencer → AS7265x
//! pipeline, timed entirely on the simulated clock.

use core::ops::ControlFlow;

use waterly::app::commands;
use waterly::app::ports::{Clock, ConfigError};
use waterly::error::Error;
use waterly::events::{ControllerEvent, EVENT_QUEUE_CAP, EventQueue};
use waterly::fsm::{StateId, Terminal};
use waterly::sensors::registers::{DeviceSelector, VIRT_INT_TIME};

use super::mock_hw::Rig;

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_configures_sensor_and_waits_in_idle() {
    let rig = Rig::new();
    let q = EventQueue::new();
    let mut c = rig.controller(&q);

    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert!(c.sensor_ok());
    assert_eq!(c.state(), StateId::Idle);
    assert_eq!(rig.sim.virtual_reg(VIRT_INT_TIME), 50);
    assert!(!rig.sim.any_bulb_on());

    let screen = &c.context().display;
    assert_eq!(screen.row(0), "=== WATERLY ===");
    assert_eq!(screen.row(3), "  Waiting...");
    assert_eq!(screen.row(7), "Mode: IDLE  :)");
}

#[test]
fn missing_sensor_is_reported_and_measurements_skipped() {
    let rig = Rig::new();
    rig.sim.set_present(false);
    let q = EventQueue::new();
    let mut c = rig.controller(&q);

    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert!(!c.sensor_ok());
    assert_eq!(c.context().display.row(7), "Sensor Error");

    q.submit(ControllerEvent::SingleMeasure).unwrap();
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.state(), StateId::Idle);
    assert_eq!(c.stats().skipped_offline, 1);
    assert!(c.context().telemetry.published.is_empty());
}

// ── Single measurement ────────────────────────────────────────

#[test]
fn single_measure_runs_one_cycle_then_idles() {
    let rig = Rig::new();
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));

    q.submit(ControllerEvent::SingleMeasure).unwrap();
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.step(), ControlFlow::Continue(()));

    assert_eq!(c.state(), StateId::Idle);
    assert_eq!(rig.triggers(), 1);
    assert_eq!(c.context().telemetry.published.len(), 1);
    assert!(!rig.sim.any_bulb_on());
    assert_eq!(rig.sim.selector(), Some(DeviceSelector::Master));

    // Readings stay up; the status line returns to idle.
    let screen = &c.context().display;
    assert_eq!(screen.row(0), "--- WATERLY ---");
    assert_eq!(screen.row(2), "UV :  201.0");
    assert_eq!(screen.row(3), "VIS:  101.0");
    assert_eq!(screen.row(4), "NIR:    6.0");
    assert_eq!(screen.row(7), "Mode: IDLE  :)");
}

#[test]
fn publish_failure_is_shown_and_counted() {
    let rig = Rig::new();
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));
    c.context_mut().telemetry.reject = 1;

    q.submit(ControllerEvent::StartTraining).unwrap();
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.context().display.row(7), "Err: Publish");
    assert_eq!(c.stats().publish_failures, 1);

    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.context().display.row(7), "Status: OK  MQTT>>");
    assert_eq!(c.context().telemetry.published.len(), 1);
}

// ── Training ──────────────────────────────────────────────────

#[test]
fn training_is_phase_locked_to_the_period() {
    let rig = Rig::new();
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));

    q.submit(ControllerEvent::StartTraining).unwrap();
    let anchor = rig.clock.now_ms();
    for cycle in 1..=4u64 {
        assert_eq!(c.step(), ControlFlow::Continue(()));
        assert_eq!(rig.clock.now_ms() - anchor, cycle * 3000);
    }
    assert_eq!(c.stats().successes, 4);
    assert_eq!(c.context().telemetry.published.len(), 4);
    assert_eq!(c.state(), StateId::Training);
}

#[test]
fn training_timeout_does_not_stop_the_next_cycle() {
    let rig = Rig::new();
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));

    rig.sim.set_ready_after(None);
    q.submit(ControllerEvent::StartTraining).unwrap();
    let anchor = rig.clock.now_ms();
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.stats().timeouts, 1);
    assert_eq!(c.context().display.row(7), "Err: Timeout");
    assert!(!rig.sim.any_bulb_on());
    assert_eq!(rig.clock.now_ms() - anchor, 3000);

    rig.sim.set_ready_after(Some(3));
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.stats().successes, 1);
    assert_eq!(c.context().telemetry.published.len(), 1);
    assert_eq!(rig.clock.now_ms() - anchor, 6000);
}

#[test]
fn overrunning_cycle_starts_the_next_one_immediately() {
    let mut rig = Rig::new();
    rig.config.sampling_period_ms = 500;
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));

    // A timed-out cycle spends the whole poll budget (~970 ms).
    rig.sim.set_ready_after(None);
    q.submit(ControllerEvent::StartTraining).unwrap();
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.stats().overruns, 1);

    rig.sim.set_ready_after(Some(3));
    let before = rig.clock.now_ms();
    assert_eq!(c.step(), ControlFlow::Continue(()));
    // Success takes well under the period, so this cycle ends on phase.
    assert_eq!(c.stats().overruns, 1);
    assert_eq!(rig.clock.now_ms() - before, 500);
}

#[test]
fn bus_fault_fails_the_cycle_and_recovers() {
    let rig = Rig::new();
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));

    rig.sim.set_bus_fault(true);
    q.submit(ControllerEvent::StartTraining).unwrap();
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.stats().bus_failures, 1);
    assert_eq!(c.context().display.row(7), "Err: I2C Read");

    rig.sim.set_bus_fault(false);
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.stats().successes, 1);
    assert!(!rig.sim.any_bulb_on());
}

// ── Events ────────────────────────────────────────────────────

#[test]
fn one_event_is_applied_per_iteration_in_order() {
    let rig = Rig::new();
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));

    q.submit(ControllerEvent::StartTraining).unwrap();
    q.submit(ControllerEvent::GoIdle).unwrap();
    q.submit(ControllerEvent::SingleMeasure).unwrap();

    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.state(), StateId::Training);
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.state(), StateId::Idle);
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.state(), StateId::Idle, "single measure returns to idle");
    assert_eq!(rig.triggers(), 2);
}

#[test]
fn full_queue_rejects_and_keeps_fifo_order() {
    let q = EventQueue::new();
    for i in 0..EVENT_QUEUE_CAP {
        let e = ControllerEvent::ALL[i % ControllerEvent::ALL.len()];
        q.submit(e).unwrap();
    }
    assert_eq!(q.submit(ControllerEvent::GoIdle), Err(Error::QueueFull));
    for i in 0..EVENT_QUEUE_CAP {
        assert_eq!(q.try_next(), Some(ControllerEvent::ALL[i % ControllerEvent::ALL.len()]));
    }
    assert_eq!(q.try_next(), None);
}

#[test]
fn command_document_drives_the_controller() {
    let rig = Rig::new();
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));

    assert_eq!(commands::dispatch(br#"{"training": true}"#, &q), Ok(1));
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.state(), StateId::Training);

    assert_eq!(commands::dispatch(br#"{"idle": true}"#, &q), Ok(1));
    assert_eq!(c.step(), ControlFlow::Continue(()));
    assert_eq!(c.state(), StateId::Idle);
}

// ── Terminal states ───────────────────────────────────────────

#[test]
fn sleep_turns_everything_off_and_halts() {
    let rig = Rig::new();
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));

    q.submit(ControllerEvent::StopAndSleep).unwrap();
    let before = rig.clock.now_ms();
    let expected = Terminal::DeepSleep {
        duration_us: 60_000_000,
    };
    assert_eq!(c.step(), ControlFlow::Break(expected));
    assert!(rig.clock.now_ms() - before >= 1000);
    assert!(!rig.sim.any_bulb_on());
    assert_eq!(c.context().display.row(4), "", "display cleared before sleep");

    // Nothing after the terminal action is taken.
    q.submit(ControllerEvent::StartTraining).unwrap();
    assert_eq!(c.run(), expected);
    assert_eq!(c.state(), StateId::Sleeping);
    assert_eq!(rig.triggers(), 0);
}

#[test]
fn update_without_newer_firmware_restarts_after_grace() {
    let rig = Rig::new();
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));

    q.submit(ControllerEvent::StartOtaUpdate).unwrap();
    let before = rig.clock.now_ms();
    assert_eq!(c.run(), Terminal::Restart);
    assert!(rig.clock.now_ms() - before >= 3000);
    assert_eq!(c.context().display.row(0), "SYSTEM UPDATE");
    assert_eq!(c.context().display.row(2), "No Updates");
    assert!(c.context().updater.transport().installs.is_empty());
}

#[test]
fn failed_install_reports_and_restarts() {
    let mut rig = Rig::new();
    rig.manifest = Some(r#"{"version":7,"url":"https://host/v7.bin"}"#.to_owned());
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));

    q.submit(ControllerEvent::StartOtaUpdate).unwrap();
    assert_eq!(c.run(), Terminal::Restart);
    assert_eq!(c.context().display.row(2), "Update Failed!");
    assert_eq!(c.context().updater.transport().installs, ["https://host/v7.bin"]);
}

#[test]
fn unreachable_manifest_reports_and_restarts() {
    let mut rig = Rig::new();
    rig.manifest = None;
    let q = EventQueue::new();
    let mut c = rig.controller(&q);

    q.submit(ControllerEvent::StartOtaUpdate).unwrap();
    assert_eq!(c.run(), Terminal::Restart);
    assert_eq!(c.context().display.row(2), "Update Failed!");
}

// ── Liveness ──────────────────────────────────────────────────

#[test]
fn late_watchdog_feed_is_fatal() {
    let mut rig = Rig::new();
    rig.watchdog_timeout_ms = 1000;
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    assert_eq!(c.step(), ControlFlow::Continue(()));

    // Each training iteration lasts one 3000 ms period.
    q.submit(ControllerEvent::StartTraining).unwrap();
    assert_eq!(c.run(), Terminal::WatchdogReset);
    assert_eq!(c.stats().cycles, 1);
}

#[test]
fn overlong_waits_never_reach_the_controller() {
    for json in [
        r#"{"idle_yield_ms": 20000}"#,
        r#"{"poll_margin_ms": 60000}"#,
        r#"{"bulb_settle_ms": 12000}"#,
    ] {
        assert!(
            matches!(Rig::with_config(json), Err(ConfigError::ValidationFailed(_))),
            "{json} was accepted"
        );
    }
}

#[test]
fn slowest_accepted_cycle_still_feeds_the_watchdog() {
    let rig = Rig::with_config(r#"{"integration_units": 255, "poll_margin_ms": 5000}"#).unwrap();
    rig.sim.set_ready_after(None);
    let q = EventQueue::new();
    let mut c = rig.controller(&q);

    q.submit(ControllerEvent::StartTraining).unwrap();
    for _ in 0..3 {
        assert_eq!(c.step(), ControlFlow::Continue(()));
    }
    assert_eq!(c.stats().timeouts, 3);
    assert!(c.halted().is_none());
}

#[test]
fn default_watchdog_survives_long_training() {
    let rig = Rig::new();
    let q = EventQueue::new();
    let mut c = rig.controller(&q);
    q.submit(ControllerEvent::StartTraining).unwrap();
    for _ in 0..20 {
        assert_eq!(c.step(), ControlFlow::Continue(()));
    }
    assert_eq!(c.stats().successes, 20);
}
