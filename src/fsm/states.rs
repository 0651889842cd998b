//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers; no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!   any ──GoIdle──────────▶ IDLE ◀─────────────┐
//!   any ──StartTraining───▶ TRAINING (loops)   │
//!   any ──SingleMeasure───▶ SINGLE_MEASURE ────┘ (one cycle)
//!   any ──StopAndSleep────▶ SLEEPING ──▶ Halt(DeepSleep)
//!   any ──StartOtaUpdate──▶ UPDATING ──▶ Halt(Restart)
//! ```

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::context::{FsmContext, ROW_BANNER, ROW_NIR, ROW_UV};
use super::{StateDescriptor, StateId, Step, Terminal};
use crate::app::ports::{Board, Clock, TelemetrySink, UpdateDelegate};
use crate::control::sequencer::MeasurementOutcome;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table<B: Board>() -> [StateDescriptor<B>; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter::<B>),
            on_exit: None,
            on_update: idle_update::<B>,
        },
        // Index 1: Training
        StateDescriptor {
            id: StateId::Training,
            name: "Training",
            on_enter: Some(training_enter::<B>),
            on_exit: None,
            on_update: training_update::<B>,
        },
        // Index 2: SingleMeasure
        StateDescriptor {
            id: StateId::SingleMeasure,
            name: "SingleMeasure",
            on_enter: Some(single_enter::<B>),
            on_exit: None,
            on_update: single_update::<B>,
        },
        // Index 3: Sleeping
        StateDescriptor {
            id: StateId::Sleeping,
            name: "Sleeping",
            on_enter: None,
            on_exit: None,
            on_update: sleeping_update::<B>,
        },
        // Index 4: Updating
        StateDescriptor {
            id: StateId::Updating,
            name: "Updating",
            on_enter: None,
            on_exit: None,
            on_update: updating_update::<B>,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared measurement cycle
// ═══════════════════════════════════════════════════════════════════════════

/// Run one sequencer cycle, then display and publish its result.
/// Failures are reported and counted; they never leave the state.
fn measure_and_publish<B: Board>(ctx: &mut FsmContext<B>) {
    if !ctx.sensor_ok {
        warn!("Controller: skipping measurement (sensor offline)");
        ctx.stats.skipped_offline += 1;
        ctx.show_status("Sensor offline");
        return;
    }

    ctx.stats.cycles += 1;
    match ctx.sequencer.run(&mut ctx.sensor) {
        MeasurementOutcome::Success(sample) => {
            ctx.stats.successes += 1;
            ctx.last_sample = Some(sample);
            ctx.show_readings(&sample);
            if let Err(e) = ctx.telemetry.publish(&sample) {
                warn!("Controller: publish failed: {}", e);
                ctx.stats.publish_failures += 1;
                ctx.show_status("Err: Publish");
            }
        }
        MeasurementOutcome::Timeout => {
            ctx.stats.timeouts += 1;
            ctx.show_status("Err: Timeout");
        }
        MeasurementOutcome::BusFailure(_) => {
            ctx.stats.bus_failures += 1;
            ctx.show_status("Err: I2C Read");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter<B: Board>(ctx: &mut FsmContext<B>) {
    // Keep fresh readings visible after a single measurement.
    if !ctx.readings_on_screen {
        ctx.clear_display();
        ctx.show(ROW_BANNER, "=== WATERLY ===");
        ctx.show(3, "  Waiting...");
    }
    if ctx.sensor_ok {
        ctx.show_status("Mode: IDLE  :)");
    } else {
        ctx.show_status("Sensor Error");
    }
    info!("IDLE: waiting for commands");
}

fn idle_update<B: Board>(ctx: &mut FsmContext<B>) -> Step {
    let ms = ctx.config.idle_yield_ms;
    ctx.clock.delay_ms(ms);
    Step::Stay
}

// ═══════════════════════════════════════════════════════════════════════════
//  TRAINING state: phase-locked periodic sampling
// ═══════════════════════════════════════════════════════════════════════════

fn training_enter<B: Board>(ctx: &mut FsmContext<B>) {
    ctx.phase_anchor_ms = ctx.clock.now_ms();
    ctx.show_status("Mode: TRAINING");
    info!(
        "TRAINING: sampling every {} ms",
        ctx.config.sampling_period_ms
    );
}

fn training_update<B: Board>(ctx: &mut FsmContext<B>) -> Step {
    measure_and_publish(ctx);

    let next = ctx.phase_anchor_ms + u64::from(ctx.config.sampling_period_ms);
    let now = ctx.clock.now_ms();
    if now < next {
        ctx.clock.delay_ms((next - now) as u32);
        ctx.phase_anchor_ms = next;
    } else {
        // No catch-up burst: the next cycle starts now.
        warn!("TRAINING: cycle overran the period by {} ms", now - next);
        ctx.stats.overruns += 1;
        ctx.phase_anchor_ms = now;
    }
    Step::Stay
}

// ═══════════════════════════════════════════════════════════════════════════
//  SINGLE_MEASURE state: one cycle, then back to Idle
// ═══════════════════════════════════════════════════════════════════════════

fn single_enter<B: Board>(ctx: &mut FsmContext<B>) {
    ctx.show_status("Measuring...");
}

fn single_update<B: Board>(ctx: &mut FsmContext<B>) -> Step {
    measure_and_publish(ctx);
    info!("SINGLE_MEASURE: done, returning to Idle");
    Step::Goto(StateId::Idle)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SLEEPING state: terminal
// ═══════════════════════════════════════════════════════════════════════════

fn sleeping_update<B: Board>(ctx: &mut FsmContext<B>) -> Step {
    warn!("SLEEPING: entering deep sleep sequence");
    ctx.show(ROW_NIR, "Status: SLEEP");
    ctx.show(ROW_NIR + 1, "Zzz...");
    ctx.lamp_off();

    // Let pending logs and telemetry drain.
    let ms = ctx.config.sleep_flush_ms;
    ctx.clock.delay_ms(ms);
    ctx.clear_display();

    info!("SLEEPING: back in {} s", ctx.config.deep_sleep_secs);
    Step::Halt(Terminal::DeepSleep {
        duration_us: ctx.config.deep_sleep_us(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════
//  UPDATING state: terminal
// ═══════════════════════════════════════════════════════════════════════════

fn updating_update<B: Board>(ctx: &mut FsmContext<B>) -> Step {
    warn!("UPDATING: starting firmware update");
    ctx.clear_display();
    ctx.show(ROW_BANNER, "SYSTEM UPDATE");
    ctx.show(ROW_UV, "Connecting...");
    ctx.lamp_off();

    // The delegate can block for a long time.
    if let Err(e) = ctx.feed_watchdog() {
        warn!("UPDATING: {}", e);
        return Step::Halt(Terminal::WatchdogReset);
    }
    let version = ctx.config.firmware_version;
    match ctx.updater.check_and_update(version) {
        Ok(()) => {
            info!("UPDATING: no newer firmware than v{}", version);
            ctx.show(ROW_UV, "No Updates");
        }
        Err(e) => {
            warn!("UPDATING: {}", e);
            ctx.show(ROW_UV, "Update Failed!");
        }
    }

    let ms = ctx.config.update_grace_ms;
    ctx.clock.delay_ms(ms);
    Step::Halt(Terminal::Restart)
}
