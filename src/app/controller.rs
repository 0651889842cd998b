//! Application controller: the hexagonal core.
//!
//! [`AppController`] owns the FSM and its context and drives it one
//! iteration at a time.  All I/O flows through the [`Board`] adapters, so
//! the whole controller runs against mocks on the host.
//!
//! ```text
//!  EventQueue ──▶ ┌──────────────────────────┐ ──▶ DisplaySink
//!                 │      AppController        │ ──▶ TelemetrySink
//! SpectralPort ◀──│  FSM · Sequencer · Stats  │ ──▶ UpdateDelegate
//!                 └──────────────────────────┘
//! ```
//!
//! One iteration:
//! 1. refresh the liveness token;
//! 2. take at most one event off the queue and apply its transition;
//! 3. run the current state's action.

use core::ops::ControlFlow;

use log::{error, info, warn};

use crate::config::SystemConfig;
use crate::events::EventQueue;
use crate::fsm::context::{ControllerStats, FsmContext, ROW_BANNER};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId, Terminal};

use super::ports::{Board, Peripherals, SpectralPort};

// ───────────────────────────────────────────────────────────────
// AppController
// ───────────────────────────────────────────────────────────────

pub struct AppController<'q, B: Board> {
    fsm: Fsm<B>,
    ctx: FsmContext<B>,
    queue: &'q EventQueue,
    started: bool,
    iterations: u64,
}

impl<'q, B: Board> AppController<'q, B> {
    /// Construct the controller.  Does **not** touch hardware; call
    /// [`start`](Self::start) next, or let the first [`step`](Self::step)
    /// do it.
    pub fn new(config: SystemConfig, hw: Peripherals<B>, queue: &'q EventQueue) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: FsmContext::new(config, hw),
            queue,
            started: false,
            iterations: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring up the sensor and enter Idle.
    ///
    /// A sensor that fails to initialise is reported and remembered; the
    /// controller still runs, skipping measurements.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        info!("Controller: looking for AS7265x");
        self.ctx.sensor_ok = match self.ctx.sensor.init() {
            Ok(()) => {
                let units = self.ctx.config.integration_units;
                if let Err(e) = self.ctx.sensor.set_integration_time(units) {
                    warn!("Controller: integration time not applied: {}", e);
                }
                self.ctx.lamp_off();
                info!("Controller: sensor configured");
                true
            }
            Err(e) => {
                error!("Controller: sensor not responding ({})", e);
                self.ctx.show(ROW_BANNER, "Sensor Error");
                false
            }
        };

        self.fsm.start(&mut self.ctx);
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// Run one iteration.  `Break` carries the terminal action the
    /// platform must now perform; every later call returns it again.
    pub fn step(&mut self) -> ControlFlow<Terminal> {
        if let Some(terminal) = self.fsm.halted() {
            return ControlFlow::Break(terminal);
        }
        self.start();
        self.iterations += 1;

        if let Err(e) = self.ctx.feed_watchdog() {
            error!("Controller: {}", e);
            self.fsm.halt(Terminal::WatchdogReset);
            return ControlFlow::Break(Terminal::WatchdogReset);
        }

        if let Some(event) = self.queue.try_next() {
            info!("Controller: event {:?}", event);
            self.fsm.handle_event(event, &mut self.ctx);
        }

        match self.fsm.tick(&mut self.ctx) {
            Some(terminal) => ControlFlow::Break(terminal),
            None => ControlFlow::Continue(()),
        }
    }

    /// Iterate until a state halts the machine.
    pub fn run(&mut self) -> Terminal {
        loop {
            if let ControlFlow::Break(terminal) = self.step() {
                return terminal;
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn halted(&self) -> Option<Terminal> {
        self.fsm.halted()
    }

    pub fn stats(&self) -> ControllerStats {
        self.ctx.stats
    }

    pub fn sensor_ok(&self) -> bool {
        self.ctx.sensor_ok
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Read access to the blackboard (adapters, last sample).
    pub fn context(&self) -> &FsmContext<B> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut FsmContext<B> {
        &mut self.ctx
    }
}
