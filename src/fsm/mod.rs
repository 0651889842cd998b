//! Function-pointer finite state machine engine.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  StateTable                                                   │
//! │  ┌───────────────┬───────────┬──────────┬──────────────────┐  │
//! │  │ StateId       │ on_enter  │ on_exit  │ on_update        │  │
//! │  ├───────────────┼───────────┼──────────┼──────────────────┤  │
//! │  │ Idle          │ fn(ctx)   │    —     │ fn(ctx) -> Step  │  │
//! │  │ Training      │ fn(ctx)   │    —     │ fn(ctx) -> Step  │  │
//! │  │ SingleMeasure │ fn(ctx)   │    —     │ fn(ctx) -> Step  │  │
//! │  │ Sleeping      │ fn(ctx)   │    —     │ fn(ctx) -> Step  │  │
//! │  │ Updating      │ fn(ctx)   │    —     │ fn(ctx) -> Step  │  │
//! │  └───────────────┴───────────┴──────────┴──────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events select the next state through a fixed table ([`target_state`]);
//! the current state never influences where an event leads.  Each tick the
//! engine then calls `on_update` for the current state, which may stay,
//! move on, or halt the machine with a [`Terminal`] action that the
//! platform carries out (deep sleep, restart).  Once halted the engine does
//! nothing but report the same terminal.

pub mod context;
pub mod states;

use context::FsmContext;
use log::{info, warn};

use crate::app::ports::Board;
use crate::events::ControllerEvent;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all controller states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    Training = 1,
    SingleMeasure = 2,
    Sleeping = 3,
    Updating = 4,
}

impl StateId {
    /// Total number of states; used to size the table array.
    pub const COUNT: usize = 5;
}

/// The transition table.  Valid from every state.
pub const fn target_state(event: ControllerEvent) -> StateId {
    match event {
        ControllerEvent::GoIdle => StateId::Idle,
        ControllerEvent::StartTraining => StateId::Training,
        ControllerEvent::SingleMeasure => StateId::SingleMeasure,
        ControllerEvent::StopAndSleep => StateId::Sleeping,
        ControllerEvent::StartOtaUpdate => StateId::Updating,
    }
}

// ---------------------------------------------------------------------------
// Step results
// ---------------------------------------------------------------------------

/// Irreversible platform action requested by a halting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Enter deep sleep; execution resumes with a cold boot.
    DeepSleep { duration_us: u64 },
    /// Software restart.
    Restart,
    /// Liveness was lost; let the watchdog reset the chip.
    WatchdogReset,
}

/// What a state's `on_update` asks of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Stay,
    Goto(StateId),
    Halt(Terminal),
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn<B> = fn(&mut FsmContext<B>);

/// Signature for the per-tick update handler.
pub type StateUpdateFn<B> = fn(&mut FsmContext<B>) -> Step;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array; no heap, no `dyn`.
pub struct StateDescriptor<B: Board> {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn<B>>,
    pub on_exit: Option<StateActionFn<B>>,
    pub on_update: StateUpdateFn<B>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]) and threads a
/// mutable [`FsmContext`] through every handler call.
pub struct Fsm<B: Board> {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor<B>; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    halted: Option<Terminal>,
}

impl<B: Board> Fsm<B> {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor<B>; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            halted: None,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext<B>) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Apply one dequeued event.  Ignored once halted.
    pub fn handle_event(&mut self, event: ControllerEvent, ctx: &mut FsmContext<B>) {
        if self.halted.is_some() {
            warn!("FSM: halted, ignoring {:?}", event);
            return;
        }
        self.force_transition(target_state(event), ctx);
    }

    /// Run the current state's action once.
    ///
    /// Returns the terminal action if the machine is (now) halted.
    pub fn tick(&mut self, ctx: &mut FsmContext<B>) -> Option<Terminal> {
        if self.halted.is_some() {
            return self.halted;
        }

        match (self.table[self.current].on_update)(ctx) {
            Step::Stay => None,
            Step::Goto(next) => {
                self.force_transition(next, ctx);
                None
            }
            Step::Halt(terminal) => {
                self.halt(terminal);
                Some(terminal)
            }
        }
    }

    /// Transition unless already in `next`; a same-state request re-runs
    /// neither exit nor enter actions.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext<B>) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// Stop the machine for good.
    pub fn halt(&mut self, terminal: Terminal) {
        if self.halted.is_none() {
            info!(
                "FSM halted in {}: {:?}",
                self.table[self.current].name, terminal
            );
            self.halted = Some(terminal);
        }
    }

    pub fn halted(&self) -> Option<Terminal> {
        self.halted
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        self.table[self.current].id
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext<B>) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
