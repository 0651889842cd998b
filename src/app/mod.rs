//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules for the Waterly node: FSM
//! orchestration over the measurement sequencer, plus command decoding.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod controller;
pub mod ports;
