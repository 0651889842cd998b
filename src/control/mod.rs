//! Acquisition control: one illuminate → trigger → poll → read cycle.

pub mod sequencer;
