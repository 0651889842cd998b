//! Fuzz target: `commands::decode` / `commands::dispatch`
//!
//! Drives arbitrary byte sequences into the command decoder and asserts
//! that it never panics, never yields more than one event per key, and
//! that dispatch never overfills the bounded event queue.
//!
//! cargo fuzz run fuzz_command_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use waterly::app::commands::{self, MAX_COMMAND_EVENTS};
use waterly::events::{EVENT_QUEUE_CAP, EventQueue};

fuzz_target!(|data: &[u8]| {
    if let Ok(events) = commands::decode(data) {
        assert!(events.len() <= MAX_COMMAND_EVENTS);
    }

    // Three rounds of the same document without draining.
    let queue = EventQueue::new();
    for _ in 0..3 {
        let _ = commands::dispatch(data, &queue);
    }
    assert!(queue.len() <= EVENT_QUEUE_CAP);
});
