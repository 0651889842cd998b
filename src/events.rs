//! Controller event queue.
//!
//! Events are produced by:
//! - The command listener (decoded broker messages)
//! - The boot sequence (default GoIdle once connectivity is settled)
//! - Tests and host simulations
//!
//! Events are consumed by the controller task, at most one per iteration.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ MQTT task   │────▶│  Event Queue │────▶│  Controller  │
//! │ Boot        │────▶│  (bounded)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Producers never block: a full queue rejects the event and says so.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::error::Error;

/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 10;

/// Requests that change the controller's operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControllerEvent {
    GoIdle = 0,
    StartTraining = 1,
    SingleMeasure = 2,
    StopAndSleep = 3,
    StartOtaUpdate = 4,
}

impl ControllerEvent {
    pub const ALL: [Self; 5] = [
        Self::GoIdle,
        Self::StartTraining,
        Self::SingleMeasure,
        Self::StopAndSleep,
        Self::StartOtaUpdate,
    ];
}

/// Bounded multi-producer queue feeding the controller.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, ControllerEvent, EVENT_QUEUE_CAP>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue without blocking.
    pub fn submit(&self, event: ControllerEvent) -> Result<(), Error> {
        self.channel.try_send(event).map_err(|_| {
            warn!("Events: queue full, dropping {:?}", event);
            Error::QueueFull
        })
    }

    /// Dequeue without blocking.
    pub fn try_next(&self) -> Option<ControllerEvent> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Drop every pending event.
    pub fn clear(&self) {
        self.channel.clear();
    }
}

/// Process-wide queue served by the command listener.
pub static EVENTS: EventQueue = EventQueue::new();

/// Push an event into the global queue.
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: ControllerEvent) -> bool {
    EVENTS.submit(event).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eleventh_submission_is_rejected_and_fifo_kept() {
        let q = EventQueue::new();
        let pattern = |i: usize| ControllerEvent::ALL[i % ControllerEvent::ALL.len()];
        for i in 0..EVENT_QUEUE_CAP {
            assert!(q.submit(pattern(i)).is_ok());
        }
        assert_eq!(q.submit(ControllerEvent::GoIdle), Err(Error::QueueFull));
        assert_eq!(q.len(), EVENT_QUEUE_CAP);
        for i in 0..EVENT_QUEUE_CAP {
            assert_eq!(q.try_next(), Some(pattern(i)));
        }
        assert_eq!(q.try_next(), None);
    }

    #[test]
    fn empty_queue_yields_nothing() {
        let q = EventQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.try_next(), None);
    }

    #[test]
    fn global_entry_point_reports_acceptance() {
        EVENTS.clear();
        assert!(push_event(ControllerEvent::SingleMeasure));
        assert_eq!(EVENTS.try_next(), Some(ControllerEvent::SingleMeasure));
    }
}
