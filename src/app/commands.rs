//! Inbound commands from the broker.
//!
//! The command listener receives small JSON documents and turns them into
//! [`ControllerEvent`]s:
//!
//! | key        | value   | event            |
//! |------------|---------|------------------|
//! | `idle`     | `true`  | `GoIdle`         |
//! | `training` | `true`  | `StartTraining`  |
//! | `training` | `false` | `StopAndSleep`   |
//! | `measure`  | `true`  | `SingleMeasure`  |
//! | `update`   | `true`  | `StartOtaUpdate` |
//!
//! Unknown keys and non-boolean values are ignored.  Events come out in
//! the table's order regardless of key order in the document.

use heapless::Vec;
use log::{debug, warn};
use serde_json::Value;

use crate::events::{ControllerEvent, EventQueue};

/// Most events a single document can produce.
pub const MAX_COMMAND_EVENTS: usize = 4;

pub type CommandEvents = Vec<ControllerEvent, MAX_COMMAND_EVENTS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// The payload is not valid JSON.
    Malformed,
    /// The payload is JSON but not an object.
    NotAnObject,
}

impl core::fmt::Display for CommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed command JSON"),
            Self::NotAnObject => write!(f, "command is not a JSON object"),
        }
    }
}

/// Decode one command document.
pub fn decode(payload: &[u8]) -> Result<CommandEvents, CommandError> {
    let doc: Value = serde_json::from_slice(payload).map_err(|_| CommandError::Malformed)?;
    let obj = doc.as_object().ok_or(CommandError::NotAnObject)?;
    let flag = |key: &str| obj.get(key).and_then(Value::as_bool);

    let mut events = CommandEvents::new();
    let mut emit = |e: ControllerEvent| {
        // At most one event per key, so capacity is never exceeded.
        let _ = events.push(e);
    };

    if flag("idle") == Some(true) {
        emit(ControllerEvent::GoIdle);
    }
    match flag("training") {
        Some(true) => emit(ControllerEvent::StartTraining),
        Some(false) => emit(ControllerEvent::StopAndSleep),
        None => {}
    }
    if flag("measure") == Some(true) {
        emit(ControllerEvent::SingleMeasure);
    }
    if flag("update") == Some(true) {
        emit(ControllerEvent::StartOtaUpdate);
    }

    debug!("Command: {:?}", events);
    Ok(events)
}

/// Decode a document and submit its events to `queue`.
///
/// Returns how many events the queue accepted.
pub fn dispatch(payload: &[u8], queue: &EventQueue) -> Result<usize, CommandError> {
    let events = decode(payload).inspect_err(|e| warn!("Command: {}", e))?;
    Ok(events.iter().filter(|&&e| queue.submit(e).is_ok()).count())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(json: &str) -> std::vec::Vec<ControllerEvent> {
        decode(json.as_bytes()).unwrap().into_iter().collect()
    }

    #[test]
    fn training_flag_maps_both_ways() {
        assert_eq!(events(r#"{"training":true}"#), [ControllerEvent::StartTraining]);
        assert_eq!(events(r#"{"training":false}"#), [ControllerEvent::StopAndSleep]);
    }

    #[test]
    fn update_only_on_true() {
        assert_eq!(events(r#"{"update":true}"#), [ControllerEvent::StartOtaUpdate]);
        assert!(events(r#"{"update":false}"#).is_empty());
    }

    #[test]
    fn multiple_keys_follow_fixed_order() {
        assert_eq!(
            events(r#"{"update":true,"measure":true,"training":true,"idle":true}"#),
            [
                ControllerEvent::GoIdle,
                ControllerEvent::StartTraining,
                ControllerEvent::SingleMeasure,
                ControllerEvent::StartOtaUpdate,
            ]
        );
    }

    #[test]
    fn unknown_keys_and_non_bool_values_are_ignored() {
        assert!(events(r#"{"reboot":true,"training":1,"measure":"yes"}"#).is_empty());
    }

    #[test]
    fn malformed_and_non_object_payloads_are_errors() {
        assert_eq!(decode(b"{training:true"), Err(CommandError::Malformed));
        assert_eq!(decode(b"[true]"), Err(CommandError::NotAnObject));
    }

    #[test]
    fn dispatch_counts_accepted_events() {
        let q = EventQueue::new();
        assert_eq!(dispatch(br#"{"idle":true,"measure":true}"#, &q), Ok(2));
        assert_eq!(q.try_next(), Some(ControllerEvent::GoIdle));
        assert_eq!(q.try_next(), Some(ControllerEvent::SingleMeasure));
    }
}
