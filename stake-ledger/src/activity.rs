//! Activity recorder
//!
//! Append-only history of stake, unstake and claim actions. The only write is
//! insertion. History is best-effort: callers log a failed append and carry
//! on, the balance mutation that produced the event stands.

use crate::{
    types::ActivityEvent,
    Error, Result, Storage,
};

/// Sink and source of activity events
pub trait ActivityRecorder: Send + Sync + std::fmt::Debug {
    /// Insert events; all or none
    fn append(&self, events: &[ActivityEvent]) -> Result<()>;

    /// Events with `start <= timestamp <= end`, oldest first
    fn events_between(&self, start: i64, end: i64) -> Result<Vec<ActivityEvent>>;
}

impl ActivityRecorder for Storage {
    fn append(&self, events: &[ActivityEvent]) -> Result<()> {
        self.append_events(events)
    }

    fn events_between(&self, start: i64, end: i64) -> Result<Vec<ActivityEvent>> {
        Storage::events_between(self, start, end)
    }
}

/// Structural checks applied before an event is queued
///
/// Amount and kind are already constrained by their types (`u64`, enum), so
/// only the address and timestamp remain to check.
pub fn validate_event(event: &ActivityEvent) -> Result<()> {
    if event.wallet_address.as_str().trim().is_empty() {
        return Err(Error::InvalidRequest(
            "Activity event without wallet address".to_string(),
        ));
    }

    if event.timestamp < 0 {
        return Err(Error::InvalidRequest(
            "Activity event timestamp before epoch".to_string(),
        ));
    }

    Ok(())
}
