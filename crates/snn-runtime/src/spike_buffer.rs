//! External spike scheduling queue: the `schedule_spike`/drain mechanism
//! that feeds phase 2 ("External spike generation") of `doSnnSim`. §4.2,
//! §6, out-of-scope collaborators ("Spike buffer").

use std::collections::BTreeMap;

use crate::error::{Result, RuntimeError};

/// A spike scheduled for delivery at a specific absolute ms, tagged with
/// the group it originated from (used only by external intake bookkeeping,
/// not by the core's own per-neuron state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledSpike {
    /// Neuron to deliver the spike to.
    pub neuron_id: u32,
    /// Group the neuron belongs to.
    pub group_id: u32,
}

/// Scheduling queue external spike generators (Poisson rate sources, user
/// callbacks, or direct `schedule_spike` calls) insert into. The core pops
/// one ms worth of entries per step.
#[derive(Debug, Clone, Default)]
pub struct SpikeBuffer {
    queue: BTreeMap<u32, Vec<ScheduledSpike>>,
}

impl SpikeBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `neuron_id` to fire at absolute time `t`. §6:
    /// `schedule_spike(neurId, relativeMs)` — callers are expected to have
    /// already turned `relativeMs` into an absolute time before this call;
    /// the buffer itself is agnostic to the offset convention.
    pub fn schedule(&mut self, neuron_id: u32, group_id: u32, t: u32) {
        self.queue
            .entry(t)
            .or_default()
            .push(ScheduledSpike { neuron_id, group_id });
    }

    /// Drain and return every spike scheduled for exactly `t`, removing
    /// them from the queue. §4.2: "drain the spike buffer's current-step
    /// range... advance the buffer's time cursor by one slot."
    pub fn drain_at(&mut self, t: u32) -> Vec<ScheduledSpike> {
        self.queue.remove(&t).unwrap_or_default()
    }

    /// Whether any spikes remain scheduled at or after `t`.
    pub fn has_pending_from(&self, t: u32) -> bool {
        self.queue.range(t..).next().is_some()
    }

    /// Accept a Poisson-/callback-generated arrival time if and only if it
    /// satisfies the acceptance predicate: `current_time <= t < end_of_window`,
    /// combined with the "must be strictly after the previous scheduled
    /// time, or be the literal sentinel 0" rule from the callback
    /// interface's contract. Shared by both the Poisson path (§4.2) and the
    /// callback path so the two drivers cannot silently diverge.
    pub fn accept_time(
        candidate: u32,
        last_scheduled: u32,
        current_time: u32,
        end_of_window: u32,
    ) -> bool {
        (candidate > last_scheduled || candidate == 0)
            && current_time <= candidate
            && candidate < end_of_window
    }

    /// Schedule `neuron_id`'s spike at `t` only if it passes
    /// `accept_time`; returns whether it was scheduled. Invariant
    /// violation if `t` is in the past relative to `current_time` and
    /// non-zero (would silently corrupt ordering instead).
    pub fn try_schedule(
        &mut self,
        neuron_id: u32,
        group_id: u32,
        t: u32,
        last_scheduled: u32,
        current_time: u32,
        end_of_window: u32,
    ) -> Result<bool> {
        if !Self::accept_time(t, last_scheduled, current_time, end_of_window) {
            return Ok(false);
        }
        if t < current_time {
            return Err(RuntimeError::invariant(format!(
                "scheduled spike time {t} precedes current time {current_time}"
            )));
        }
        self.schedule(neuron_id, group_id, t);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_and_drain_roundtrip() {
        let mut buf = SpikeBuffer::new();
        buf.schedule(3, 0, 10);
        buf.schedule(4, 0, 10);
        buf.schedule(5, 0, 11);
        let at10 = buf.drain_at(10);
        assert_eq!(at10.len(), 2);
        assert!(buf.drain_at(10).is_empty());
        assert_eq!(buf.drain_at(11).len(), 1);
    }

    #[test]
    fn accept_time_rejects_out_of_window() {
        assert!(!SpikeBuffer::accept_time(5, 10, 0, 20));
        assert!(SpikeBuffer::accept_time(15, 10, 0, 20));
        assert!(SpikeBuffer::accept_time(0, 10, 0, 20));
        assert!(!SpikeBuffer::accept_time(25, 10, 0, 20));
    }

    #[test]
    fn has_pending_from_checks_future_entries() {
        let mut buf = SpikeBuffer::new();
        buf.schedule(1, 0, 50);
        assert!(buf.has_pending_from(10));
        assert!(!buf.has_pending_from(51));
    }
}
