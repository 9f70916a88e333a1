//! The two-tier delayed-spike firing table: `firingTableD1`/`firingTableD2`
//! ring buffers and their `TT1`/`TT2` prefix-count index tables. §3, §4.3,
//! §4.4, §4.7.

use crate::error::{Result, RuntimeError};

/// Ring length of the firing tables and index tables: one slot per ms of
/// the current second plus room for the next second's maximum delay.
fn ring_len(max_delay: u32) -> usize {
    1000 + max_delay as usize + 1
}

/// Firing tables partitioned by outgoing-delay class, plus the prefix-count
/// index tables used to recover which entries fired at a given ms.
#[derive(Debug, Clone)]
pub struct FiringTable {
    /// Neuron ids that fired and have at least one 1 ms outgoing edge.
    pub d1: Vec<u32>,
    /// Neuron ids that fired and have at least one ≥2 ms outgoing edge.
    pub d2: Vec<u32>,
    /// `tt1[m]`: entries in `d1` with firing time `<= m` within the window.
    pub tt1: Vec<u32>,
    /// `tt2[m]`: entries in `d2` with firing time `<= m` within the window.
    pub tt2: Vec<u32>,
    /// Maximum axonal delay in ms.
    pub max_delay: u32,
    /// Whether the table hit capacity this second and further firings were
    /// dropped for the remainder of the step. Non-fatal; see
    /// `RuntimeError` docs. Reset at each per-second shift.
    pub spike_buffer_full: bool,
    /// Hard capacity applied to both `d1` and `d2` to keep them bounded.
    pub capacity: usize,
}

impl FiringTable {
    /// Allocate tables sized for `max_delay` and a given per-table
    /// capacity (the original sizes these generously; a fixed capacity here
    /// makes the overflow path exercisable in tests).
    pub fn new(max_delay: u32, capacity: usize) -> Self {
        let len = ring_len(max_delay);
        Self {
            d1: Vec::with_capacity(capacity),
            d2: Vec::with_capacity(capacity),
            tt1: vec![0; len],
            tt2: vec![0; len],
            max_delay,
            spike_buffer_full: false,
            capacity,
        }
    }

    /// Append `neuron` to the D1 table if it has capacity; returns whether
    /// it was appended. Sets `spike_buffer_full` on exhaustion.
    pub fn push_d1(&mut self, neuron: u32) -> bool {
        if self.d1.len() >= self.capacity {
            self.spike_buffer_full = true;
            return false;
        }
        self.d1.push(neuron);
        true
    }

    /// Append `neuron` to the D2 table if it has capacity; returns whether
    /// it was appended. Sets `spike_buffer_full` on exhaustion.
    pub fn push_d2(&mut self, neuron: u32) -> bool {
        if self.d2.len() >= self.capacity {
            self.spike_buffer_full = true;
            return false;
        }
        self.d2.push(neuron);
        true
    }

    /// Record `tt1[m] = d1.len()`, `tt2[m] = d2.len()` for `m = t +
    /// max_delay + 1`, the delay-window marker taken at the end of firing
    /// detection for ms `t`. §4.3 closing step.
    pub fn record_markers(&mut self, t: u32) -> Result<()> {
        let m = (t + self.max_delay + 1) as usize;
        let slot = self.window_slot(m)?;
        self.tt1[slot] = self.d1.len() as u32;
        self.tt2[slot] = self.d2.len() as u32;
        Ok(())
    }

    fn window_slot(&self, m: usize) -> Result<usize> {
        let len = ring_len(self.max_delay);
        if m >= len {
            return Err(RuntimeError::invariant(format!(
                "window index {m} out of range for ring length {len}"
            )));
        }
        Ok(m)
    }

    /// Read `tt1[m]`.
    pub fn tt1_at(&self, m: u32) -> Result<u32> {
        Ok(self.tt1[self.window_slot(m as usize)?])
    }

    /// Read `tt2[m]`.
    pub fn tt2_at(&self, m: u32) -> Result<u32> {
        Ok(self.tt2[self.window_slot(m as usize)?])
    }

    /// §4.7: compact the per-second window so the most recent `max_delay`
    /// ms are carried forward into the next second's history. Mirrors
    /// `shiftSpikeTables()`'s literal 999/1000 boundaries.
    pub fn shift(&mut self) -> Result<()> {
        let copy_start = self.tt2_at(999)?;
        let keep_end = self.tt2_at(1000 + self.max_delay)?;
        let keep: Vec<u32> = self.d2[copy_start as usize..keep_end as usize].to_vec();
        self.d2.clear();
        self.d2.extend(keep);

        let base = self.tt2_at(1000)?;
        for i in 0..self.max_delay {
            let new_val = self.tt2_at(1000 + i + 1)? - base;
            self.tt2[i as usize + 1] = new_val;
        }
        self.tt1[self.max_delay as usize] = 0;
        self.d1.clear();

        self.spike_buffer_full = false;
        Ok(())
    }
}
