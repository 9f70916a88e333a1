//! Shared identifiers, time and event types for the Izhikevich spiking
//! network simulation core.
//!
//! The core advances in fixed 1 ms steps, so `Time` is millisecond
//! resolution rather than the nanosecond wall-clock time a general-purpose
//! event store would need.

#![deny(missing_docs)]
#![warn(clippy::all)]

use core::fmt;

/// Neuron identifier, unique across the whole network (not per-group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NeuronId(pub u32);

impl NeuronId {
    /// Create a new neuron id
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id value
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Simulation time, in whole milliseconds since the start of the run.
///
/// The core never needs sub-millisecond resolution: every phase of
/// `Engine::step` operates on one simulated millisecond at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(pub u32);

impl Time {
    /// Create a time value from a millisecond count
    pub const fn from_millis(ms: u32) -> Self {
        Self(ms)
    }

    /// Get the millisecond count
    pub const fn as_millis(&self) -> u32 {
        self.0
    }

    /// Zero time constant
    pub const ZERO: Self = Self(0);

    /// Sentinel meaning "never fired" / "no delivery scheduled", mirroring
    /// the original's `MAX_SIMULATION_TIME` guard value used to seed
    /// `lastSpikeTime`/`synSpikeTime` before any spike has happened.
    pub const NEVER: Self = Self(u32::MAX);

    /// Advance by one millisecond
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A single spike event: some neuron fired, or was told to fire, at some
/// simulated millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spike {
    /// Neuron that fired (or is being injected as firing)
    pub neuron_id: NeuronId,
    /// Time of the spike
    pub time: Time,
}

impl Spike {
    /// Create a new spike event
    pub const fn new(neuron_id: NeuronId, time: Time) -> Self {
        Self { neuron_id, time }
    }
}

pub mod error;
pub mod ids;

pub use error::{Result, SnnError};
pub use ids::GroupId;

/// Crate version, exposed for compatibility checks by companion crates.
pub const SNN_TYPES_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_roundtrip() {
        let t = Time::from_millis(42);
        assert_eq!(t.as_millis(), 42);
        assert_eq!(t.next(), Time::from_millis(43));
    }

    #[test]
    fn time_never_is_max() {
        assert_eq!(Time::NEVER.as_millis(), u32::MAX);
    }

    #[test]
    fn spike_construction() {
        let s = Spike::new(NeuronId::new(3), Time::from_millis(10));
        assert_eq!(s.neuron_id.raw(), 3);
        assert_eq!(s.time.as_millis(), 10);
    }
}
