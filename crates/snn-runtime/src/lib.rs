//! Per-millisecond simulation core for an Izhikevich spiking neural
//! network with conductance- or current-based synapses, axonal conduction
//! delays, short-term plasticity, and dopamine-modulated,
//! homeostasis-aware STDP.
//!
//! The core is the `doSnnSim` step loop ([`Engine::step`]): each
//! simulated millisecond decays STP/conductance state, drains externally
//! scheduled spikes, integrates Izhikevich dynamics to detect firing,
//! delivers delayed spikes to post-synaptic targets, and integrates
//! membrane voltage. [`Engine::shift_tables_and_commit_weights`] runs once
//! per simulated second to compact the delay window and apply plasticity.

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export shared id/time/error types
pub use snn_types::{GroupId, NeuronId, Result as TypesResult, SnnError, Spike, Time};

pub mod engine;
pub mod error;
pub mod firing_table;
pub mod group;
pub mod network;
pub mod neuron;
pub mod poisson;
pub mod spike_buffer;
pub mod stdp;
pub mod stp;
pub mod synapse;

pub use engine::Engine;
pub use error::{Result, RuntimeError};
pub use network::{ConnectionSpec, NetworkBuilder};
pub use neuron::SynapseMode;

/// Runtime crate version for compatibility checking.
pub const RUNTIME_VERSION: u32 = 1;

/// The core's fixed simulated step size, in milliseconds. §1: "no adaptive
/// time step (fixed 1 ms tick, with a sub-step of 0.5 ms for conductance
/// integration)".
pub const STEP_MS: u32 = 1;

/// Number of simulated ms between calls to
/// [`Engine::shift_tables_and_commit_weights`]. §2: "once per simulated
/// second (every 1000 steps)".
pub const SECOND_MS: u32 = 1000;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{GroupConfig, GroupParams, StdpCurve, StdpMode, TARGET_AMPA};
    use crate::network::{ConnectionSpec, NetworkBuilder};

    #[test]
    fn basic_integration_builds_and_steps() {
        let engine = NetworkBuilder::new()
            .add_group(GroupConfig {
                id: GroupId::new(0),
                start_id: 0,
                end_id: 2,
                type_flags: TARGET_AMPA,
                feature_flags: 0,
                stdp_mode: StdpMode::Standard,
                stdp_curve: StdpCurve::Exp,
                params: GroupParams::default(),
                base_firing: 5.0,
            })
            .add_connection(ConnectionSpec {
                pre: 0,
                post: 1,
                weight: 5.0,
                max_weight: 10.0,
                delay: 1,
                plastic: false,
                conn_group: 0,
            })
            .build();
        assert!(engine.is_ok());
    }

    #[test]
    fn constants_match_spec() {
        assert_eq!(STEP_MS, 1);
        assert_eq!(SECOND_MS, 1000);
    }
}
