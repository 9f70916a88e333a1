//! Error types for the SNN simulation core
//!
//! Per the error-handling contract: configuration errors and invariant
//! violations are the only two kinds the core ever returns. Table/buffer
//! exhaustion is deliberately not one of them — it is surfaced as a
//! `log::warn!` plus a readable `spike_buffer_full` flag, never an `Err`.

use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while configuring or stepping the simulation core.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Error from the shared id/time/error types crate.
    #[error(transparent)]
    Types(#[from] snn_types::SnnError),

    /// Invalid network or group configuration, rejected before the
    /// simulation runs: bad curve id, mismatched Poisson rate length, a
    /// rate array declared GPU-resident while the CPU engine is in use.
    #[error("invalid configuration: {reason}")]
    Configuration {
        /// Reason the configuration was rejected.
        reason: String,
    },

    /// A data-model invariant was violated: negative Δt against a real
    /// past spike, NaN/Inf voltage, an edge index outside `Npre`. These are
    /// programmer/data errors — unrecoverable by design, never retried.
    #[error("invariant violation: {reason}")]
    InvariantViolation {
        /// Reason the invariant does not hold.
        reason: String,
    },

    /// Neuron id referenced that does not exist in the network.
    #[error("neuron {neuron_id} not found")]
    NeuronNotFound {
        /// The missing neuron id.
        neuron_id: u32,
    },

    /// Group id referenced that does not exist in the network.
    #[error("group {group_id} not found")]
    GroupNotFound {
        /// The missing group id.
        group_id: u32,
    },
}

impl RuntimeError {
    /// Build a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Build an invariant-violation error.
    pub fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// Build a neuron-not-found error.
    pub fn neuron_not_found(neuron_id: u32) -> Self {
        Self::NeuronNotFound { neuron_id }
    }

    /// Build a group-not-found error.
    pub fn group_not_found(group_id: u32) -> Self {
        Self::GroupNotFound { group_id }
    }
}
