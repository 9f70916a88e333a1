//! Shared error type for the simulation core

use thiserror::Error;

/// Result type used across `snn-types` and `snn-runtime`
pub type Result<T> = std::result::Result<T, SnnError>;

/// Errors that can occur while configuring or stepping the simulation core.
///
/// The three kinds below mirror the error taxonomy the simulation core is
/// specified against: configuration errors are rejected before the network
/// ever runs, invariant violations are programmer/data errors surfaced as
/// hard failures, and everything else reads as an ordinary operation error.
#[derive(Error, Debug)]
pub enum SnnError {
    /// Invalid network or group configuration (curve id, rate length, weight bounds, ...)
    #[error("configuration error: {reason}")]
    Configuration {
        /// Human-readable reason
        reason: String,
    },

    /// A data-model invariant was violated (negative Δt against a real spike,
    /// NaN/Inf voltage, out-of-range edge index, ...). Unrecoverable.
    #[error("invariant violation: {reason}")]
    InvariantViolation {
        /// Human-readable reason
        reason: String,
    },

    /// Neuron id referenced that does not exist in the network
    #[error("neuron {0} not found")]
    NeuronNotFound(u32),

    /// Group id referenced that does not exist in the network
    #[error("group {0} not found")]
    GroupNotFound(u32),
}

impl SnnError {
    /// Build a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Build an invariant-violation error
    pub fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = SnnError::config("tau_m must be positive");
        assert!(matches!(err, SnnError::Configuration { .. }));
        assert!(format!("{err}").contains("tau_m"));
    }

    #[test]
    fn invariant_error_display() {
        let err = SnnError::invariant("negative Δt against a real spike");
        assert!(matches!(err, SnnError::InvariantViolation { .. }));
    }
}
