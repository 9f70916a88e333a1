//! Identifier types shared by the simulation core

use core::fmt;

/// Identifier of a neuron group (CARLsim calls this a "group"; spec calls it
/// a population). Groups own a contiguous range of neuron ids and carry the
/// shared config (Izhikevich params, STP/STDP flags, conductance targets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

impl GroupId {
    /// Create a new group id
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Sentinel for "no group" / invalid
    pub const INVALID: Self = Self(u32::MAX);

    /// Check if this is a valid group id
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use super::*;
    use serde::{Deserialize, Serialize};

    impl Serialize for GroupId {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            self.0.serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for GroupId {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            let id = u32::deserialize(deserializer)?;
            Ok(GroupId::new(id))
        }
    }
}
