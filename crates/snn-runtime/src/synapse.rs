//! Per-synapse state and the post-synaptic fan-out table.
//!
//! Edges are addressed by a flat pre-synaptic edge index `e`. For a given
//! post-synaptic neuron `p`, its incoming edges occupy the contiguous range
//! `[cumulative_pre[p], cumulative_pre[p] + n_pre[p])`; the first
//! `n_pre_plastic[p]` of those are plastic. This mirrors a CSR row layout
//! with `p` as the row.

use crate::error::{Result, RuntimeError};
use snn_types::Time;

/// One entry in the delay-indexed post-synaptic fan-out table: a
/// destination neuron id and which of its incoming-edge slots this
/// connection occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostSynapticEntry {
    /// Destination (post-synaptic) neuron id.
    pub post: u32,
    /// Slot of this edge within `post`'s incoming-edge range — i.e. `e -
    /// cumulative_pre[post]`.
    pub slot: u32,
}

/// Start offset and length of the edges with one exact axonal delay, for
/// one pre-synaptic neuron. Looked up via
/// `post_delay_info[pre * (max_delay + 1) + delay]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayInfo {
    /// Index into `post_synaptic_ids` where this delay's edges start.
    pub start: u32,
    /// Number of consecutive edges in `post_synaptic_ids` at this delay.
    pub length: u32,
}

/// Per-synapse (flat edge-indexed) state arrays and the post-synaptic
/// fan-out table built from the network topology.
#[derive(Debug, Clone, Default)]
pub struct SynapseTable {
    /// Current weight, one entry per edge.
    pub wt: Vec<f32>,
    /// Signed upper bound: magnitude is the clamp ceiling, sign encodes
    /// excitatory (`>= 0`) vs inhibitory (`< 0`).
    pub max_syn_wt: Vec<f32>,
    /// Accumulated pending plastic delta, one entry per edge.
    pub wt_change: Vec<f32>,
    /// Arrival time of the last spike delivered on this edge.
    pub syn_spike_time: Vec<Time>,
    /// Connection-group id, used to look up `mul_syn_fast`/`mul_syn_slow`.
    pub conn_ids_pre_idx: Vec<u32>,

    /// Start of neuron `p`'s incoming-edge range, indexed by post neuron id.
    pub cumulative_pre: Vec<u32>,
    /// Length of neuron `p`'s incoming-edge range.
    pub n_pre: Vec<u32>,
    /// How many of neuron `p`'s incoming edges (from the start of its
    /// range) are plastic.
    pub n_pre_plastic: Vec<u32>,

    /// Start of neuron `i`'s outgoing fan-out range, indexed by
    /// pre-synaptic neuron id, into `post_synaptic_ids`.
    pub cumulative_post: Vec<u32>,
    /// Packed `(post, slot)` destinations, addressed via
    /// `cumulative_post[pre] + offset_within_delay_range`.
    pub post_synaptic_ids: Vec<PostSynapticEntry>,
    /// `post_delay_info[pre * (max_delay + 1) + delay]`, flattened 2-D.
    pub post_delay_info: Vec<DelayInfo>,

    /// Maximum axonal delay in ms across the whole network.
    pub max_delay: u32,
}

impl SynapseTable {
    /// Range of edge indices incoming to neuron `post`.
    pub fn incoming_range(&self, post: u32) -> std::ops::Range<u32> {
        let start = self.cumulative_pre[post as usize];
        start..start + self.n_pre[post as usize]
    }

    /// Range of plastic edge indices incoming to neuron `post`.
    pub fn incoming_plastic_range(&self, post: u32) -> std::ops::Range<u32> {
        let start = self.cumulative_pre[post as usize];
        start..start + self.n_pre_plastic[post as usize]
    }

    /// Look up the delay-specific fan-out range for pre-synaptic neuron
    /// `pre` at axonal delay `delay` (`0` denotes the 1 ms class).
    pub fn delay_info(&self, pre: u32, delay: u32) -> Result<DelayInfo> {
        let idx = pre as usize * (self.max_delay as usize + 1) + delay as usize;
        self.post_delay_info.get(idx).copied().ok_or_else(|| {
            RuntimeError::invariant(format!(
                "post_delay_info index {idx} out of range for pre={pre} delay={delay}"
            ))
        })
    }

    /// Resolve a fan-out slot in `post_synaptic_ids` to the edge index it
    /// denotes, via `e = cumulative_pre[post] + slot`.
    pub fn resolve_edge(&self, entry: PostSynapticEntry) -> u32 {
        self.cumulative_pre[entry.post as usize] + entry.slot
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.wt.len()
    }

    /// Whether edge `e` is excitatory (non-negative bound).
    pub fn is_excitatory(&self, e: u32) -> bool {
        self.max_syn_wt[e as usize] >= 0.0
    }

    /// Clamp edge `e`'s weight into `[0, max_syn_wt]` (excitatory) or
    /// `[max_syn_wt, 0]` (inhibitory), per the sign of `max_syn_wt[e]`.
    pub fn clamp_weight(&mut self, e: u32) {
        let bound = self.max_syn_wt[e as usize];
        let w = &mut self.wt[e as usize];
        if bound >= 0.0 {
            *w = w.clamp(0.0, bound);
        } else {
            *w = w.clamp(bound, 0.0);
        }
    }
}
