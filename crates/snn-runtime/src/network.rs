//! Network builder: the out-of-scope "Network builder" collaborator named
//! in spec §1, reified here as an in-crate helper so tests (and any
//! embedding caller) can assemble an [`Engine`] without hand-rolling CSR
//! arithmetic. §3's data model, §9's "populate neuron/group/connection/
//! delay tables before the core runs".

use std::collections::HashMap;

use snn_types::Time;

use crate::engine::{Engine, DA_BUFFER_LEN};
use crate::error::{Result, RuntimeError};
use crate::firing_table::FiringTable;
use crate::group::{ConductanceDecay, GroupConfig, SynapticGain};
use crate::neuron::{NeuronTable, SynapseMode};
use crate::spike_buffer::SpikeBuffer;
use crate::stp::StpBuffer;
use crate::synapse::{DelayInfo, PostSynapticEntry, SynapseTable};

/// A single directed connection between two neurons, as fed to the builder
/// before CSR tables are derived.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSpec {
    /// Pre-synaptic neuron id.
    pub pre: u32,
    /// Post-synaptic neuron id.
    pub post: u32,
    /// Initial weight.
    pub weight: f32,
    /// Signed weight bound (sign encodes excitatory/inhibitory).
    pub max_weight: f32,
    /// Axonal delay in ms, `>= 1`.
    pub delay: u32,
    /// Whether this edge participates in STDP (`true`) or is fixed.
    pub plastic: bool,
    /// Connection-group id, indexes into the builder's `conn_gains` table.
    pub conn_group: u32,
}

/// Builds an [`Engine`] from group configurations and a connection list,
/// deriving every CSR/fan-out array named in §3.
#[derive(Default)]
pub struct NetworkBuilder {
    groups: Vec<GroupConfig>,
    connections: Vec<ConnectionSpec>,
    conn_gains: Vec<SynapticGain>,
    mode: Option<SynapseMode>,
    decay: ConductanceDecay,
    stdp_scale_factor: f32,
    wt_change_decay: f32,
    testing_mode: bool,
    firing_table_capacity: usize,
}

impl NetworkBuilder {
    /// Start a new, empty builder.
    pub fn new() -> Self {
        Self {
            stdp_scale_factor: 1.0,
            wt_change_decay: 1.0,
            firing_table_capacity: 8192,
            ..Default::default()
        }
    }

    /// Register a neuron group. Groups must be added in ascending,
    /// non-overlapping `[start_id, end_id)` order.
    pub fn add_group(mut self, group: GroupConfig) -> Self {
        self.groups.push(group);
        self
    }

    /// Register a directed connection.
    pub fn add_connection(mut self, conn: ConnectionSpec) -> Self {
        self.connections.push(conn);
        self
    }

    /// Register a connection-group mixing gain at the index connections
    /// will reference via `conn_group`.
    pub fn add_conn_gain(mut self, gain: SynapticGain) -> Self {
        self.conn_gains.push(gain);
        self
    }

    /// Select COBA or CUBA integration. Defaults to COBA.
    pub fn with_mode(mut self, mode: SynapseMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Override the default conductance decay constants.
    pub fn with_conductance_decay(mut self, decay: ConductanceDecay) -> Self {
        self.decay = decay;
        self
    }

    /// Set the global STDP scale factor applied at weight commit.
    pub fn with_stdp_scale_factor(mut self, scale: f32) -> Self {
        self.stdp_scale_factor = scale;
        self
    }

    /// Set the per-commit `wtChange` decay factor.
    pub fn with_wt_change_decay(mut self, decay: f32) -> Self {
        self.wt_change_decay = decay;
        self
    }

    /// Build in testing mode: STDP never writes `wtChange`, weight commit
    /// never runs. §7 testable property 7.
    pub fn with_testing_mode(mut self, testing: bool) -> Self {
        self.testing_mode = testing;
        self
    }

    /// Override the firing-table capacity (default 8192 per class).
    pub fn with_firing_table_capacity(mut self, capacity: usize) -> Self {
        self.firing_table_capacity = capacity;
        self
    }

    /// Validate groups and connections, derive every CSR array, and
    /// assemble the [`Engine`].
    pub fn build(self) -> Result<Engine> {
        if self.groups.is_empty() {
            return Err(RuntimeError::config("network has no groups"));
        }
        for g in &self.groups {
            g.validate()?;
        }
        for pair in self.groups.windows(2) {
            if pair[1].start_id < pair[0].end_id {
                return Err(RuntimeError::config(format!(
                    "group {} overlaps group {}",
                    pair[1].id, pair[0].id
                )));
            }
        }

        let num_neurons = self.groups.iter().map(|g| g.end_id).max().unwrap_or(0) as usize;
        let max_delay = self
            .connections
            .iter()
            .map(|c| c.delay)
            .max()
            .unwrap_or(1)
            .max(1);

        for c in &self.connections {
            if c.delay == 0 {
                return Err(RuntimeError::config(format!(
                    "connection {}->{} has zero axonal delay; delays start at 1 ms",
                    c.pre, c.post
                )));
            }
        }

        let mut neurons = NeuronTable::with_capacity(num_neurons);
        for g in &self.groups {
            for i in g.start_id..g.end_id {
                neurons.grp_ids[i as usize] = g.id.raw();
                neurons.base_firing[i as usize] = g.base_firing;
            }
        }

        // Group incoming connections per post neuron, plastic edges first
        // so the first `n_pre_plastic[post]` entries of each row are
        // exactly the plastic ones.
        let mut incoming: Vec<Vec<ConnectionSpec>> = vec![Vec::new(); num_neurons];
        for &c in &self.connections {
            incoming[c.post as usize].push(c);
        }
        for row in &mut incoming {
            row.sort_by_key(|c| !c.plastic);
        }

        let mut wt = Vec::with_capacity(self.connections.len());
        let mut max_syn_wt = Vec::with_capacity(self.connections.len());
        let mut wt_change = Vec::with_capacity(self.connections.len());
        let mut syn_spike_time = Vec::with_capacity(self.connections.len());
        let mut conn_ids_pre_idx = Vec::with_capacity(self.connections.len());
        let mut cumulative_pre = vec![0u32; num_neurons];
        let mut n_pre = vec![0u32; num_neurons];
        let mut n_pre_plastic = vec![0u32; num_neurons];

        // edge_slot[(pre, post)] -> (edge index, slot within post's row)
        let mut edge_index: HashMap<(u32, u32), (u32, u32)> = HashMap::new();

        let mut next_edge = 0u32;
        for post in 0..num_neurons as u32 {
            cumulative_pre[post as usize] = next_edge;
            let row = &incoming[post as usize];
            n_pre[post as usize] = row.len() as u32;
            n_pre_plastic[post as usize] = row.iter().filter(|c| c.plastic).count() as u32;
            for (slot, c) in row.iter().enumerate() {
                wt.push(c.weight);
                max_syn_wt.push(c.max_weight);
                wt_change.push(0.0);
                syn_spike_time.push(Time::NEVER);
                conn_ids_pre_idx.push(c.conn_group);
                edge_index.insert((c.pre, post), (next_edge, slot as u32));
                next_edge += 1;
            }
        }

        // Outgoing fan-out per pre neuron, grouped by exact delay.
        let mut outgoing: Vec<Vec<ConnectionSpec>> = vec![Vec::new(); num_neurons];
        for &c in &self.connections {
            outgoing[c.pre as usize].push(c);
        }

        let mut cumulative_post = vec![0u32; num_neurons];
        let mut post_synaptic_ids = Vec::with_capacity(self.connections.len());
        let mut post_delay_info =
            vec![DelayInfo::default(); num_neurons * (max_delay as usize + 1)];
        let mut has_d1_outgoing = vec![false; num_neurons];
        let mut has_d2_outgoing = vec![false; num_neurons];

        let mut next_fanout = 0u32;
        for pre in 0..num_neurons as u32 {
            cumulative_post[pre as usize] = next_fanout;
            let row = &outgoing[pre as usize];

            let mut by_delay: HashMap<u32, Vec<u32>> = HashMap::new();
            for c in row {
                by_delay.entry(c.delay).or_default().push(c.post);
                if c.delay == 1 {
                    has_d1_outgoing[pre as usize] = true;
                } else {
                    has_d2_outgoing[pre as usize] = true;
                }
            }

            for delay in 0..=max_delay {
                // D1 deliveries are always looked up at index 0 of
                // post_delay_info (§4.4); route the 1 ms class there too.
                let lookup_delay = if delay == 1 { 0 } else { delay };
                let Some(posts) = by_delay.get(&delay) else { continue };
                let start = next_fanout;
                for &post in posts {
                    let (_, slot) = edge_index[&(pre, post)];
                    post_synaptic_ids.push(PostSynapticEntry { post, slot });
                    next_fanout += 1;
                }
                let idx = pre as usize * (max_delay as usize + 1) + lookup_delay as usize;
                let entry = &mut post_delay_info[idx];
                if entry.length == 0 {
                    entry.start = start;
                    entry.length = posts.len() as u32;
                } else {
                    entry.length += posts.len() as u32;
                }
            }
        }

        let synapses = SynapseTable {
            wt,
            max_syn_wt,
            wt_change,
            syn_spike_time,
            conn_ids_pre_idx,
            cumulative_pre,
            n_pre,
            n_pre_plastic,
            cumulative_post,
            post_synaptic_ids,
            post_delay_info,
            max_delay,
        };

        neurons.has_d1_outgoing = has_d1_outgoing;
        neurons.has_d2_outgoing = has_d2_outgoing;

        let num_groups = self.groups.len();
        let conn_gains = if self.conn_gains.is_empty() {
            vec![SynapticGain {
                mul_syn_fast: 1.0,
                mul_syn_slow: 1.0,
            }]
        } else {
            self.conn_gains
        };

        Ok(Engine {
            neurons,
            synapses,
            groups: self.groups,
            conn_gains,
            stp: StpBuffer::new(num_neurons, max_delay),
            firing: FiringTable::new(max_delay, self.firing_table_capacity),
            spike_buffer: SpikeBuffer::new(),
            decay: self.decay,
            mode: self.mode.unwrap_or(SynapseMode::Coba),
            sim_time: 0,
            grp_da: vec![0.0; num_groups],
            grp_da_buffer: vec![vec![0.0; DA_BUFFER_LEN]; num_groups],
            spike_count_sec: 0,
            spike_count_d1_sec: 0,
            spike_count_d2_sec: 0,
            spike_count: 0,
            spike_count_d1: 0,
            spike_count_d2: 0,
            n_poisson_spikes: 0,
            stdp_scale_factor: self.stdp_scale_factor,
            wt_change_decay: self.wt_change_decay,
            testing_mode: self.testing_mode,
        })
    }
}
