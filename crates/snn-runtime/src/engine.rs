//! The `Engine` aggregate: single owned state bag driving `doSnnSim`. §9:
//! "a single owned `Engine` aggregate passed by exclusive reference through
//! phase functions; no hidden globals."

use log::{debug, warn};
use snn_types::Time;

use crate::error::{Result, RuntimeError};
use crate::firing_table::FiringTable;
use crate::group::{
    has, ConductanceDecay, GroupConfig, StdpMode, SynapticGain, FIXED_INPUT_WTS, TARGET_AMPA,
    TARGET_DA, TARGET_GABAA, TARGET_GABAB, TARGET_NMDA, WITH_ESTDP, WITH_HOMEOSTASIS, WITH_ISTDP,
    WITH_STDP, WITH_STP,
};
use crate::neuron::{NeuronTable, SynapseMode};
use crate::spike_buffer::SpikeBuffer;
use crate::stdp::{
    post_before_pre_excitatory, post_before_pre_inhibitory, pre_before_post_excitatory,
    pre_before_post_inhibitory,
};
use crate::stp::StpBuffer;
use crate::synapse::{PostSynapticEntry, SynapseTable};

/// Dopamine trace sample rate: one value per simulated ms, per group.
pub(crate) const DA_BUFFER_LEN: usize = 1000;

/// The simulation core. Owns every runtime array named in the data model
/// and every phase of `step`/`shift_tables_and_commit_weights`.
pub struct Engine {
    /// Per-neuron state, indexed by global neuron id.
    pub neurons: NeuronTable,
    /// Per-synapse state and fan-out tables.
    pub synapses: SynapseTable,
    /// Group configuration, indexed by `GroupConfig::id`.
    pub groups: Vec<GroupConfig>,
    /// Per connection-group mixing gains, indexed by `conn_ids_pre_idx`.
    pub conn_gains: Vec<SynapticGain>,
    /// Short-term plasticity ring buffers.
    pub stp: StpBuffer,
    /// Delayed-delivery firing tables.
    pub firing: FiringTable,
    /// External spike scheduling queue.
    pub spike_buffer: SpikeBuffer,
    /// Shared conductance decay constants.
    pub decay: ConductanceDecay,
    /// Synaptic integration mode (COBA or CUBA).
    pub mode: SynapseMode,

    /// Current simulation time, ms, monotonic.
    pub sim_time: u32,

    /// Per-group dopamine level.
    pub grp_da: Vec<f32>,
    /// Per-group, per-ms dopamine sample ring (`grpDABuffer`).
    pub grp_da_buffer: Vec<Vec<f32>>,

    /// Cumulative spikes this second (all classes).
    pub spike_count_sec: u64,
    /// Cumulative D1 spikes this second.
    pub spike_count_d1_sec: u64,
    /// Cumulative D2 spikes this second.
    pub spike_count_d2_sec: u64,
    /// Cumulative spikes across the whole run.
    pub spike_count: u64,
    /// Cumulative D1 spikes across the whole run.
    pub spike_count_d1: u64,
    /// Cumulative D2 spikes across the whole run.
    pub spike_count_d2: u64,
    /// Cumulative spikes that entered via the external/Poisson intake path.
    pub n_poisson_spikes: u64,

    /// Global scale applied to `wtChange` at commit time.
    pub stdp_scale_factor: f32,
    /// Per-commit decay applied to `wtChange` after it is folded into `wt`.
    pub wt_change_decay: f32,

    /// When set, phases 3/5's STDP application and phase 8's weight commit
    /// are skipped entirely: `wtChange` is never written, `wt` is never
    /// modified outside clamping. §4.3, §4.5, §7 testable property 7.
    pub testing_mode: bool,
}

impl Engine {
    /// Group owning neuron `i`.
    fn group_of(&self, i: u32) -> &GroupConfig {
        let g = self.neurons.grp_ids[i as usize];
        &self.groups[g as usize]
    }

    /// Advance `sim_time` by one ms and run phases 1-6 of `doSnnSim`. §2.
    pub fn step(&mut self) -> Result<()> {
        let t = self.sim_time;

        self.phase1_stp_and_conductance_decay(t);
        self.phase2_external_spike_generation(t)?;
        self.phase3_firing_detection(t)?;
        self.firing.record_markers(t % 1000)?;
        self.phase5_delayed_spike_delivery(t)?;
        self.phase6_neuron_state_update(t)?;

        self.sim_time = t + 1;
        Ok(())
    }

    /// §4.1 — advance STP traces, decay conductances / reset current.
    fn phase1_stp_and_conductance_decay(&mut self, t: u32) {
        for g_idx in 0..self.groups.len() {
            let group = &self.groups[g_idx];
            if group.is_poisson() {
                continue;
            }
            let with_stp = has(group.feature_flags, WITH_STP);
            let tau_u_inv = group.params.stp_tau_u_inv;
            let tau_x_inv = group.params.stp_tau_x_inv;
            let (start, end) = (group.start_id, group.end_id);
            for i in start..end {
                if with_stp {
                    self.stp.decay_u(i, t, tau_u_inv);
                    self.stp.update_x(i, t, tau_x_inv);
                }
                self.neurons.decay_conductances(i, self.mode, &self.decay);
            }
        }
    }

    /// §4.2 — drain the spike buffer's current-step range into the firing
    /// tables, matching the classification rule of §4.3.
    fn phase2_external_spike_generation(&mut self, t: u32) -> Result<()> {
        let entries = self.spike_buffer.drain_at(t);
        for entry in entries {
            let i = entry.neuron_id;
            let has_d1 = self.neurons.has_d1_outgoing[i as usize];
            let has_d2 = self.neurons.has_d2_outgoing[i as usize];
            if has_d1 {
                if self.firing.push_d1(i) {
                    self.spike_count_d1_sec += 1;
                } else {
                    warn!("firing table D1 full at t={t}, dropping external spike for neuron {i}");
                }
            }
            if has_d2 {
                if self.firing.push_d2(i) {
                    self.spike_count_d2_sec += 1;
                } else {
                    warn!("firing table D2 full at t={t}, dropping external spike for neuron {i}");
                }
            }
            self.neurons.last_spike_time[i as usize] = Time::from_millis(t);
            self.spike_count_sec += 1;
            self.n_poisson_spikes += 1;
        }
        Ok(())
    }

    /// §4.3 — integrate-and-detect firing, pre-before-post STDP.
    fn phase3_firing_detection(&mut self, t: u32) -> Result<()> {
        'groups: for g_idx in 0..self.groups.len() {
            if self.firing.spike_buffer_full {
                break 'groups;
            }
            let group = self.groups[g_idx].clone();
            if group.is_poisson() {
                continue;
            }
            for i in group.start_id..group.end_id {
                if self.firing.spike_buffer_full {
                    break 'groups;
                }
                if self.neurons.voltage[i as usize] < crate::neuron::SPIKE_THRESHOLD_MV {
                    continue;
                }

                self.neurons.fire_reset(i);

                let has_d1 = self.neurons.has_d1_outgoing[i as usize];
                let has_d2 = self.neurons.has_d2_outgoing[i as usize];
                if has_d1 {
                    if self.firing.push_d1(i) {
                        self.spike_count_d1_sec += 1;
                    }
                }
                if has_d2 {
                    if self.firing.push_d2(i) {
                        self.spike_count_d2_sec += 1;
                    }
                }
                self.neurons.last_spike_time[i as usize] = Time::from_millis(t);
                self.spike_count_sec += 1;

                if has(group.feature_flags, WITH_STDP) && !self.testing_mode {
                    self.apply_pre_before_post(i, t, &group)?;
                }
            }
        }
        Ok(())
    }

    fn apply_pre_before_post(&mut self, post: u32, t: u32, group: &GroupConfig) -> Result<()> {
        let range = self.synapses.incoming_plastic_range(post);
        for e in range {
            let last = self.synapses.syn_spike_time[e as usize];
            if last == Time::NEVER {
                continue;
            }
            let last_ms = last.as_millis();
            if t <= last_ms {
                return Err(RuntimeError::invariant(format!(
                    "non-positive delta_t against a real past spike on edge {e} at t={t}"
                )));
            }
            let delta_t = (t - last_ms) as f32;

            let excitatory = self.synapses.is_excitatory(e);
            let dw = if excitatory {
                if has(group.feature_flags, WITH_ESTDP) {
                    pre_before_post_excitatory(delta_t, group.stdp_curve, &group.params)
                } else {
                    0.0
                }
            } else if has(group.feature_flags, WITH_ISTDP) {
                pre_before_post_inhibitory(delta_t, group.stdp_curve, &group.params)
            } else {
                0.0
            };
            self.synapses.wt_change[e as usize] += dw;
        }
        Ok(())
    }

    /// §4.4/§4.5 — D2 pass then D1 pass, delivering to every post-synaptic
    /// target.
    fn phase5_delayed_spike_delivery(&mut self, t: u32) -> Result<()> {
        self.deliver_d2(t)?;
        self.deliver_d1(t)?;
        Ok(())
    }

    fn deliver_d2(&mut self, t: u32) -> Result<()> {
        // The firing/time tables are a fixed ring covering one simulated
        // second (`1000 + max_delay + 1` slots); every lookup into them is
        // keyed by time-within-the-second, not the absolute clock, exactly
        // as the STP buffer (`stp.rs`) and dopamine buffer (phase6) already
        // do. `t` itself stays absolute for anything keyed on real elapsed
        // time (passed through to `deliver`).
        let t_ring = t % 1000;
        let max_delay = self.synapses.max_delay;
        // Entries stay live for `max_delay + 1` calls (delta 0..=max_delay)
        // so a connection whose own delay equals the network's max_delay is
        // still reachable on its final eligible step. §4.4.
        let k_end = self.firing.tt2_at(t_ring)?;
        if self.firing.d2.is_empty() {
            return Ok(());
        }
        let mut k = self.firing.d2.len() as i64 - 1;
        // `t_pos` can run negative just past the second boundary: a firing
        // recorded in the previous second, carried forward by `shift()`,
        // is still found at a `t_pos` below the new second's zero. It never
        // needs to go below `-max_delay` since `shift()` only carries the
        // most recent `max_delay` ms forward. Mirrors the original's
        // `t_pos` running negative against `timeTableD2`.
        let mut t_pos: i64 = t_ring as i64;
        while k >= k_end as i64 {
            // Recover the firing time by scanning backward until the window
            // containing slot k is found. §4.4.
            loop {
                if t_pos + (max_delay as i64) < 0 {
                    return Err(RuntimeError::invariant(
                        "D2 backward scan underflowed without finding firing time".to_string(),
                    ));
                }
                let lo = self.firing.tt2_at((t_pos + max_delay as i64) as u32)?;
                let hi = self.firing.tt2_at((t_pos + max_delay as i64 + 1) as u32)?;
                if (lo as i64) <= k && k < hi as i64 {
                    break;
                }
                t_pos -= 1;
            }
            let delta = (t_ring as i64 - t_pos) as u32;
            if delta > max_delay {
                return Err(RuntimeError::invariant(format!(
                    "D2 delivery delta {delta} outside [0, max_delay] at t={t}"
                )));
            }
            // `delta == 0` resolves on the very step the neuron fires —
            // `post_delay_info` index 0 is D1's reserved slot (§4.4), so a
            // pre neuron with both 1 ms and >=2 ms fan-out would otherwise
            // have its 1 ms edges delivered here too, on top of `deliver_d1`
            // already doing so this same step. Skip it; D1 owns delta 0.
            if delta == 0 {
                k -= 1;
                continue;
            }
            let pre = self.firing.d2[k as usize];
            let info = self.synapses.delay_info(pre, delta)?;
            for off in 0..info.length {
                let entry = self.synapses.post_synaptic_ids[(info.start + off) as usize];
                self.deliver(pre, entry, delta, t)?;
            }
            k -= 1;
        }
        Ok(())
    }

    fn deliver_d1(&mut self, t: u32) -> Result<()> {
        if self.firing.d1.is_empty() {
            return Ok(());
        }
        let t_ring = t % 1000;
        let k_end = self.firing.tt1_at(t_ring + self.synapses.max_delay)?;
        let mut k = self.firing.d1.len() as i64 - 1;
        while k >= k_end as i64 {
            let pre = self.firing.d1[k as usize];
            let info = self.synapses.delay_info(pre, 0)?;
            for off in 0..info.length {
                let entry = self.synapses.post_synaptic_ids[(info.start + off) as usize];
                self.deliver(pre, entry, 0, t)?;
            }
            k -= 1;
        }
        Ok(())
    }

    /// §4.5 — deliver one fan-out edge from `pre` at axonal delay `delta`.
    fn deliver(&mut self, pre: u32, entry: PostSynapticEntry, delta: u32, t: u32) -> Result<()> {
        let e = self.synapses.resolve_edge(entry);
        let post = entry.post;
        let mul_idx = self.synapses.conn_ids_pre_idx[e as usize];
        let gain = self.conn_gains[mul_idx as usize];

        let mut change = self.synapses.wt[e as usize];

        let pre_group = self.group_of(pre).clone();
        if has(pre_group.feature_flags, WITH_STP) {
            let u_plus = self.stp.u(pre, t.wrapping_sub(delta));
            let x_minus = self.stp.x(pre, t.wrapping_sub(delta).wrapping_sub(1));
            change *= pre_group.params.stp_a * u_plus * x_minus;
        }

        match self.mode {
            SynapseMode::Coba => {
                let i = post as usize;
                if has(pre_group.type_flags, TARGET_AMPA) {
                    self.neurons.g_ampa[i] += change * gain.mul_syn_fast;
                }
                if has(pre_group.type_flags, TARGET_NMDA) {
                    if self.decay.nmda_rise {
                        self.neurons.g_nmda_r[i] += change * self.decay.s_nmda * gain.mul_syn_slow;
                        self.neurons.g_nmda_d[i] += change * self.decay.s_nmda * gain.mul_syn_slow;
                    } else {
                        self.neurons.g_nmda[i] += change * gain.mul_syn_slow;
                    }
                }
                if has(pre_group.type_flags, TARGET_GABAA) {
                    self.neurons.g_gabaa[i] -= change * gain.mul_syn_fast;
                }
                if has(pre_group.type_flags, TARGET_GABAB) {
                    if self.decay.gabab_rise {
                        self.neurons.g_gabab_r[i] -=
                            change * self.decay.s_gabab * gain.mul_syn_slow;
                        self.neurons.g_gabab_d[i] -=
                            change * self.decay.s_gabab * gain.mul_syn_slow;
                    } else {
                        self.neurons.g_gabab[i] -= change * gain.mul_syn_slow;
                    }
                }
            }
            SynapseMode::Cuba => {
                self.neurons.current[post as usize] += change;
            }
        }

        self.synapses.syn_spike_time[e as usize] = Time::from_millis(t);

        if has(pre_group.type_flags, TARGET_DA) {
            let post_group_id = self.neurons.grp_ids[post as usize];
            self.grp_da[post_group_id as usize] += 0.04;
        }

        let post_group = self.group_of(post).clone();
        if has(post_group.feature_flags, WITH_STDP) && !self.testing_mode {
            self.apply_post_before_pre(e, post, pre_group.type_flags, &post_group, t)?;
        }

        Ok(())
    }

    fn apply_post_before_pre(
        &mut self,
        e: u32,
        post: u32,
        pre_type_flags: u32,
        post_group: &GroupConfig,
        t: u32,
    ) -> Result<()> {
        let last = self.neurons.last_spike_time[post as usize];
        if last == Time::NEVER {
            return Ok(());
        }
        let last_ms = last.as_millis();
        if t < last_ms {
            return Err(RuntimeError::invariant(format!(
                "negative delta_t against a real past spike for post neuron {post} at t={t}"
            )));
        }
        let delta_t = (t - last_ms) as f32;

        let inhibitory_channel = has(pre_type_flags, TARGET_GABAA) || has(pre_type_flags, TARGET_GABAB);
        let excitatory_channel = has(pre_type_flags, TARGET_AMPA) || has(pre_type_flags, TARGET_NMDA);

        let dw = if inhibitory_channel && has(post_group.feature_flags, WITH_ISTDP) {
            post_before_pre_inhibitory(delta_t, post_group.stdp_curve, &post_group.params)
        } else if excitatory_channel && has(post_group.feature_flags, WITH_ESTDP) {
            post_before_pre_excitatory(delta_t, &post_group.params)
        } else {
            0.0
        };
        self.synapses.wt_change[e as usize] += dw;
        Ok(())
    }

    /// §4.6 — integrate neuron dynamics, decay dopamine and homeostasis
    /// traces.
    fn phase6_neuron_state_update(&mut self, t: u32) -> Result<()> {
        let sim_time_ms = t % 1000;
        for g_idx in 0..self.groups.len() {
            let group = self.groups[g_idx].clone();
            let homeostatic = has(group.feature_flags, WITH_HOMEOSTASIS);

            if group.is_poisson() {
                if homeostatic {
                    for i in group.start_id..group.end_id {
                        self.neurons.avg_firing[i as usize] *= group.params.avg_time_scale_decay;
                    }
                }
                continue;
            }

            let is_da_mod = matches!(group.stdp_mode, StdpMode::DaMod);
            if is_da_mod {
                let g = group.id.raw() as usize;
                if self.grp_da[g] > group.params.base_dp {
                    self.grp_da[g] *= group.params.decay_dp;
                }
                self.grp_da_buffer[g][sim_time_ms as usize] = self.grp_da[g];
            }

            for i in group.start_id..group.end_id {
                if homeostatic {
                    self.neurons.avg_firing[i as usize] *= group.params.avg_time_scale_decay;
                }
                match self.mode {
                    SynapseMode::Coba => self.neurons.integrate_coba(i, &self.decay)?,
                    SynapseMode::Cuba => self.neurons.integrate_cuba(i)?,
                }
            }
        }
        Ok(())
    }

    /// §4.7 then §4.8 — called once per simulated second by the caller.
    pub fn shift_tables_and_commit_weights(&mut self) -> Result<()> {
        self.commit_weights()?;
        self.shift_tables()?;
        Ok(())
    }

    fn shift_tables(&mut self) -> Result<()> {
        let max_delay = self.synapses.max_delay;
        self.firing.shift()?;
        // Read after the shift: `shift()` just recomputed `tt2[1..=max_delay]`
        // relative to the new second, mirroring the original's read of
        // `timeTableD2[maxDelay]` after its own rewrite loop.
        let boundary = self.firing.tt2_at(max_delay)?;

        self.spike_count += self.spike_count_sec;
        self.spike_count_d2 += self.spike_count_d2_sec.saturating_sub(boundary as u64);
        self.spike_count_d1 += self.spike_count_d1_sec;
        self.spike_count_d1_sec = 0;
        self.spike_count_sec = 0;
        self.spike_count_d2_sec = boundary as u64;
        Ok(())
    }

    /// §4.8 — apply STDP/DA/homeostasis weight commit to every plastic
    /// edge of every `WITH_STDP`, non-`FIXED_INPUT_WTS` group.
    fn commit_weights(&mut self) -> Result<()> {
        if self.testing_mode {
            return Ok(());
        }
        for g_idx in 0..self.groups.len() {
            let group = self.groups[g_idx].clone();
            if !has(group.feature_flags, WITH_STDP) || has(group.feature_flags, FIXED_INPUT_WTS) {
                continue;
            }
            let homeostatic = has(group.feature_flags, WITH_HOMEOSTASIS);
            let h_scale = if homeostatic { group.params.homeostasis_scale } else { 1.0 };
            let da_mod = matches!(group.stdp_mode, StdpMode::DaMod);
            let grp_da = self.grp_da[group.id.raw() as usize];

            for i in group.start_id..group.end_id {
                let avg_firing = self.neurons.avg_firing[i as usize];
                let base_firing = self.neurons.base_firing[i as usize];
                let diff = if homeostatic && base_firing > 0.0 {
                    1.0 - avg_firing / base_firing
                } else {
                    0.0
                };

                let range = self.synapses.incoming_plastic_range(i);
                if log::log_enabled!(log::Level::Debug) && range.start < range.end {
                    debug!(
                        "weight commit t={}: group {} neuron {} diff_firing={diff}",
                        self.sim_time, group.id, i
                    );
                }

                for e in range {
                    let wt = self.synapses.wt[e as usize];
                    let wt_change = self.synapses.wt_change[e as usize];
                    let eff = self.stdp_scale_factor * wt_change;

                    let delta = match (da_mod, homeostatic) {
                        (false, true) => {
                            (diff * wt * h_scale + wt_change) * base_firing
                                / group.params.avg_time_scale
                                / (1.0 + 50.0 * diff.abs())
                        }
                        (false, false) => eff,
                        (true, true) => {
                            (diff * wt * h_scale + grp_da * eff) * base_firing
                                / group.params.avg_time_scale
                                / (1.0 + 50.0 * diff.abs())
                        }
                        (true, false) => grp_da * eff,
                    };

                    self.synapses.wt[e as usize] += delta;
                    self.synapses.wt_change[e as usize] *= self.wt_change_decay;
                    self.synapses.clamp_weight(e);
                }
            }
        }
        Ok(())
    }

    /// §6 `schedule_spike(neurId, relativeMs)`.
    pub fn schedule_spike(&mut self, neuron_id: u32, relative_ms: u32) {
        let group_id = self.neurons.grp_ids[neuron_id as usize];
        self.spike_buffer
            .schedule(neuron_id, group_id, self.sim_time + relative_ms);
    }

    /// §6 `inject_current(neurId, amps)`.
    pub fn inject_current(&mut self, neuron_id: u32, amps: f32) {
        self.neurons.ext_current[neuron_id as usize] = amps;
    }

    /// Cumulative count of spikes that entered via the external/Poisson
    /// intake path, distinct from `spike_count` (firing-detection spikes).
    pub fn poisson_spike_count(&self) -> u64 {
        self.n_poisson_spikes
    }

    /// Read-only dopamine sample trace for `group`, one value per ms of
    /// the current second.
    pub fn dopamine_trace(&self, group: &GroupConfig) -> &[f32] {
        &self.grp_da_buffer[group.id.raw() as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{GroupParams, StdpCurve};
    use crate::synapse::DelayInfo;
    use snn_types::GroupId;

    fn two_neuron_engine(delay: u32, with_stdp: bool) -> Engine {
        let neurons = NeuronTable::with_capacity(2);
        let max_delay = delay.max(1);
        let mut synapses = SynapseTable {
            wt: vec![10.0],
            max_syn_wt: vec![20.0],
            wt_change: vec![0.0],
            syn_spike_time: vec![Time::NEVER],
            conn_ids_pre_idx: vec![0],
            cumulative_pre: vec![0, 0],
            n_pre: vec![0, 1],
            n_pre_plastic: vec![0, if with_stdp { 1 } else { 0 }],
            cumulative_post: vec![0, 0],
            post_synaptic_ids: vec![PostSynapticEntry { post: 1, slot: 0 }],
            post_delay_info: vec![DelayInfo::default(); 2 * (max_delay as usize + 1)],
            max_delay,
        };
        let idx = 0 * (max_delay as usize + 1) + delay as usize;
        synapses.post_delay_info[idx] = DelayInfo { start: 0, length: 1 };

        let mut feature_flags = 0;
        if with_stdp {
            feature_flags |= WITH_STDP | WITH_ESTDP;
        }

        let groups = vec![GroupConfig {
            id: GroupId::new(0),
            start_id: 0,
            end_id: 2,
            type_flags: TARGET_AMPA,
            feature_flags,
            stdp_mode: StdpMode::Standard,
            stdp_curve: StdpCurve::Exp,
            params: GroupParams::default(),
            base_firing: 5.0,
        }];

        let mut neurons = neurons;
        neurons.grp_ids = vec![0, 0];
        neurons.has_d1_outgoing = vec![delay == 0, false];
        neurons.has_d2_outgoing = vec![delay != 0, false];

        Engine {
            neurons,
            synapses,
            groups,
            conn_gains: vec![SynapticGain { mul_syn_fast: 1.0, mul_syn_slow: 1.0 }],
            stp: StpBuffer::new(2, max_delay),
            firing: FiringTable::new(max_delay, 64),
            spike_buffer: SpikeBuffer::new(),
            decay: ConductanceDecay::default(),
            mode: SynapseMode::Coba,
            sim_time: 0,
            grp_da: vec![0.0],
            grp_da_buffer: vec![vec![0.0; DA_BUFFER_LEN]],
            spike_count_sec: 0,
            spike_count_d1_sec: 0,
            spike_count_d2_sec: 0,
            spike_count: 0,
            spike_count_d1: 0,
            spike_count_d2: 0,
            n_poisson_spikes: 0,
            stdp_scale_factor: 1.0,
            wt_change_decay: 0.9,
            testing_mode: false,
        }
    }

    #[test]
    fn s1_single_delay_one_ampa_connection() {
        let mut engine = two_neuron_engine(0, false);
        for t in 0..10 {
            engine.sim_time = t;
            engine.neurons.ext_current[0] = 20.0;
            engine.step().unwrap();
        }
        // pre should have fired by t=10 given strong constant drive
        assert!(engine.neurons.last_spike_time[0] != Time::NEVER);
    }

    /// S1 — a forced firing on a delay-1 (D1) AMPA edge delivers within the
    /// same internal step, observable once `sim_time` has advanced past it,
    /// and the bump decays geometrically afterward.
    #[test]
    fn s1_ampa_delivery_bumps_and_decays() {
        let mut engine = two_neuron_engine(0, false);
        engine.sim_time = 10;
        engine.neurons.voltage[0] = 35.0;
        engine.step().unwrap();

        assert_eq!(engine.sim_time, 11);
        assert_eq!(engine.neurons.g_ampa[1], 10.0);
        assert_eq!(engine.synapses.syn_spike_time[0], Time::from_millis(10));
        assert_eq!(engine.neurons.last_spike_time[0], Time::from_millis(10));

        let before = engine.neurons.g_ampa[1];
        engine.step().unwrap();
        let expected = before * engine.decay.d_ampa;
        assert!((engine.neurons.g_ampa[1] - expected).abs() < 1e-4);
    }

    /// S2 — a delay-3 fan-out delivers to both post-synaptic targets
    /// exactly 3 ms after firing, and not one step early or late.
    #[test]
    fn s2_delay_three_fanout_timing() {
        use crate::network::{ConnectionSpec, NetworkBuilder};

        let group = GroupConfig {
            id: GroupId::new(0),
            start_id: 0,
            end_id: 3,
            type_flags: TARGET_AMPA,
            feature_flags: 0,
            stdp_mode: StdpMode::Standard,
            stdp_curve: StdpCurve::Exp,
            params: GroupParams::default(),
            base_firing: 5.0,
        };
        let mut engine = NetworkBuilder::new()
            .add_group(group)
            .add_connection(ConnectionSpec {
                pre: 0,
                post: 1,
                weight: 5.0,
                max_weight: 10.0,
                delay: 3,
                plastic: false,
                conn_group: 0,
            })
            .add_connection(ConnectionSpec {
                pre: 0,
                post: 2,
                weight: 5.0,
                max_weight: 10.0,
                delay: 3,
                plastic: false,
                conn_group: 0,
            })
            .build()
            .unwrap();

        engine.sim_time = 50;
        engine.neurons.voltage[0] = 35.0;

        for _ in 0..2 {
            engine.step().unwrap();
            assert_eq!(engine.neurons.g_ampa[1], 0.0);
            assert_eq!(engine.neurons.g_ampa[2], 0.0);
        }
        // t=51 and t=52 are delta 1 and 2, both no-ops for this neuron;
        // t=53 is delta 3, where the fan-out actually lives.
        engine.step().unwrap();
        assert_eq!(engine.neurons.g_ampa[1], 5.0);
        assert_eq!(engine.neurons.g_ampa[2], 5.0);
    }

    /// S2b — a neuron with both a 1 ms (D1) and a 3 ms (D2) outgoing edge
    /// delivers each exactly once: `deliver_d2`'s delta-0 slot must not
    /// re-deliver the D1 edge `deliver_d1` already handled this step.
    #[test]
    fn s2b_mixed_d1_d2_fanout_delivers_each_edge_once() {
        use crate::network::{ConnectionSpec, NetworkBuilder};

        let group = GroupConfig {
            id: GroupId::new(0),
            start_id: 0,
            end_id: 3,
            type_flags: TARGET_AMPA,
            feature_flags: 0,
            stdp_mode: StdpMode::Standard,
            stdp_curve: StdpCurve::Exp,
            params: GroupParams::default(),
            base_firing: 5.0,
        };
        let mut engine = NetworkBuilder::new()
            .add_group(group)
            .add_connection(ConnectionSpec {
                pre: 0,
                post: 1,
                weight: 5.0,
                max_weight: 10.0,
                delay: 1,
                plastic: false,
                conn_group: 0,
            })
            .add_connection(ConnectionSpec {
                pre: 0,
                post: 2,
                weight: 5.0,
                max_weight: 10.0,
                delay: 3,
                plastic: false,
                conn_group: 0,
            })
            .build()
            .unwrap();

        assert!(engine.neurons.has_d1_outgoing[0]);
        assert!(engine.neurons.has_d2_outgoing[0]);

        engine.sim_time = 50;
        engine.neurons.voltage[0] = 35.0;

        for _ in 0..4 {
            engine.step().unwrap();
        }
        assert_eq!(engine.neurons.g_ampa[1], 5.0);
        assert_eq!(engine.neurons.g_ampa[2], 5.0);
    }

    /// S6 — D2 firings recorded right at the 999/1000 second boundary
    /// remain deliverable after `shift_tables_and_commit_weights` rolls the
    /// window over, since they are still within `max_delay` of the new
    /// second's start.
    #[test]
    fn s6_per_second_shift_preserves_recent_d2_firings() {
        let max_delay = 3;
        let mut ft = FiringTable::new(max_delay, 64);
        for t in 997..1000 {
            ft.push_d2(t);
            ft.record_markers(t).unwrap();
        }
        let before_shift_len = ft.d2.len();
        assert!(before_shift_len >= 3);

        ft.shift().unwrap();

        // entries fired at 998 and 999 are within max_delay=3 of the new
        // second's t=0 and must have survived the shift.
        assert!(ft.d2.contains(&998));
        assert!(ft.d2.contains(&999));
    }

    /// S7 — a delay-3 D2 firing just before the 999/1000 second boundary
    /// is still delivered at the right absolute ms once `sim_time` has
    /// wrapped past 1000 and `shift_tables_and_commit_weights` has rolled
    /// the ring over. Exercises the `t % 1000` firing-table indexing past
    /// its first simulated second, since every other scenario here stays
    /// under `t = 1000` and would pass even with unreduced absolute time.
    #[test]
    fn s7_step_crosses_second_boundary_without_error() {
        use crate::network::{ConnectionSpec, NetworkBuilder};

        let group = GroupConfig {
            id: GroupId::new(0),
            start_id: 0,
            end_id: 2,
            type_flags: TARGET_AMPA,
            feature_flags: 0,
            stdp_mode: StdpMode::Standard,
            stdp_curve: StdpCurve::Exp,
            params: GroupParams::default(),
            base_firing: 5.0,
        };
        let mut engine = NetworkBuilder::new()
            .add_group(group)
            .add_connection(ConnectionSpec {
                pre: 0,
                post: 1,
                weight: 5.0,
                max_weight: 10.0,
                delay: 3,
                plastic: false,
                conn_group: 0,
            })
            .build()
            .unwrap();

        engine.sim_time = 998;
        engine.neurons.voltage[0] = 35.0;

        // t=998 fires; t=999 steps into the shift; t=1000..1002 (ring 0..2)
        // are delta 2, then delta-1-equivalent no-ops; t=1001 (ring 1) is
        // the actual delta-3 delivery.
        for _ in 0..4 {
            engine.step().unwrap();
            if engine.sim_time % 1000 == 0 {
                engine.shift_tables_and_commit_weights().unwrap();
            }
        }
        assert_eq!(engine.sim_time, 1002);
        assert_eq!(engine.neurons.g_ampa[1], 5.0);
    }

    #[test]
    fn schedule_spike_uses_relative_offset() {
        let mut engine = two_neuron_engine(0, false);
        engine.sim_time = 5;
        engine.schedule_spike(0, 3);
        assert!(!engine.spike_buffer.drain_at(8).is_empty());
    }

    #[test]
    fn inject_current_sets_ext_current() {
        let mut engine = two_neuron_engine(0, false);
        engine.inject_current(1, 12.5);
        assert_eq!(engine.neurons.ext_current[1], 12.5);
    }

    #[test]
    fn testing_mode_skips_weight_commit() {
        let mut engine = two_neuron_engine(0, true);
        engine.testing_mode = true;
        engine.synapses.wt_change[0] = 5.0;
        let before = engine.synapses.wt[0];
        engine.commit_weights().unwrap();
        assert_eq!(engine.synapses.wt[0], before);
    }
}

