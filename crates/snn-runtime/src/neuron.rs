//! Per-neuron regular-state arrays: Izhikevich dynamics, conductances,
//! currents, spike history and homeostasis traces, indexed by global
//! neuron id.

use snn_types::Time;

use crate::error::{Result, RuntimeError};
use crate::group::ConductanceDecay;

/// Synaptic integration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynapseMode {
    /// Conductance-based: voltage-dependent driving force per channel.
    Coba,
    /// Current-based: conductances collapse to a scalar input current.
    Cuba,
}

/// Number of Euler sub-steps taken per ms in COBA mode (spec: sub-step of
/// 0.5 ms).
pub const COND_INTEGRATION_SCALE: u32 = 2;

/// Fixed Izhikevich spike threshold, millivolts.
pub const SPIKE_THRESHOLD_MV: f32 = 30.0;
/// Hard floor clamp on membrane voltage, millivolts.
pub const VOLTAGE_FLOOR_MV: f32 = -90.0;

/// Struct-of-arrays neuron state for the whole network, indexed by global
/// neuron id `i ∈ [0, N)`.
#[derive(Debug, Clone)]
pub struct NeuronTable {
    /// Membrane potential.
    pub voltage: Vec<f32>,
    /// Recovery variable.
    pub recovery: Vec<f32>,
    /// Izhikevich `a` parameter (recovery time scale).
    pub izh_a: Vec<f32>,
    /// Izhikevich `b` parameter (recovery sensitivity to sub-threshold v).
    pub izh_b: Vec<f32>,
    /// Izhikevich `c` parameter (post-spike reset voltage).
    pub izh_c: Vec<f32>,
    /// Izhikevich `d` parameter (post-spike recovery bump).
    pub izh_d: Vec<f32>,

    /// Fast excitatory conductance.
    pub g_ampa: Vec<f32>,
    /// Fast inhibitory conductance.
    pub g_gabaa: Vec<f32>,
    /// Slow excitatory conductance, no-rise model.
    pub g_nmda: Vec<f32>,
    /// NMDA rise component, used only when the rise model is enabled.
    pub g_nmda_r: Vec<f32>,
    /// NMDA decay component, used only when the rise model is enabled.
    pub g_nmda_d: Vec<f32>,
    /// Slow inhibitory conductance, no-rise model.
    pub g_gabab: Vec<f32>,
    /// GABAb rise component, used only when the rise model is enabled.
    pub g_gabab_r: Vec<f32>,
    /// GABAb decay component, used only when the rise model is enabled.
    pub g_gabab_d: Vec<f32>,

    /// Input current accumulator: authoritative in CUBA mode, a
    /// monitoring by-product in COBA mode.
    pub current: Vec<f32>,
    /// Externally injected current (`inject_current`).
    pub ext_current: Vec<f32>,

    /// Timestamp of the neuron's most recent firing; `Time::NEVER` before
    /// any spike.
    pub last_spike_time: Vec<Time>,
    /// Exponentially averaged firing rate, used for homeostasis.
    pub avg_firing: Vec<f32>,
    /// Homeostatic target rate.
    pub base_firing: Vec<f32>,

    /// Group each neuron belongs to.
    pub grp_ids: Vec<u32>,

    /// Whether neuron `i` has at least one outgoing edge with exactly 1 ms
    /// delay (computed once at network build).
    pub has_d1_outgoing: Vec<bool>,
    /// Whether neuron `i` has at least one outgoing edge with ≥2 ms delay
    /// (computed once at network build).
    pub has_d2_outgoing: Vec<bool>,
}

impl NeuronTable {
    /// Number of neurons.
    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    /// Whether the table holds no neurons.
    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Allocate a table of `n` neurons, all fields zeroed and
    /// `last_spike_time` set to `Time::NEVER`.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            voltage: vec![-65.0; n],
            recovery: vec![-13.0; n],
            izh_a: vec![0.02; n],
            izh_b: vec![0.2; n],
            izh_c: vec![-65.0; n],
            izh_d: vec![8.0; n],
            g_ampa: vec![0.0; n],
            g_gabaa: vec![0.0; n],
            g_nmda: vec![0.0; n],
            g_nmda_r: vec![0.0; n],
            g_nmda_d: vec![0.0; n],
            g_gabab: vec![0.0; n],
            g_gabab_r: vec![0.0; n],
            g_gabab_d: vec![0.0; n],
            current: vec![0.0; n],
            ext_current: vec![0.0; n],
            last_spike_time: vec![Time::NEVER; n],
            avg_firing: vec![0.0; n],
            base_firing: vec![0.0; n],
            grp_ids: vec![0; n],
            has_d1_outgoing: vec![false; n],
            has_d2_outgoing: vec![false; n],
        }
    }

    /// Reset neuron `i` to its Izhikevich `c`/`d` post-spike state. Used by
    /// the firing-detection reset.
    pub fn fire_reset(&mut self, i: u32) {
        let i = i as usize;
        self.voltage[i] = self.izh_c[i];
        self.recovery[i] += self.izh_d[i];
    }

    /// Multiplicatively decay this neuron's enabled conductance channels
    /// by one ms, or reset `current` in CUBA mode. §4.1.
    pub fn decay_conductances(&mut self, i: u32, mode: SynapseMode, decay: &ConductanceDecay) {
        let i = i as usize;
        match mode {
            SynapseMode::Cuba => {
                self.current[i] = 0.0;
            }
            SynapseMode::Coba => {
                self.g_ampa[i] *= decay.d_ampa;
                self.g_gabaa[i] *= decay.d_gabaa;
                if decay.nmda_rise {
                    self.g_nmda_r[i] *= decay.r_nmda;
                    self.g_nmda_d[i] *= decay.d_nmda;
                } else {
                    self.g_nmda[i] *= decay.d_nmda;
                }
                if decay.gabab_rise {
                    self.g_gabab_r[i] *= decay.r_gabab;
                    self.g_gabab_d[i] *= decay.d_gabab;
                } else {
                    self.g_gabab[i] *= decay.d_gabab;
                }
            }
        }
    }

    /// One ms of COBA integration, in `COND_INTEGRATION_SCALE` Euler
    /// sub-steps. §4.6.
    pub fn integrate_coba(&mut self, i: u32, decay: &ConductanceDecay) -> Result<()> {
        let i = i as usize;
        let sub_dt = 1.0 / COND_INTEGRATION_SCALE as f32;
        self.current[i] = 0.0;
        for _ in 0..COND_INTEGRATION_SCALE {
            let v = self.voltage[i];
            let u = self.recovery[i];

            let mg = ((v + 80.0) / 60.0).powi(2);
            let nmda_gate = mg / (1.0 + mg);

            let g_nmda_eff = if decay.nmda_rise {
                self.g_nmda_d[i] - self.g_nmda_r[i]
            } else {
                self.g_nmda[i]
            };
            let g_gabab_eff = if decay.gabab_rise {
                self.g_gabab_d[i] - self.g_gabab_r[i]
            } else {
                self.g_gabab[i]
            };

            let current = -(self.g_ampa[i] * v
                + g_nmda_eff * nmda_gate * v
                + self.g_gabaa[i] * (v + 70.0)
                + g_gabab_eff * (v + 90.0));

            let mut v_next =
                v + ((0.04 * v + 5.0) * v + 140.0 - u + current + self.ext_current[i]) * sub_dt;

            self.current[i] += current;

            if v_next > SPIKE_THRESHOLD_MV {
                v_next = SPIKE_THRESHOLD_MV;
                self.voltage[i] = v_next;
                break;
            }
            if v_next < VOLTAGE_FLOOR_MV {
                v_next = VOLTAGE_FLOOR_MV;
            }
            self.voltage[i] = v_next;

            if !v_next.is_finite() {
                return Err(RuntimeError::invariant(format!(
                    "non-finite voltage on neuron {i} during COBA integration"
                )));
            }

            self.recovery[i] += self.izh_a[i] * (self.izh_b[i] * v_next - u) * sub_dt;
        }
        Ok(())
    }

    /// One ms of CUBA integration, two half-step Euler updates. §4.6.
    pub fn integrate_cuba(&mut self, i: u32) -> Result<()> {
        let i = i as usize;
        let input = self.current[i] + self.ext_current[i];
        for _ in 0..2 {
            let v = self.voltage[i];
            let u = self.recovery[i];
            let mut v_next = v + 0.5 * ((0.04 * v + 5.0) * v + 140.0 - u + input);
            v_next = v_next.clamp(VOLTAGE_FLOOR_MV, SPIKE_THRESHOLD_MV);
            self.voltage[i] = v_next;
            if !v_next.is_finite() {
                return Err(RuntimeError::invariant(format!(
                    "non-finite voltage on neuron {i} during CUBA integration"
                )));
            }
            self.recovery[i] += self.izh_a[i] * (self.izh_b[i] * v_next - u);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_reset_applies_c_and_d() {
        let mut t = NeuronTable::with_capacity(1);
        t.voltage[0] = 35.0;
        t.recovery[0] = 2.0;
        t.izh_c[0] = -65.0;
        t.izh_d[0] = 8.0;
        t.fire_reset(0);
        assert_eq!(t.voltage[0], -65.0);
        assert_eq!(t.recovery[0], 10.0);
    }

    #[test]
    fn cuba_decay_resets_current() {
        let mut t = NeuronTable::with_capacity(1);
        t.current[0] = 5.0;
        t.decay_conductances(0, SynapseMode::Cuba, &ConductanceDecay::default());
        assert_eq!(t.current[0], 0.0);
    }

    #[test]
    fn coba_decay_multiplies_conductances() {
        let mut t = NeuronTable::with_capacity(1);
        t.g_ampa[0] = 1.0;
        let decay = ConductanceDecay::default();
        t.decay_conductances(0, SynapseMode::Coba, &decay);
        assert_eq!(t.g_ampa[0], decay.d_ampa);
    }

    #[test]
    fn coba_integration_stays_finite_at_rest() {
        let mut t = NeuronTable::with_capacity(1);
        let decay = ConductanceDecay::default();
        for _ in 0..50 {
            t.integrate_coba(0, &decay).unwrap();
        }
        assert!(t.voltage[0].is_finite());
    }

    #[test]
    fn cuba_integration_clamps_floor() {
        let mut t = NeuronTable::with_capacity(1);
        t.voltage[0] = -65.0;
        t.current[0] = -10_000.0;
        t.integrate_cuba(0).unwrap();
        assert_eq!(t.voltage[0], VOLTAGE_FLOOR_MV);
    }
}
