//! Spike-timing-dependent plasticity: the shared exponential kernel and
//! the pre-before-post (§4.3 step 4) / post-before-pre (§4.5 step 8)
//! weight-change accumulation rules.

use crate::group::{GroupParams, StdpCurve};

/// Cutoff beyond which an exponential STDP contribution is indistinguishable
/// from zero in `f32` and is skipped (`exp(-25) ≈ 1.4e-11`).
pub const STDP_CUTOFF: f32 = 25.0;

/// The original's `STDP(tDiff, alpha, tauInv)` helper: an exponentially
/// decaying contribution with amplitude `alpha` and inverse time constant
/// `tau_inv`. Both the pre-before-post and post-before-pre paths call this
/// with the same shape, so it is lifted into one shared function.
pub fn stdp_kernel(delta_t: f32, alpha: f32, tau_inv: f32) -> f32 {
    alpha * (-delta_t * tau_inv).exp()
}

/// Accumulate the pre-before-post contribution for one plastic excitatory
/// edge, given `delta_t = t - syn_spike_time[e] > 0`. §4.3 step 4,
/// excitatory branch.
pub fn pre_before_post_excitatory(delta_t: f32, curve: StdpCurve, p: &GroupParams) -> f32 {
    match curve {
        StdpCurve::Exp => {
            if delta_t * p.tau_plus_inv_exc < STDP_CUTOFF {
                stdp_kernel(delta_t, p.alpha_plus_exc, p.tau_plus_inv_exc)
            } else {
                0.0
            }
        }
        StdpCurve::TimingBased => {
            if delta_t * p.tau_plus_inv_exc < STDP_CUTOFF {
                if delta_t <= p.gamma {
                    p.omega + p.kappa * stdp_kernel(delta_t, p.alpha_plus_exc, p.tau_plus_inv_exc)
                } else {
                    -stdp_kernel(delta_t, p.alpha_plus_exc, p.tau_plus_inv_exc)
                }
            } else {
                0.0
            }
        }
        StdpCurve::Pulse => 0.0,
    }
}

/// Accumulate the pre-before-post contribution for one plastic inhibitory
/// edge. §4.3 step 4, inhibitory branch.
pub fn pre_before_post_inhibitory(delta_t: f32, curve: StdpCurve, p: &GroupParams) -> f32 {
    match curve {
        StdpCurve::Exp => {
            if delta_t * p.tau_plus_inv_inb < STDP_CUTOFF {
                -stdp_kernel(delta_t, p.alpha_plus_inb, p.tau_plus_inv_inb)
            } else {
                0.0
            }
        }
        StdpCurve::Pulse => {
            if delta_t <= p.lambda {
                -p.beta_ltp
            } else if delta_t <= p.delta {
                -p.beta_ltd
            } else {
                0.0
            }
        }
        StdpCurve::TimingBased => 0.0,
    }
}

/// Accumulate the post-before-pre contribution for an edge whose
/// pre-synaptic channel is excitatory (AMPA/NMDA target), given
/// `delta_t = t - last_spike_time[post] >= 0`. §4.5 step 8, excitatory
/// branch — both `Exp` and `TimingBased` use the same formula here.
pub fn post_before_pre_excitatory(delta_t: f32, p: &GroupParams) -> f32 {
    if delta_t * p.tau_minus_inv_exc < STDP_CUTOFF {
        stdp_kernel(delta_t, p.alpha_minus_exc, p.tau_minus_inv_exc)
    } else {
        0.0
    }
}

/// Accumulate the post-before-pre contribution for an edge whose
/// pre-synaptic channel is inhibitory (GABAa/GABAb target). §4.5 step 8,
/// inhibitory branch.
pub fn post_before_pre_inhibitory(delta_t: f32, curve: StdpCurve, p: &GroupParams) -> f32 {
    match curve {
        StdpCurve::Exp | StdpCurve::TimingBased => {
            if delta_t * p.tau_minus_inv_inb < STDP_CUTOFF {
                -stdp_kernel(delta_t, p.alpha_minus_inb, p.tau_minus_inv_inb)
            } else {
                0.0
            }
        }
        StdpCurve::Pulse => {
            if delta_t <= p.lambda {
                -p.beta_ltp
            } else if delta_t <= p.delta {
                -p.beta_ltd
            } else {
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_matches_scenario_s3() {
        let p = GroupParams {
            tau_plus_inv_exc: 0.05,
            alpha_plus_exc: 0.1,
            ..GroupParams::default()
        };
        let dw = pre_before_post_excitatory(10.0, StdpCurve::Exp, &p);
        assert!((dw - 0.1 * (-0.5_f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn kernel_matches_scenario_s4() {
        let p = GroupParams::default();
        let dw = post_before_pre_excitatory(8.0, &p);
        let expected = p.alpha_minus_exc * (-8.0 * p.tau_minus_inv_exc).exp();
        assert!((dw - expected).abs() < 1e-6);
    }

    #[test]
    fn pulse_curve_matches_scenario_s5() {
        let p = GroupParams {
            lambda: 5.0,
            delta: 20.0,
            beta_ltp: 0.02,
            beta_ltd: 0.01,
            ..GroupParams::default()
        };
        assert_eq!(pre_before_post_inhibitory(4.0, StdpCurve::Pulse, &p), -0.02);
        assert_eq!(pre_before_post_inhibitory(10.0, StdpCurve::Pulse, &p), -0.01);
        assert_eq!(pre_before_post_inhibitory(25.0, StdpCurve::Pulse, &p), 0.0);
    }

    #[test]
    fn cutoff_suppresses_far_contributions() {
        let p = GroupParams::default();
        let dw = pre_before_post_excitatory(10_000.0, StdpCurve::Exp, &p);
        assert_eq!(dw, 0.0);
    }
}
