//! Short-term plasticity: per-neuron ring buffer of facilitation (`u`) and
//! depression (`x`) traces, keyed on delay offset. §4.1, §4.5 step 4, §9.

/// `STP_BUF_POS(i, t, max_delay) = i * (max_delay + 1) + (t mod (max_delay + 1))`.
///
/// The buffer is a 2-D array with the ring dimension in time: each neuron
/// owns `max_delay + 1` slots so that both the current step's fresh trace
/// and every delayed delivery that still needs an older trace remain
/// addressable.
pub const fn buf_pos(neuron: u32, t: u32, max_delay: u32) -> usize {
    neuron as usize * (max_delay as usize + 1) + (t as usize % (max_delay as usize + 1))
}

/// Facilitation/depression trace ring buffers for every neuron in a
/// `WITH_STP` group.
#[derive(Debug, Clone)]
pub struct StpBuffer {
    /// Facilitation trace, `stpu[buf_pos(i, t, max_delay)]`.
    pub stpu: Vec<f32>,
    /// Depression trace, `stpx[buf_pos(i, t, max_delay)]`.
    pub stpx: Vec<f32>,
    /// Ring depth shared by every neuron (`max_delay + 1`).
    pub max_delay: u32,
}

impl StpBuffer {
    /// Allocate a buffer for `num_neurons` neurons, every ring slot
    /// initialized to `u = 1`, `x = 1` (fully available, unfacilitated),
    /// matching the invariant that STP traces start and stay in `(0, 1]`.
    pub fn new(num_neurons: usize, max_delay: u32) -> Self {
        let len = num_neurons * (max_delay as usize + 1);
        Self {
            stpu: vec![1.0; len],
            stpx: vec![1.0; len],
            max_delay,
        }
    }

    /// Read the facilitation trace at `(neuron, t)`.
    pub fn u(&self, neuron: u32, t: u32) -> f32 {
        self.stpu[buf_pos(neuron, t, self.max_delay)]
    }

    /// Read the depression trace at `(neuron, t)`.
    pub fn x(&self, neuron: u32, t: u32) -> f32 {
        self.stpx[buf_pos(neuron, t, self.max_delay)]
    }

    /// Advance neuron `i`'s STP traces by one ms, landing the new values in
    /// slot `t mod (max_delay + 1)`. §4.1: `u` is updated first; delivery
    /// for this step reads the fresh `u⁺` alongside the *previous* slot's
    /// `x⁻`, so `x` must not be overwritten until after deliveries read it.
    /// Splitting into `decay_u`/`update_x` lets the engine interleave a
    /// delivery phase between the two exactly as the spec requires.
    pub fn decay_u(&mut self, neuron: u32, t: u32, tau_u_inv: f32) {
        let prev = buf_pos(neuron, t.wrapping_sub(1), self.max_delay);
        let cur = buf_pos(neuron, t, self.max_delay);
        let u_prev = self.stpu[prev];
        self.stpu[cur] = u_prev * (1.0 - tau_u_inv);
    }

    /// Advance neuron `i`'s depression trace into the current slot.
    pub fn update_x(&mut self, neuron: u32, t: u32, tau_x_inv: f32) {
        let prev = buf_pos(neuron, t.wrapping_sub(1), self.max_delay);
        let cur = buf_pos(neuron, t, self.max_delay);
        let x_prev = self.stpx[prev];
        self.stpx[cur] = x_prev + (1.0 - x_prev) * tau_x_inv;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buf_pos_wraps_with_max_delay() {
        assert_eq!(buf_pos(0, 0, 3), 0);
        assert_eq!(buf_pos(0, 4, 3), 0);
        assert_eq!(buf_pos(1, 4, 3), 4);
    }

    #[test]
    fn traces_start_in_unit_interval() {
        let buf = StpBuffer::new(2, 3);
        assert!(buf.u(0, 0) > 0.0 && buf.u(0, 0) <= 1.0);
        assert!(buf.x(1, 2) > 0.0 && buf.x(1, 2) <= 1.0);
    }

    #[test]
    fn decay_u_reduces_facilitation() {
        let mut buf = StpBuffer::new(1, 3);
        buf.decay_u(0, 1, 0.05);
        assert!(buf.u(0, 1) < 1.0);
    }

    #[test]
    fn update_x_recovers_toward_one() {
        let mut buf = StpBuffer::new(1, 3);
        buf.stpx[buf_pos(0, 0, 3)] = 0.2;
        buf.update_x(0, 1, 0.1);
        let x1 = buf.x(0, 1);
        assert!(x1 > 0.2 && x1 <= 1.0);
    }
}
