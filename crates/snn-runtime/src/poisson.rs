//! Rate-based and callback-based external spike generation. §4.2, §6.

use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::error::{Result, RuntimeError};
use crate::spike_buffer::SpikeBuffer;

/// A Poisson rate source: one firing rate (Hz) per neuron in a group.
#[derive(Debug, Clone)]
pub struct PoissonSource {
    /// Firing rate in Hz, one entry per neuron in the owning group.
    pub rate_hz: Vec<f32>,
    /// Hard refractory floor in ms: no two scheduled spikes for the same
    /// neuron may be closer together than this.
    pub refractory_ms: u32,
}

impl PoissonSource {
    /// Validate the rate source against the group it will drive: the rate
    /// array length must match the group's neuron count exactly. §6 fatal
    /// condition: "rate array size mismatch with group size".
    pub fn validate(&self, group_size: usize) -> Result<()> {
        if self.rate_hz.len() != group_size {
            return Err(RuntimeError::config(format!(
                "poisson rate array length {} does not match group size {group_size}",
                self.rate_hz.len()
            )));
        }
        Ok(())
    }

    /// Schedule arrivals for every neuron in `[start_id, start_id +
    /// rate_hz.len())` across the window `[current_time, end_of_window)`,
    /// via inverse-CDF exponential sampling with a refractory floor. §4.2:
    /// "draw inter-spike intervals from an exponential with mean
    /// `1/rate[i]`... scheduling arrivals... at relative offsets `[0,
    /// timeSlice)`, rejecting offsets < current time and >= end of window."
    pub fn generate<R: Rng>(
        &self,
        start_id: u32,
        group_id: u32,
        current_time: u32,
        end_of_window: u32,
        rng: &mut R,
        buffer: &mut SpikeBuffer,
    ) -> Result<u32> {
        self.validate(self.rate_hz.len())?;
        let mut scheduled = 0;
        for (local_id, &rate) in self.rate_hz.iter().enumerate() {
            if rate <= 0.0 {
                continue;
            }
            let neuron_id = start_id + local_id as u32;
            let mean_isi_ms = 1000.0 / rate as f64;
            let exp = Exp::new(1.0 / mean_isi_ms).map_err(|e| {
                RuntimeError::config(format!("invalid poisson rate {rate}: {e}"))
            })?;

            let mut t = current_time as f64;
            let mut last_scheduled = current_time.saturating_sub(1);
            loop {
                let isi = exp.sample(rng).max(self.refractory_ms as f64);
                t += isi;
                let candidate = t.round() as u32;
                if candidate >= end_of_window {
                    break;
                }
                if candidate < current_time {
                    continue;
                }
                if SpikeBuffer::accept_time(candidate, last_scheduled, current_time, end_of_window)
                {
                    buffer.schedule(neuron_id, group_id, candidate);
                    last_scheduled = candidate;
                    scheduled += 1;
                }
            }
        }
        Ok(scheduled)
    }
}

/// User-supplied callback spike source. §6: `nextSpikeTime(groupId,
/// localNeurId, currTime, lastScheduled, endOfWindow) -> int`.
pub trait SpikeGeneratorCallback {
    /// Return the next spike time for `(group_id, local_neuron_id)`, or any
    /// value that fails [`SpikeBuffer::accept_time`] to signal "no more
    /// spikes this window".
    fn next_spike_time(
        &mut self,
        group_id: u32,
        local_neuron_id: u32,
        current_time: u32,
        last_scheduled: u32,
        end_of_window: u32,
    ) -> u32;
}

/// Drive a callback source for one neuron across `[current_time,
/// end_of_window)`, scheduling every accepted time into `buffer`. Stops the
/// loop for this neuron the first time the callback returns a time that
/// fails the acceptance predicate.
pub fn generate_from_callback<C: SpikeGeneratorCallback>(
    callback: &mut C,
    group_id: u32,
    local_neuron_id: u32,
    neuron_id: u32,
    current_time: u32,
    end_of_window: u32,
    buffer: &mut SpikeBuffer,
) -> u32 {
    let mut last_scheduled = 0;
    let mut scheduled = 0;
    loop {
        let candidate = callback.next_spike_time(
            group_id,
            local_neuron_id,
            current_time,
            last_scheduled,
            end_of_window,
        );
        if !SpikeBuffer::accept_time(candidate, last_scheduled, current_time, end_of_window) {
            break;
        }
        buffer.schedule(neuron_id, group_id, candidate);
        last_scheduled = candidate;
        scheduled += 1;
    }
    scheduled
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn rate_length_mismatch_is_rejected() {
        let src = PoissonSource {
            rate_hz: vec![10.0, 20.0],
            refractory_ms: 2,
        };
        assert!(src.validate(3).is_err());
        assert!(src.validate(2).is_ok());
    }

    #[test]
    fn generate_respects_window_and_refractory() {
        let src = PoissonSource {
            rate_hz: vec![200.0],
            refractory_ms: 3,
        };
        let mut buf = SpikeBuffer::new();
        let mut rng = StdRng::seed_from_u64(7);
        src.generate(0, 0, 0, 1000, &mut rng, &mut buf).unwrap();
        let mut times: Vec<u32> = (0..1000).filter(|&t| !buf.drain_at(t).is_empty()).collect();
        times.sort_unstable();
        for w in times.windows(2) {
            assert!(w[1] - w[0] >= src.refractory_ms);
        }
    }

    struct CountingCallback {
        calls: u32,
        limit: u32,
    }

    impl SpikeGeneratorCallback for CountingCallback {
        fn next_spike_time(
            &mut self,
            _group_id: u32,
            _local_neuron_id: u32,
            current_time: u32,
            last_scheduled: u32,
            end_of_window: u32,
        ) -> u32 {
            self.calls += 1;
            if self.calls > self.limit {
                return end_of_window;
            }
            (last_scheduled.max(current_time) + 5).min(end_of_window - 1)
        }
    }

    #[test]
    fn callback_stops_on_rejected_time() {
        let mut cb = CountingCallback { calls: 0, limit: 3 };
        let mut buf = SpikeBuffer::new();
        let n = generate_from_callback(&mut cb, 0, 0, 0, 0, 100, &mut buf);
        assert_eq!(n, 3);
    }
}
