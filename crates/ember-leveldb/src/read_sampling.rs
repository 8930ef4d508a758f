use std::cell::{Cell, RefCell};

use oorandom::Rand32;

/// Tracks how many bytes an iterator has read since it last crossed a sampling threshold, and
/// decides, with a mean period of `iter_read_sample_period` bytes, whether a given read should
/// be charged as a "seek" against the table file it landed in (see
/// [`crate::version::FileMetadata::record_seek`]).
///
/// Matches LevelDB's own approach: rather than sampling every read (expensive) or every Nth read
/// (bursty, since reads vary wildly in size), the next threshold is drawn from an exponential
/// distribution with the configured mean, so on average one in every `period` bytes read triggers
/// a sample regardless of how reads are chunked.
pub(crate) struct ReadSampler {
    rng: RefCell<Rand32>,
    bytes_until_next_sample: Cell<u64>,
}

impl ReadSampler {
    #[must_use]
    pub fn new(period: u32, seed: u64) -> Self {
        let sampler = Self { rng: RefCell::new(Rand32::new(seed)), bytes_until_next_sample: Cell::new(0) };
        sampler.reset_threshold(period);
        sampler
    }

    /// Record that `bytes_read` bytes were just read through an iterator; returns `true` at most
    /// once per crossed threshold, signaling that the caller should record a seek.
    pub fn record_read(&self, bytes_read: u64, period: u32) -> bool {
        if bytes_read > self.bytes_until_next_sample.get() {
            self.bytes_until_next_sample.set(0);
            self.reset_threshold(period);
            true
        } else {
            self.bytes_until_next_sample.set(self.bytes_until_next_sample.get() - bytes_read);
            false
        }
    }

    fn reset_threshold(&self, period: u32) {
        // Draw uniformly from `[0, 2*period)`, which has mean `period`; matches LevelDB's
        // `Random::Uniform(2 * period)` sampling scheme closely enough for a heuristic.
        let next = self.rng.borrow_mut().rand_range(0..period.saturating_mul(2).max(1));
        self.bytes_until_next_sample.set(u64::from(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eventually_samples() {
        let sampler = ReadSampler::new(64, 1);
        let mut sampled = false;
        for _ in 0..10_000 {
            if sampler.record_read(16, 64) {
                sampled = true;
                break;
            }
        }
        assert!(sampled);
    }
}
