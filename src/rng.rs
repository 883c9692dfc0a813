use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic source of randomness for I/O timing. Seeded once from
/// [`Config::seed`](crate::config::Config::seed) so two runs of the same
/// profile with the same seed produce byte-identical traces.
#[derive(Debug)]
pub struct SimRng {
    inner: StdRng,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Delay, in ms, until a blocked-on-I/O task becomes runnable again.
    /// `rand() % 1000 + 50` in the original.
    pub fn io_completion_delay_ms(&mut self) -> u64 {
        self.inner.gen_range(0..1000) + 50
    }

    /// Delay, in ms, before a task that issued I/O actually blocks.
    /// `rand() % bound + 5` in the original, where `bound` is derived from
    /// the task's remaining time slice.
    pub fn io_wait_delay_ms(&mut self, bound_ms: u64) -> u64 {
        self.inner.gen_range(0..bound_ms.max(1)) + 5
    }
}
