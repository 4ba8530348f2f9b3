//! Small helpers shared by tests and benchmarks.

use core::ops::Range;

/// Fast non-cryptographic random number generator based on wyhash.
#[derive(Debug, Clone)]
pub struct WyRand {
    pub seed: u64,
}

impl WyRand {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
    pub fn gen(&mut self) -> u64 {
        self.seed = self.seed.wrapping_add(0xa076_1d64_78bd_642f);
        let t = (self.seed as u128).wrapping_mul((self.seed ^ 0xe703_7ed1_a0b4_28db) as u128);
        (t >> 64) as u64 ^ t as u64
    }
    pub fn range(&mut self, range: Range<u64>) -> u64 {
        range.start + self.gen() % (range.end - range.start)
    }
    pub fn shuffle<T>(&mut self, target: &mut [T]) {
        for i in (1..target.len()).rev() {
            target.swap(i, self.range(0..i as u64 + 1) as usize);
        }
    }
}

/// Initialize logging for tests and benchmarks.
#[cfg(feature = "std")]
pub fn logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init();
}
