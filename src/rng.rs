// Seeded random source owned by a running world

use ::rand as external_rand;
use external_rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic generator threaded through every stochastic decision of a
/// run. Two contexts built from the same seed yield the same draws.
#[derive(Clone, Debug)]
pub struct RngContext {
    inner: ChaCha8Rng,
}

impl RngContext {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RngCore for RngContext {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), external_rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}
