//! Deterministic random source for the engine.
//!
//! A thin wrapper over `ChaCha8Rng` seeded from the engine seed. Everything
//! the engine randomizes flows through this type, so a seed fully determines
//! a mutation given the same input tree and options.

use rand::{Rng as _, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded pseudo-random engine.
///
/// Not thread-safe and not intended to be: the engine owns exactly one and
/// uses it from a single thread.
#[derive(Debug, Clone)]
pub struct EngineRng {
    inner: ChaCha8Rng,
}

impl EngineRng {
    pub fn new(seed: u32) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(u64::from(seed)),
        }
    }

    /// Uniform index in `[0, count)`.
    ///
    /// A count of one returns zero without consuming a draw, so degenerate
    /// choices do not advance the stream.
    pub fn uniform_index(&mut self, count: usize) -> usize {
        assert!(count > 0, "uniform_index over an empty range");
        if count == 1 {
            return 0;
        }
        self.inner.gen_range(0..count)
    }

    /// Uniform value in `[0, bound)` over the full `u64` domain. Same
    /// single-choice shortcut as [`uniform_index`](Self::uniform_index).
    pub fn uniform_u64(&mut self, bound: u64) -> u64 {
        assert!(bound > 0, "uniform_u64 over an empty range");
        if bound == 1 {
            return 0;
        }
        self.inner.gen_range(0..bound)
    }

    /// True with probability `1/n`.
    pub fn one_in(&mut self, n: usize) -> bool {
        self.uniform_index(n) == 0
    }

    /// Fair coin flip.
    pub fn coin(&mut self) -> bool {
        self.one_in(2)
    }

    /// Flips one uniformly chosen bit in the buffer.
    pub fn flip_bit(&mut self, bytes: &mut [u8]) {
        debug_assert!(!bytes.is_empty(), "flip_bit on an empty buffer");
        let bit = self.uniform_index(bytes.len() * 8);
        bytes[bit / 8] ^= 1 << (bit % 8);
    }
}
