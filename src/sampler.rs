//! Random sources used to seed node sketches.
//!
//! A resource-holding node observes exactly one register: a uniformly chosen
//! index and a rank drawn from a geometric distribution with success probability ½,
//! shifted to start at 1 (the HyperLogLog "position of the first one bit").

use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wyhash::WyHash;

/// Source of `(register index, rank)` observations
pub trait RankSampler {
    /// Draw register index in `[0, registers)` and rank `>= 1` for `node`.
    ///
    /// `registers` is a power of two. [`Network::new`](crate::network::Network::new)
    /// rejects indices outside `[0, registers)`.
    fn sample(&mut self, node: usize, registers: usize) -> (usize, u32);
}

/// Sampler backed by a random number generator
#[derive(Debug, Clone)]
pub struct RngSampler<R: Rng = StdRng> {
    rng: R,
}

impl<R: Rng> RngSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Return underlying random number generator
    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl RngSampler<StdRng> {
    /// Create reproducible sampler from `seed`
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RankSampler for RngSampler<R> {
    #[inline]
    fn sample(&mut self, _node: usize, registers: usize) -> (usize, u32) {
        let idx = self.rng.gen_range(0..registers);
        // trailing zeros of a uniform word are geometric(1/2) on {0, 1, ..}
        let rank = self.rng.gen::<u64>().trailing_zeros() + 1;
        (idx, rank)
    }
}

/// Sampler deriving observations from the hash of `(seed, node)`.
///
/// Low bits of the hash select the register, the remaining bits give the rank,
/// so the same seed and node always observe the same register.
#[derive(Debug, Clone)]
pub struct HashSampler<H: Hasher + Default = WyHash> {
    seed: u64,
    hasher: PhantomData<H>,
}

impl<H: Hasher + Default> HashSampler<H> {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            hasher: PhantomData,
        }
    }
}

impl<H: Hasher + Default> RankSampler for HashSampler<H> {
    #[inline]
    fn sample(&mut self, node: usize, registers: usize) -> (usize, u32) {
        let mut hasher = H::default();
        (self.seed, node as u64).hash(&mut hasher);
        let hash = hasher.finish();

        let p = registers.trailing_zeros();
        let idx = (hash as usize) & (registers - 1);
        // sentinel bit caps the rank at `64 - p`
        let rank = ((hash >> p) | (1 << (63 - p))).trailing_zeros() + 1;
        (idx, rank)
    }
}
