//! Deterministic simulation-level RNG wrapper.
//!
//! Used for synthetic workload generation (random orders in demos,
//! random graphs in property tests).  The engine itself is fully
//! deterministic and never draws random numbers.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Seeded RNG for global operations (order generation, scenario setup).
///
/// Used only in single-threaded contexts.  If you need parallel randomness,
/// give each worker thread its own `SimRng` derived with [`child`](Self::child).
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    /// Derive a child `SimRng` with a different seed offset.
    pub fn child(&mut self, offset: u64) -> SimRng {
        let child_seed: u64 = self.0.r#gen::<u64>() ^ offset.wrapping_mul(MIXING_CONSTANT);
        SimRng(SmallRng::seed_from_u64(child_seed))
    }

    #[inline]
    pub fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.0.r#gen()
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Choose a random element from a slice; `None` if empty.
    #[inline]
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        use rand::seq::SliceRandom;
        slice.choose(&mut self.0)
    }
}
