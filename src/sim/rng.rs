//! Seeded deterministic RNG
//!
//! Persisted as `(seed, draws)`; the generator itself is rebuilt on first
//! use after a load and fast-forwarded, so a restored game continues the
//! exact same stream.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::fixed::Bam;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimRng {
    seed: u64,
    draws: u64,
    #[serde(skip)]
    cache: Option<Pcg32>,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            draws: 0,
            cache: None,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn draws(&self) -> u64 {
        self.draws
    }

    fn generator(&mut self) -> &mut Pcg32 {
        let (seed, draws) = (self.seed, self.draws);
        self.cache.get_or_insert_with(|| {
            let mut rng = Pcg32::seed_from_u64(seed);
            rng.advance(draws);
            rng
        })
    }

    pub fn next_u32(&mut self) -> u32 {
        let value = self.generator().next_u32();
        self.draws += 1;
        value
    }

    /// Uniform-ish value in `lo..hi`; returns `lo` for an empty range
    pub fn range_i32(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        let span = (hi as i64 - lo as i64) as u64;
        lo + (self.next_u32() as u64 % span) as i32
    }

    /// `num` in `den` chance
    pub fn chance(&mut self, num: u32, den: u32) -> bool {
        if den == 0 {
            return false;
        }
        self.next_u32() % den < num
    }

    pub fn bam(&mut self) -> Bam {
        (self.next_u32() >> 24) as Bam
    }

    /// Cell offset with each axis in `-radius..=radius`
    pub fn offset_in_radius(&mut self, radius: i32) -> (i32, i32) {
        let r = radius.abs();
        (self.range_i32(-r, r + 1), self.range_i32(-r, r + 1))
    }
}

impl PartialEq for SimRng {
    fn eq(&self, other: &Self) -> bool {
        self.seed == other.seed && self.draws == other.draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_restored_rng_continues_stream() {
        let mut rng = SimRng::new(7);
        for _ in 0..5 {
            rng.next_u32();
        }
        let json = serde_json::to_string(&rng).expect("serialize");
        let mut restored: SimRng = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, rng);
        for _ in 0..8 {
            assert_eq!(restored.next_u32(), rng.next_u32());
        }
    }

    #[test]
    fn test_range_bounds() {
        let mut rng = SimRng::new(1);
        for _ in 0..200 {
            let v = rng.range_i32(-3, 4);
            assert!((-3..4).contains(&v));
        }
        assert_eq!(rng.range_i32(5, 5), 5);
    }

    #[test]
    fn test_offset_in_radius() {
        let mut rng = SimRng::new(9);
        for _ in 0..100 {
            let (dx, dy) = rng.offset_in_radius(6);
            assert!(dx.abs() <= 6 && dy.abs() <= 6);
        }
    }
}
