//! Sub-pixel jitter for temporal anti-aliasing.
//!
//! Every accumulated frame shifts its primary rays by an independent offset
//! drawn uniformly from [0,1)^2, so the running average integrates over the
//! pixel footprint instead of sampling its corner over and over.

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source of per-frame sub-pixel offsets.
pub trait JitterSource {
    /// Next offset, each component in [0, 1).
    fn next_offset(&mut self) -> Vec2;
}

/// Uniform random jitter backed by a small fast PRNG.
pub struct RandomJitter {
    rng: SmallRng,
}

impl RandomJitter {
    /// Seeded from the operating system; offsets differ between runs.
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_os_rng(),
        }
    }

    /// Deterministic sequence, for reproducible renders.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl JitterSource for RandomJitter {
    fn next_offset(&mut self) -> Vec2 {
        // random::<f32>() samples [0, 1)
        Vec2::new(self.rng.random::<f32>(), self.rng.random::<f32>())
    }
}

impl<F> JitterSource for F
where
    F: FnMut() -> Vec2,
{
    fn next_offset(&mut self) -> Vec2 {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_unit_square(v: Vec2) -> bool {
        (0.0..1.0).contains(&v.x) && (0.0..1.0).contains(&v.y)
    }

    #[test]
    fn test_bounds_over_many_frames() {
        let mut jitter = RandomJitter::from_entropy();
        let mut prev = jitter.next_offset();
        assert!(in_unit_square(prev));
        let mut repeats = 0;
        for _ in 1..10_000 {
            let next = jitter.next_offset();
            assert!(in_unit_square(next), "offset {next:?} out of range");
            if next == prev {
                repeats += 1;
            }
            prev = next;
        }
        assert_eq!(repeats, 0, "consecutive frames reused the same offset");
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = RandomJitter::seeded(42);
        let mut b = RandomJitter::seeded(42);
        for _ in 0..16 {
            assert_eq!(a.next_offset(), b.next_offset());
        }
    }

    #[test]
    fn test_covers_both_halves() {
        let mut jitter = RandomJitter::seeded(7);
        let samples: Vec<Vec2> = (0..1000).map(|_| jitter.next_offset()).collect();
        let low_x = samples.iter().filter(|v| v.x < 0.5).count();
        let low_y = samples.iter().filter(|v| v.y < 0.5).count();
        assert!((350..650).contains(&low_x));
        assert!((350..650).contains(&low_y));
    }

    #[test]
    fn test_closure_source() {
        let mut calls = 0u32;
        let mut source = || {
            calls += 1;
            Vec2::splat(0.5)
        };
        assert_eq!(JitterSource::next_offset(&mut source), Vec2::splat(0.5));
        assert_eq!(calls, 1);
    }
}
