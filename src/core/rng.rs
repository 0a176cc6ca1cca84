//! Deterministic Random Number Generator
//!
//! Mulberry32: a small, fast 32-bit PRNG. Given the same seed it produces an
//! identical sequence on every platform, which is what makes recorded rounds
//! replayable offline.

use serde::{Deserialize, Serialize};

/// Deterministic PRNG over a 32-bit state (Mulberry32).
///
/// # Determinism Guarantee
///
/// All helpers are integer-only. Probabilities are expressed as exact
/// threshold checks against `next_u32`, never as float comparisons.
///
/// # Example
///
/// ```
/// use blast_arena::core::rng::Mulberry32;
///
/// let mut rng = Mulberry32::new(12345);
/// let a = rng.next_u32();
/// let mut rng2 = Mulberry32::new(12345);
/// assert_eq!(a, rng2.next_u32()); // Always the same!
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mulberry32 {
    state: u32,
}

impl Default for Mulberry32 {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Mulberry32 {
    /// Create a new RNG from a 32-bit seed.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Generate the next 32-bit random value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let t = self.state;
        let mut x = (t ^ (t >> 15)).wrapping_mul(t | 1);
        x ^= x.wrapping_add((x ^ (x >> 7)).wrapping_mul(x | 61));
        x ^ (x >> 14)
    }

    /// Generate a uniform integer in `[0, max)`. Returns 0 when `max == 0`.
    ///
    /// Lemire-style scaling: `(next * max) >> 32`. The slight bias is
    /// negligible for game-sized ranges and, more importantly, stable.
    #[inline]
    pub fn next_below(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        ((self.next_u32() as u64 * max as u64) >> 32) as u32
    }

    /// Generate a uniform integer in `[min, max]` (inclusive).
    #[inline]
    pub fn next_range(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        min + self.next_below(max - min + 1)
    }

    /// Return true with probability `num / den`.
    #[inline]
    pub fn chance(&mut self, num: u32, den: u32) -> bool {
        if den == 0 {
            return false;
        }
        self.next_below(den) < num
    }

    /// Shuffle a slice in place using Fisher-Yates.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_below((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_below(slice.len() as u32) as usize;
            Some(&slice[idx])
        }
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: u32) {
        self.state = state;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = Mulberry32::new(12345);
        let mut rng2 = Mulberry32::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
        }
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = Mulberry32::new(12345);
        let mut rng2 = Mulberry32::new(54321);

        // Very unlikely to match
        assert_ne!(rng1.next_u32(), rng2.next_u32());
    }

    #[test]
    fn test_next_below() {
        let mut rng = Mulberry32::new(1234);

        for _ in 0..1000 {
            let val = rng.next_below(100);
            assert!(val < 100);
        }

        // Edge case: max = 0
        assert_eq!(rng.next_below(0), 0);

        // Edge case: max = 1
        assert_eq!(rng.next_below(1), 0);
    }

    #[test]
    fn test_next_range() {
        let mut rng = Mulberry32::new(5678);

        for _ in 0..1000 {
            let val = rng.next_range(3, 9);
            assert!((3..=9).contains(&val));
        }

        // Edge case: min = max
        assert_eq!(rng.next_range(5, 5), 5);
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = Mulberry32::new(42);
        for _ in 0..100 {
            assert!(rng.chance(10, 10));
            assert!(!rng.chance(0, 10));
        }
        assert!(!rng.chance(1, 0));
    }

    #[test]
    fn test_shuffle_determinism() {
        let mut rng1 = Mulberry32::new(1111);
        let mut rng2 = Mulberry32::new(1111);

        let mut arr1 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let mut arr2 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

        rng1.shuffle(&mut arr1);
        rng2.shuffle(&mut arr2);

        assert_eq!(arr1, arr2);
    }

    #[test]
    fn test_state_checkpoint() {
        let mut rng = Mulberry32::new(5555);

        for _ in 0..50 {
            rng.next_u32();
        }

        let saved = rng.state();
        let next_values: Vec<u32> = (0..10).map(|_| rng.next_u32()).collect();

        rng.set_state(saved);
        for expected in next_values {
            assert_eq!(rng.next_u32(), expected);
        }
    }
}
