use serde::{Deserialize, Serialize};

/// Deterministic, portable pseudo-random source keyed by a 32-bit seed.
///
/// Implements Mulberry32: a single `u32` of state, one add-and-mix step per
/// draw. Every chain runtime owns its own instance, so no two chains ever
/// share a sequence. The raw state is exposed via [`SeededRng::state`] /
/// [`SeededRng::set_state`] so runtimes can be snapshotted and restored
/// without replaying history.
///
/// Every method must produce identical output for identical prior state on
/// every platform; the core step uses only wrapping integer arithmetic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Raw internal state, suitable for snapshots.
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Restore a previously captured state.
    pub fn set_state(&mut self, state: u32) {
        self.state = state;
    }

    /// Next `u32` in the sequence (Mulberry32 step).
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut z = self.state;
        z = (z ^ (z >> 15)).wrapping_mul(z | 1);
        z ^= z.wrapping_add((z ^ (z >> 7)).wrapping_mul(z | 61));
        z ^ (z >> 14)
    }

    /// Uniform `f64` in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    /// Uniform integer in `[min, max]` (inclusive). Consumes one draw.
    /// Returns `min` when the range is inverted.
    pub fn int_in(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            // Still burn the draw so call sites consume a fixed count.
            let _ = self.next_u32();
            return min;
        }
        let span = (max - min + 1) as f64;
        min + (self.next_f64() * span) as i64
    }

    /// Weighted pick over a slice of non-negative weights. Consumes exactly
    /// one draw. Walks the cumulative sum and selects the first index whose
    /// cumulative weight strictly exceeds the roll; rounding remainders fall
    /// back to the last index. Returns `None` when the total weight is not
    /// positive (the draw is still consumed).
    pub fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().copied().filter(|w| *w > 0.0).sum();
        let roll = self.next_f64() * total;
        if total <= 0.0 || weights.is_empty() {
            return None;
        }
        let mut cumulative = 0.0;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            cumulative += w;
            if cumulative > roll {
                return Some(i);
            }
        }
        Some(weights.len() - 1)
    }

    /// Fisher–Yates shuffle. Consumes `len - 1` draws for `len >= 2`.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.int_in(0, i as i64) as usize;
            items.swap(i, j);
        }
    }
}
