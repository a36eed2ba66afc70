//! Small shared helpers for the index and solver hot paths.

use lazy_static::lazy_static;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::types::WordId;

/// Truncated Poisson(λ = 2) pmf used whenever the solver randomises a pick
/// from a sorted candidate list. Anything past the ninth term has negligible
/// mass and is folded into the clamp in `poisson_index`.
pub const POISSON_PICK_WEIGHTS: [f64; 9] = [
    0.1353, 0.2707, 0.2707, 0.1804, 0.0902, 0.0361, 0.0120, 0.0034, 0.0012,
];

lazy_static! {
    static ref POISSON_PICK: WeightedIndex<f64> =
        WeightedIndex::new(POISSON_PICK_WEIGHTS).expect("static pick weights are valid");
}

/// Sample an index into a list of `len` ranked candidates, biased toward the
/// front: `min(Poisson(2), len - 1)`.
pub fn poisson_index<R: Rng>(rng: &mut R, len: usize) -> usize {
    debug_assert!(len > 0);
    POISSON_PICK.sample(rng).min(len - 1)
}

/// Nearest-rank percentile of an ascending-sorted slice. `q` is in `(0, 1]`:
/// the value at rank `ceil(q * len)`, 1-based.
pub fn percentile(sorted: &[u64], q: f64) -> u64 {
    debug_assert!(!sorted.is_empty());
    let rank = (sorted.len() as f64 * q).ceil().max(1.0) as usize;
    sorted[(rank - 1).min(sorted.len() - 1)]
}

/// Intersect two ascending-sorted id lists into a fresh ascending list.
pub fn intersect_sorted(a: &[WordId], b: &[WordId]) -> Vec<WordId> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            out.push(a[i]);
            i += 1;
            j += 1;
        } else if a[i] < b[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_intersect_sorted() {
        assert_eq!(intersect_sorted(&[1, 3, 5, 9], &[2, 3, 4, 5]), vec![3, 5]);
        assert_eq!(intersect_sorted(&[], &[1, 2]), Vec::<WordId>::new());
        assert_eq!(intersect_sorted(&[7], &[7]), vec![7]);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let scores: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&scores, 0.95), 95);
        assert_eq!(percentile(&[4], 0.95), 4);
        assert_eq!(percentile(&[1, 10], 0.95), 10);
    }

    #[test]
    fn test_poisson_index_is_clamped() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..1000 {
            assert!(poisson_index(&mut rng, 3) < 3);
        }
        assert_eq!(poisson_index(&mut rng, 1), 0);
    }
}
