// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Used only when no validation files are given: a fraction of
// the training pairs is held out so valid_freq evaluation still
// has something to measure.
//
// The shuffle is seeded so the same --seed always holds out the
// same pairs, which keeps resumed runs comparable.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` and split off `valid_fraction` of them.
/// Returns (train, valid).
pub fn split_train_val<T>(mut samples: Vec<T>, valid_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let valid_fraction = valid_fraction.clamp(0.0, 1.0);
    let n_valid = ((total as f64) * valid_fraction).round() as usize;
    let split_at = total - n_valid.min(total);

    let valid = samples.split_off(split_at);

    tracing::debug!("Dataset split: {} train, {} validation", samples.len(), valid.len());
    (samples, valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, valid) = split_train_val(items, 0.2, 1);
        assert_eq!(train.len(), 80);
        assert_eq!(valid.len(), 20);
    }

    #[test]
    fn test_zero_fraction_keeps_everything() {
        let items: Vec<usize> = (0..10).collect();
        let (train, valid) = split_train_val(items, 0.0, 1);
        assert_eq!(train.len(), 10);
        assert!(valid.is_empty());
    }

    #[test]
    fn test_same_seed_same_split() {
        let (_, a) = split_train_val((0..50).collect::<Vec<usize>>(), 0.3, 7);
        let (_, b) = split_train_val((0..50).collect::<Vec<usize>>(), 0.3, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let (train, valid) = split_train_val(Vec::<usize>::new(), 0.5, 1);
        assert!(train.is_empty() && valid.is_empty());
    }
}
