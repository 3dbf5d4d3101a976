//! Train/test splitting

use crate::dataset::Dataset;
use crate::error::{FairBalanceError, Result};
use rand::prelude::*;

/// Shuffled split into `(train, test)`.
///
/// The test part holds `ceil(n * test_ratio)` rows; both parts must end up
/// non-empty.
pub fn train_test_split(dataset: &Dataset, test_ratio: f64, seed: u64) -> Result<(Dataset, Dataset)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(FairBalanceError::InvalidParameter {
            name: "test_ratio".to_string(),
            value: test_ratio.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let n = dataset.len();
    let n_test = (n as f64 * test_ratio).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(FairBalanceError::InsufficientData {
            required: 2,
            available: n,
            class: None,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((dataset.subset(train_idx), dataset.subset(test_idx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> Dataset {
        Dataset::from_numeric(
            &["x"],
            "y",
            (0..n).map(|i| (vec![i as f64], (i % 2) as i64)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split(&dataset(10), 0.3, 0).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 7);
    }

    #[test]
    fn test_split_is_reproducible() {
        let ds = dataset(20);
        let (a, _) = train_test_split(&ds, 0.25, 42).unwrap();
        let (b, _) = train_test_split(&ds, 0.25, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_rejects_bad_ratio() {
        assert!(train_test_split(&dataset(10), 1.0, 0).is_err());
        assert!(train_test_split(&dataset(1), 0.5, 0).is_err());
    }
}
