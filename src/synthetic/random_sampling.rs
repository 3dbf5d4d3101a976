//! Random undersampling

use crate::dataset::{Dataset, Label};
use crate::error::{FairBalanceError, Result};
use rand::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

/// Shrink every class to the size of the smallest one.
///
/// Rows are drawn without replacement; classes already at the minimum are
/// kept whole. A single-class dataset is returned unchanged.
pub fn match_minority<R: Rng + ?Sized>(dataset: &Dataset, rng: &mut R) -> Dataset {
    let indices = dataset.class_indices();
    if indices.len() < 2 {
        return dataset.clone();
    }
    let minority = indices.values().map(Vec::len).min().unwrap_or(0);

    let mut keep = Vec::with_capacity(minority * indices.len());
    for class_indices in indices.values() {
        if class_indices.len() == minority {
            keep.extend_from_slice(class_indices);
        } else {
            keep.extend(class_indices.choose_multiple(rng, minority).copied());
        }
    }
    keep.sort_unstable();
    dataset.subset(&keep)
}

/// Remove `n` uniformly chosen rows labelled `class`
pub fn delete_samples<R: Rng + ?Sized>(dataset: &Dataset, class: Label, n: usize, rng: &mut R) -> Result<Dataset> {
    let eligible: Vec<usize> = dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| r.label == class)
        .map(|(i, _)| i)
        .collect();

    if eligible.len() < n {
        return Err(FairBalanceError::InsufficientRows {
            class,
            requested: n,
            available: eligible.len(),
        });
    }

    let removed: BTreeSet<usize> = rand::seq::index::sample(rng, eligible.len(), n)
        .into_iter()
        .map(|i| eligible[i])
        .collect();
    debug!(class, removed = n, "Deleted samples");
    Ok(dataset.without(&removed))
}

/// Delete rows from every class holding more than `target` rows.
/// Returns the trimmed dataset and the number of rows removed.
pub fn trim_to_target<R: Rng + ?Sized>(dataset: &Dataset, target: usize, rng: &mut R) -> Result<(Dataset, usize)> {
    let mut out = dataset.clone();
    let mut removed = 0;
    for (class, count) in dataset.class_counts() {
        if count > target {
            out = delete_samples(&out, class, count - target, rng)?;
            removed += count - target;
        }
    }
    Ok((out, removed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pos: usize, neg: usize) -> Dataset {
        let mut rows = Vec::new();
        for i in 0..pos {
            rows.push((vec![i as f64], 1));
        }
        for i in 0..neg {
            rows.push((vec![i as f64], 0));
        }
        Dataset::from_numeric(&["x"], "y", rows).unwrap()
    }

    #[test]
    fn test_match_minority() {
        let ds = counts(50, 8);
        let mut rng = StdRng::seed_from_u64(42);
        let out = match_minority(&ds, &mut rng);
        assert_eq!(out.count_label(1), 8);
        assert_eq!(out.count_label(0), 8);
    }

    #[test]
    fn test_match_minority_single_class() {
        let ds = counts(4, 0);
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(match_minority(&ds, &mut rng).len(), 4);
    }

    #[test]
    fn test_delete_samples() {
        let ds = counts(10, 10);
        let mut rng = StdRng::seed_from_u64(0);
        let out = delete_samples(&ds, 1, 4, &mut rng).unwrap();
        assert_eq!(out.count_label(1), 6);
        assert_eq!(out.count_label(0), 10);
    }

    #[test]
    fn test_delete_too_many() {
        let ds = counts(3, 10);
        let mut rng = StdRng::seed_from_u64(0);
        let err = delete_samples(&ds, 1, 4, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            FairBalanceError::InsufficientRows {
                class: 1,
                requested: 4,
                available: 3
            }
        ));
    }

    #[test]
    fn test_trim_to_target() {
        let ds = counts(50, 30);
        let mut rng = StdRng::seed_from_u64(0);
        let (out, removed) = trim_to_target(&ds, 20, &mut rng).unwrap();
        assert_eq!(out.count_label(1), 20);
        assert_eq!(out.count_label(0), 20);
        assert_eq!(removed, 40);
    }
}
