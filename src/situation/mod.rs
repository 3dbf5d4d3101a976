//! Situation testing
//!
//! Each record is re-predicted under every protected-attribute combination
//! with all other features held fixed. A record whose predictions disagree
//! is inconsistent: the model treats otherwise identical applicants
//! differently because of their protected attributes.

use crate::balance::CombinationSpace;
use crate::classifier::Classifier;
use crate::dataset::{Dataset, FeatureValue, Label, Record};
use crate::error::{FairBalanceError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// What to do with inconsistent records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RemovalPolicy {
    /// Drop them from the dataset
    #[default]
    Remove,
    /// Keep them and only report their ids
    Flag,
}

/// Inconsistent record ids out of `total` tested
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SituationTestResult {
    pub inconsistent: BTreeSet<usize>,
    pub total: usize,
}

impl SituationTestResult {
    /// Fraction of tested records that are inconsistent
    pub fn rate(&self) -> f64 {
        crate::fairness::calculate_ratio(self.inconsistent.len() as f64, self.total as f64)
    }

    pub fn is_inconsistent(&self, record: usize) -> bool {
        self.inconsistent.contains(&record)
    }
}

/// Counterfactual consistency check over a fixed combination space
#[derive(Debug, Clone)]
pub struct CounterfactualFilter {
    space: CombinationSpace,
    combinations: Vec<Vec<FeatureValue>>,
}

impl CounterfactualFilter {
    pub fn new(space: CombinationSpace) -> Self {
        let combinations = space.combinations();
        Self { space, combinations }
    }

    pub fn space(&self) -> &CombinationSpace {
        &self.space
    }

    /// Labels predicted for a record under every combination.
    /// `id` only names the record in the error raised for an empty set.
    pub fn consistency_set<C: Classifier + ?Sized>(
        &self,
        id: usize,
        record: &Record,
        classifier: &C,
    ) -> Result<BTreeSet<Label>> {
        let mut values = record.values.clone();
        let mut labels = BTreeSet::new();

        for combination in &self.combinations {
            for (&column, value) in self.space.columns().iter().zip(combination) {
                let slot = values.get_mut(column).ok_or_else(|| FairBalanceError::ShapeError {
                    expected: format!("at least {} features", column + 1),
                    actual: format!("{} features", record.values.len()),
                })?;
                *slot = value.clone();
            }
            labels.insert(classifier.predict(&values)?);
        }

        if labels.is_empty() {
            return Err(FairBalanceError::EmptyPredictionSet { record: id });
        }
        Ok(labels)
    }

    /// Ids (row positions) of records whose consistency set has more than one label
    pub fn find_inconsistent<C: Classifier + ?Sized>(
        &self,
        dataset: &Dataset,
        classifier: &C,
    ) -> Result<SituationTestResult> {
        let flags = dataset
            .records()
            .par_iter()
            .enumerate()
            .map(|(id, record)| Ok((id, self.consistency_set(id, record, classifier)?.len() > 1)))
            .collect::<Result<Vec<(usize, bool)>>>()?;

        let inconsistent: BTreeSet<usize> = flags
            .into_iter()
            .filter(|&(_, flagged)| flagged)
            .map(|(id, _)| id)
            .collect();

        let result = SituationTestResult {
            inconsistent,
            total: dataset.len(),
        };
        info!(
            tested = result.total,
            combinations = self.combinations.len(),
            inconsistent = result.inconsistent.len(),
            rate = result.rate(),
            "Situation testing complete"
        );
        Ok(result)
    }

    /// Apply `policy` to the records found inconsistent
    pub fn apply(dataset: &Dataset, result: &SituationTestResult, policy: RemovalPolicy) -> Dataset {
        match policy {
            RemovalPolicy::Remove => dataset.without(&result.inconsistent),
            RemovalPolicy::Flag => dataset.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        // columns: sex, income
        let rows = vec![
            (vec![0.0, 0.2], 0),
            (vec![1.0, 0.9], 1),
            (vec![0.0, 0.6], 1),
            (vec![1.0, 0.1], 0),
        ];
        Dataset::from_numeric(&["sex", "income"], "y", rows).unwrap()
    }

    fn space(ds: &Dataset) -> CombinationSpace {
        CombinationSpace::from_dataset(ds, &["sex".to_string()]).unwrap()
    }

    #[test]
    fn test_invariant_predictions_are_consistent() {
        let ds = dataset();
        let filter = CounterfactualFilter::new(space(&ds));
        let by_income = |v: &[FeatureValue]| -> Result<Label> { Ok((v[1].as_f64().unwrap_or(0.0) > 0.5) as Label) };
        let result = filter.find_inconsistent(&ds, &by_income).unwrap();
        assert!(result.inconsistent.is_empty());
        assert_eq!(result.total, 4);
        assert_eq!(result.rate(), 0.0);
    }

    #[test]
    fn test_attribute_dependent_predictions_are_flagged() {
        let ds = dataset();
        let filter = CounterfactualFilter::new(space(&ds));
        // favors sex = 1 only when income is in the middle band
        let biased = |v: &[FeatureValue]| -> Result<Label> {
            let sex = v[0].as_f64().unwrap_or(0.0);
            let income = v[1].as_f64().unwrap_or(0.0);
            Ok((income > 0.8 || (income > 0.5 && sex > 0.5)) as Label)
        };
        let result = filter.find_inconsistent(&ds, &biased).unwrap();
        assert_eq!(result.inconsistent, BTreeSet::from([2]));
        assert!((result.rate() - 0.25).abs() < 1e-12);

        let removed = CounterfactualFilter::apply(&ds, &result, RemovalPolicy::Remove);
        assert_eq!(removed.len(), 3);
        let flagged = CounterfactualFilter::apply(&ds, &result, RemovalPolicy::Flag);
        assert_eq!(flagged.len(), 4);
    }

    #[test]
    fn test_empty_combination_space_is_an_error() {
        let ds = dataset();
        let empty = CombinationSpace::new(vec!["sex".to_string()], vec![0], vec![Vec::new()]).unwrap();
        let filter = CounterfactualFilter::new(empty);
        let constant = |_: &[FeatureValue]| -> Result<Label> { Ok(1) };
        let err = filter.find_inconsistent(&ds, &constant).unwrap_err();
        assert!(matches!(err, FairBalanceError::EmptyPredictionSet { .. }));
    }

    #[test]
    fn test_consistency_set_collects_labels() {
        let ds = dataset();
        let filter = CounterfactualFilter::new(space(&ds));
        let by_sex = |v: &[FeatureValue]| -> Result<Label> { Ok(v[0].as_f64().unwrap_or(0.0) as Label) };
        let labels = filter.consistency_set(0, &ds.records()[0], &by_sex).unwrap();
        assert_eq!(labels, BTreeSet::from([0, 1]));
    }
}
