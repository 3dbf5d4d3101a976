//! Group fairness metrics
//!
//! Confusion matrices are computed separately for the privileged and the
//! unprivileged group of one protected attribute, then compared:
//! - Equal Opportunity Difference: `TPR(priv) - TPR(unpriv)`
//! - Equalized Odds (average odds) Difference:
//!   `0.5 * [(FPR(unpriv) - FPR(priv)) + (TPR(unpriv) - TPR(priv))]`
//!
//! Every ratio with a zero denominator evaluates to 0.

use crate::dataset::{Dataset, Label, NEGATIVE_LABEL, POSITIVE_LABEL};
use crate::error::{FairBalanceError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for fairness evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FairnessConfig {
    /// Encoded attribute value of the privileged group
    pub privileged_value: f64,
    /// Encoded attribute value of the unprivileged group
    pub unprivileged_value: f64,
    /// Tolerance when matching attribute values
    pub tolerance: f64,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            privileged_value: 0.5,
            unprivileged_value: 0.0,
            tolerance: 1e-9,
        }
    }
}

impl FairnessConfig {
    pub fn with_privileged_value(mut self, value: f64) -> Self {
        self.privileged_value = value;
        self
    }

    pub fn with_unprivileged_value(mut self, value: f64) -> Self {
        self.unprivileged_value = value;
        self
    }

    /// Same config with the two groups exchanged
    pub fn swapped(&self) -> Self {
        Self {
            privileged_value: self.unprivileged_value,
            unprivileged_value: self.privileged_value,
            tolerance: self.tolerance,
        }
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0
pub fn calculate_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        debug!(numerator, "Zero denominator, ratio set to 0");
        0.0
    } else {
        numerator / denominator
    }
}

/// Binary confusion counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn new(tp: usize, tn: usize, fp: usize, fn_: usize) -> Self {
        Self { tp, tn, fp, fn_ }
    }

    /// Count `(actual, predicted)` pairs at the positions accepted by `filter`
    pub fn from_predicate<F>(actual: &[Label], predicted: &[Label], filter: F) -> Self
    where
        F: Fn(usize) -> bool,
    {
        let mut cm = Self::default();
        for (i, (&a, &p)) in actual.iter().zip(predicted.iter()).enumerate() {
            if !filter(i) {
                continue;
            }
            match (a, p) {
                (POSITIVE_LABEL, POSITIVE_LABEL) => cm.tp += 1,
                (NEGATIVE_LABEL, NEGATIVE_LABEL) => cm.tn += 1,
                (NEGATIVE_LABEL, POSITIVE_LABEL) => cm.fp += 1,
                (POSITIVE_LABEL, NEGATIVE_LABEL) => cm.fn_ += 1,
                _ => {}
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// True positive rate (recall)
    pub fn tpr(&self) -> f64 {
        calculate_ratio(self.tp as f64, (self.tp + self.fn_) as f64)
    }

    /// False positive rate (false alarm rate)
    pub fn fpr(&self) -> f64 {
        calculate_ratio(self.fp as f64, (self.fp + self.tn) as f64)
    }

    pub fn precision(&self) -> f64 {
        calculate_ratio(self.tp as f64, (self.tp + self.fp) as f64)
    }

    pub fn accuracy(&self) -> f64 {
        calculate_ratio((self.tp + self.tn) as f64, self.total() as f64)
    }

    pub fn f1(&self) -> f64 {
        let precision = self.precision();
        let recall = self.tpr();
        calculate_ratio(2.0 * precision * recall, precision + recall)
    }
}

/// Equal Opportunity Difference
pub fn equal_opportunity_difference(privileged: &ConfusionMatrix, unprivileged: &ConfusionMatrix) -> f64 {
    privileged.tpr() - unprivileged.tpr()
}

/// Equalized Odds (average odds) Difference
pub fn average_odds_difference(privileged: &ConfusionMatrix, unprivileged: &ConfusionMatrix) -> f64 {
    0.5 * ((unprivileged.fpr() - privileged.fpr()) + (unprivileged.tpr() - privileged.tpr()))
}

/// Overall model performance
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub false_alarm_rate: f64,
    pub f1: f64,
}

impl PerformanceMetrics {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        Self {
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.tpr(),
            false_alarm_rate: cm.fpr(),
            f1: cm.f1(),
        }
    }

    /// Metrics over all `(actual, predicted)` pairs
    pub fn evaluate(actual: &[Label], predicted: &[Label]) -> Result<Self> {
        check_lengths(actual.len(), predicted.len())?;
        Ok(Self::from_confusion(&ConfusionMatrix::from_predicate(actual, predicted, |_| true)))
    }
}

/// Comparison of the privileged and unprivileged groups of one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupFairness {
    pub attribute: String,
    pub privileged: ConfusionMatrix,
    pub unprivileged: ConfusionMatrix,
    pub equal_opportunity_difference: f64,
    pub average_odds_difference: f64,
}

/// Computes group fairness from predictions on a held-out set
#[derive(Debug, Clone, Default)]
pub struct FairnessEvaluator {
    config: FairnessConfig,
}

impl FairnessEvaluator {
    pub fn new(config: FairnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FairnessConfig {
        &self.config
    }

    /// Group metrics of `attribute`; `predictions` align with the dataset rows
    pub fn evaluate(&self, dataset: &Dataset, attribute: &str, predictions: &[Label]) -> Result<GroupFairness> {
        check_lengths(dataset.len(), predictions.len())?;
        let column = dataset.schema().index_of(attribute)?;

        let attr_values: Vec<Option<f64>> = dataset.records().iter().map(|r| r.values[column].as_f64()).collect();
        let actual: Vec<Label> = dataset.records().iter().map(|r| r.label).collect();
        let attr_values = &attr_values;
        let tolerance = self.config.tolerance;
        let in_group = |target: f64| move |i: usize| matches!(attr_values[i], Some(v) if (v - target).abs() <= tolerance);

        let privileged = ConfusionMatrix::from_predicate(&actual, predictions, in_group(self.config.privileged_value));
        let unprivileged =
            ConfusionMatrix::from_predicate(&actual, predictions, in_group(self.config.unprivileged_value));

        let result = GroupFairness {
            attribute: attribute.to_string(),
            privileged,
            unprivileged,
            equal_opportunity_difference: equal_opportunity_difference(&privileged, &unprivileged),
            average_odds_difference: average_odds_difference(&privileged, &unprivileged),
        };
        debug!(
            attribute,
            eod = result.equal_opportunity_difference,
            aod = result.average_odds_difference,
            privileged = privileged.total(),
            unprivileged = unprivileged.total(),
            "Evaluated group fairness"
        );
        Ok(result)
    }
}

fn check_lengths(rows: usize, predictions: usize) -> Result<()> {
    if rows != predictions {
        return Err(FairBalanceError::ShapeError {
            expected: format!("{} predictions", rows),
            actual: format!("{} predictions", predictions),
        });
    }
    Ok(())
}
