//! Prediction capability used by situation testing and fairness evaluation
//!
//! The balancing core only needs `predict(record) -> label`; any model
//! implementing [`Classifier`] can be substituted.

mod logistic;

pub use logistic::LogisticRegression;

use crate::dataset::{Dataset, FeatureEncoder, FeatureValue, Label, NEGATIVE_LABEL, POSITIVE_LABEL};
use crate::error::Result;
use ndarray::ArrayView1;
use tracing::debug;

/// A trained binary classifier over records of a fixed schema
pub trait Classifier: Send + Sync {
    /// Predicted label for one record's feature values
    fn predict(&self, values: &[FeatureValue]) -> Result<Label>;

    /// Predicted labels for every record, in order
    fn predict_dataset(&self, dataset: &Dataset) -> Result<Vec<Label>> {
        dataset.records().iter().map(|r| self.predict(&r.values)).collect()
    }
}

impl<F> Classifier for F
where
    F: Fn(&[FeatureValue]) -> Result<Label> + Send + Sync,
{
    fn predict(&self, values: &[FeatureValue]) -> Result<Label> {
        self(values)
    }
}

/// Produces a [`Classifier`] from labelled training data
pub trait ClassifierTrainer {
    type Model: Classifier;

    fn fit(&self, dataset: &Dataset) -> Result<Self::Model>;
}

/// Trains [`LogisticModel`]s from a hyperparameter template
#[derive(Debug, Clone, Default)]
pub struct LogisticRegressionTrainer {
    template: LogisticRegression,
}

impl LogisticRegressionTrainer {
    pub fn new(template: LogisticRegression) -> Self {
        Self { template }
    }
}

impl ClassifierTrainer for LogisticRegressionTrainer {
    type Model = LogisticModel;

    fn fit(&self, dataset: &Dataset) -> Result<LogisticModel> {
        let encoder = FeatureEncoder::fit(dataset);
        let (x, y) = encoder.encode(dataset)?;
        let mut model = self.template.clone();
        model.fit(&x, &y)?;
        debug!(rows = dataset.len(), width = encoder.width(), "Fitted logistic regression");
        Ok(LogisticModel { encoder, model })
    }
}

/// Logistic regression bundled with the encoder fitted on its training set
#[derive(Debug, Clone)]
pub struct LogisticModel {
    encoder: FeatureEncoder,
    model: LogisticRegression,
}

impl LogisticModel {
    /// Probability of the positive label
    pub fn predict_proba(&self, values: &[FeatureValue]) -> Result<f64> {
        let row = self.encoder.encode_values(values)?;
        self.model.predict_proba_row(ArrayView1::from(&row))
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, values: &[FeatureValue]) -> Result<Label> {
        let p = self.predict_proba(values)?;
        Ok(if p >= 0.5 { POSITIVE_LABEL } else { NEGATIVE_LABEL })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> Dataset {
        let mut rows = Vec::new();
        for i in 0..10 {
            let v = i as f64 / 10.0;
            rows.push((vec![v, 0.0], 0));
            rows.push((vec![v + 5.0, 1.0], 1));
        }
        Dataset::from_numeric(&["income", "flag"], "y", rows).unwrap()
    }

    #[test]
    fn test_trainer_produces_working_model() {
        let ds = separable();
        let trainer = LogisticRegressionTrainer::new(LogisticRegression::new().with_learning_rate(0.5));
        let model = trainer.fit(&ds).unwrap();
        let predictions = model.predict_dataset(&ds).unwrap();
        let correct = predictions
            .iter()
            .zip(ds.records())
            .filter(|(p, r)| **p == r.label)
            .count();
        assert!(correct >= 18, "only {} of 20 correct", correct);
    }

    #[test]
    fn test_closure_classifier() {
        let threshold = |values: &[FeatureValue]| -> Result<Label> {
            Ok(if values[0].as_f64().unwrap_or(0.0) > 1.0 { 1 } else { 0 })
        };
        assert_eq!(threshold.predict(&[FeatureValue::Numeric(2.0)]).unwrap(), 1);
        assert_eq!(threshold.predict(&[FeatureValue::Numeric(0.5)]).unwrap(), 0);
    }
}
