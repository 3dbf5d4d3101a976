//! Feature scaling

use crate::dataset::{Dataset, FeatureKind, FeatureValue, Record};
use crate::error::{FairBalanceError, Result};
use serde::{Deserialize, Serialize};

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // min
    scale: f64,  // range
}

/// Min-Max scaling of numeric features: (x - min) / (max - min)
///
/// Non-numeric columns and the label pass through untouched. Constant
/// columns are shifted to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinMaxScaler {
    params: Vec<Option<ScalerParams>>,
    is_fitted: bool,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit per-column ranges
    pub fn fit(&mut self, dataset: &Dataset) -> Result<&mut Self> {
        self.params = dataset
            .schema()
            .features()
            .iter()
            .enumerate()
            .map(|(j, spec)| {
                if spec.kind != FeatureKind::Numeric {
                    return None;
                }
                let (min, max) = dataset
                    .records()
                    .iter()
                    .filter_map(|r| r.values[j].as_f64())
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
                if !min.is_finite() || !max.is_finite() {
                    return Some(ScalerParams { center: 0.0, scale: 1.0 });
                }
                let range = max - min;
                Some(ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                })
            })
            .collect();

        self.is_fitted = true;
        Ok(self)
    }

    /// Scale a dataset with the fitted ranges
    pub fn transform(&self, dataset: &Dataset) -> Result<Dataset> {
        if !self.is_fitted {
            return Err(FairBalanceError::ModelNotFitted);
        }
        if self.params.len() != dataset.schema().n_features() {
            return Err(FairBalanceError::ShapeError {
                expected: format!("{} features", self.params.len()),
                actual: format!("{} features", dataset.schema().n_features()),
            });
        }

        dataset.map_records(|record| {
            let values = record
                .values
                .iter()
                .zip(self.params.iter())
                .map(|(value, params)| match (value, params) {
                    (FeatureValue::Numeric(v), Some(p)) => FeatureValue::Numeric((v - p.center) / p.scale),
                    (other, _) => other.clone(),
                })
                .collect();
            Record::new(values, record.label)
        })
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, dataset: &Dataset) -> Result<Dataset> {
        self.fit(dataset)?;
        self.transform(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minmax_scaler() {
        let ds = Dataset::from_numeric(
            &["a", "sex"],
            "y",
            vec![
                (vec![1.0, 0.0], 0),
                (vec![3.0, 1.0], 1),
                (vec![5.0, 2.0], 1),
            ],
        )
        .unwrap();

        let mut scaler = MinMaxScaler::new();
        let scaled = scaler.fit_transform(&ds).unwrap();

        let a: Vec<f64> = scaled.records().iter().map(|r| r.values[0].as_f64().unwrap()).collect();
        let sex: Vec<f64> = scaled.records().iter().map(|r| r.values[1].as_f64().unwrap()).collect();
        assert_eq!(a, vec![0.0, 0.5, 1.0]);
        assert_eq!(sex, vec![0.0, 0.5, 1.0]);
        assert_eq!(scaled.records()[2].label, 1);
    }

    #[test]
    fn test_constant_column() {
        let ds = Dataset::from_numeric(&["c"], "y", vec![(vec![5.0], 0), (vec![5.0], 1)]).unwrap();
        let scaled = MinMaxScaler::new().fit_transform(&ds).unwrap();
        assert!(scaled.records().iter().all(|r| r.values[0] == FeatureValue::Numeric(0.0)));
    }

    #[test]
    fn test_transform_before_fit() {
        let ds = Dataset::from_numeric(&["c"], "y", vec![(vec![5.0], 0)]).unwrap();
        let scaler = MinMaxScaler::new();
        assert!(matches!(scaler.transform(&ds), Err(FairBalanceError::ModelNotFitted)));
    }
}
