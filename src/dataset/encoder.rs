//! Numeric encoding of records for model input

use super::{Dataset, FeatureKind, FeatureValue};
use crate::error::{FairBalanceError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum ColumnEncoding {
    Scalar,
    Categorical(Vec<String>),
    List(usize),
}

impl ColumnEncoding {
    fn width(&self) -> usize {
        match self {
            ColumnEncoding::Scalar | ColumnEncoding::Categorical(_) => 1,
            ColumnEncoding::List(width) => *width,
        }
    }
}

/// Maps records to fixed-width numeric rows.
///
/// Categories are coded by their position in the sorted set of values seen
/// during fitting; unseen categories get the next free code. Lists are
/// padded with zeros to the widest list seen during fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEncoder {
    columns: Vec<ColumnEncoding>,
    width: usize,
}

impl FeatureEncoder {
    /// Learn category dictionaries and list widths from a dataset
    pub fn fit(dataset: &Dataset) -> Self {
        let columns: Vec<ColumnEncoding> = dataset
            .schema()
            .features()
            .iter()
            .enumerate()
            .map(|(j, spec)| match spec.kind {
                FeatureKind::Numeric | FeatureKind::Boolean => ColumnEncoding::Scalar,
                FeatureKind::Categorical => {
                    let mut categories: Vec<String> = dataset
                        .records()
                        .iter()
                        .filter_map(|r| match &r.values[j] {
                            FeatureValue::Categorical(s) => Some(s.clone()),
                            _ => None,
                        })
                        .collect();
                    categories.sort();
                    categories.dedup();
                    ColumnEncoding::Categorical(categories)
                }
                FeatureKind::List => {
                    let width = dataset
                        .records()
                        .iter()
                        .map(|r| match &r.values[j] {
                            FeatureValue::List(items) => items.len(),
                            _ => 0,
                        })
                        .max()
                        .unwrap_or(0);
                    ColumnEncoding::List(width)
                }
            })
            .collect();

        let width = columns.iter().map(ColumnEncoding::width).sum();
        Self { columns, width }
    }

    /// Number of numeric columns produced per record
    pub fn width(&self) -> usize {
        self.width
    }

    /// Encode one record's feature values
    pub fn encode_values(&self, values: &[FeatureValue]) -> Result<Vec<f64>> {
        if values.len() != self.columns.len() {
            return Err(FairBalanceError::ShapeError {
                expected: format!("{} feature values", self.columns.len()),
                actual: format!("{} feature values", values.len()),
            });
        }

        let mut row = Vec::with_capacity(self.width);
        for (encoding, value) in self.columns.iter().zip(values.iter()) {
            match (encoding, value) {
                (ColumnEncoding::Scalar, v) => {
                    let x = v.as_f64().ok_or_else(|| {
                        FairBalanceError::DataError(format!("Expected a scalar value, got {}", v.kind()))
                    })?;
                    row.push(x);
                }
                (ColumnEncoding::Categorical(categories), FeatureValue::Categorical(s)) => {
                    let code = match categories.binary_search(s) {
                        Ok(pos) => pos,
                        Err(_) => categories.len(),
                    };
                    row.push(code as f64);
                }
                (ColumnEncoding::List(width), FeatureValue::List(items)) => {
                    row.extend((0..*width).map(|i| items.get(i).copied().unwrap_or(0.0)));
                }
                (_, v) => {
                    return Err(FairBalanceError::DataError(format!(
                        "Value of kind {} does not match the fitted encoding",
                        v.kind()
                    )));
                }
            }
        }
        Ok(row)
    }

    /// Encode a whole dataset into a feature matrix and a label vector
    pub fn encode(&self, dataset: &Dataset) -> Result<(Array2<f64>, Array1<f64>)> {
        let n_rows = dataset.len();
        let mut flat = Vec::with_capacity(n_rows * self.width);
        for record in dataset.records() {
            flat.extend(self.encode_values(&record.values)?);
        }
        let x = Array2::from_shape_vec((n_rows, self.width), flat)?;
        let y: Array1<f64> = dataset.records().iter().map(|r| r.label as f64).collect();
        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{FeatureSpec, Record, Schema};

    fn mixed_dataset() -> Dataset {
        let schema = Schema::new(
            vec![
                FeatureSpec::numeric("income"),
                FeatureSpec::new("co_applicant", FeatureKind::Boolean),
                FeatureSpec::new("product", FeatureKind::Categorical),
                FeatureSpec::new("history", FeatureKind::List),
            ],
            "action_taken",
        );
        Dataset::from_records(
            schema,
            vec![
                Record::new(
                    vec![
                        FeatureValue::Numeric(0.5),
                        FeatureValue::Boolean(true),
                        FeatureValue::Categorical("fha".into()),
                        FeatureValue::List(vec![1.0, 2.0]),
                    ],
                    1,
                ),
                Record::new(
                    vec![
                        FeatureValue::Numeric(0.1),
                        FeatureValue::Boolean(false),
                        FeatureValue::Categorical("conventional".into()),
                        FeatureValue::List(vec![3.0]),
                    ],
                    0,
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_encode_mixed_kinds() {
        let ds = mixed_dataset();
        let encoder = FeatureEncoder::fit(&ds);
        assert_eq!(encoder.width(), 5);

        let (x, y) = encoder.encode(&ds).unwrap();
        assert_eq!(x.nrows(), 2);
        assert_eq!(x.row(0).to_vec(), vec![0.5, 1.0, 1.0, 1.0, 2.0]);
        assert_eq!(x.row(1).to_vec(), vec![0.1, 0.0, 0.0, 3.0, 0.0]);
        assert_eq!(y.to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_unseen_category_gets_next_code() {
        let ds = mixed_dataset();
        let encoder = FeatureEncoder::fit(&ds);
        let row = encoder
            .encode_values(&[
                FeatureValue::Numeric(0.0),
                FeatureValue::Boolean(false),
                FeatureValue::Categorical("va".into()),
                FeatureValue::List(vec![]),
            ])
            .unwrap();
        assert_eq!(row[2], 2.0);
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let ds = mixed_dataset();
        let encoder = FeatureEncoder::fit(&ds);
        assert!(encoder.encode_values(&[FeatureValue::Numeric(0.0)]).is_err());
    }
}
