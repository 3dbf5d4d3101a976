//! Protected-attribute combinations and subgroup partitioning

use crate::dataset::{Dataset, FeatureValue, Label, NEGATIVE_LABEL, POSITIVE_LABEL};
use crate::error::{FairBalanceError, Result};
use serde::{Deserialize, Serialize};

/// Cartesian product of the observed values of each protected attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationSpace {
    attributes: Vec<String>,
    columns: Vec<usize>,
    values: Vec<Vec<FeatureValue>>,
}

impl CombinationSpace {
    /// Space over explicit value sets; `columns` index the dataset features
    pub fn new(attributes: Vec<String>, columns: Vec<usize>, values: Vec<Vec<FeatureValue>>) -> Result<Self> {
        if attributes.is_empty() {
            return Err(FairBalanceError::ConfigError(
                "At least one protected attribute is required".to_string(),
            ));
        }
        if attributes.len() != columns.len() || attributes.len() != values.len() {
            return Err(FairBalanceError::ShapeError {
                expected: format!("{} columns and value sets", attributes.len()),
                actual: format!("{} columns, {} value sets", columns.len(), values.len()),
            });
        }
        Ok(Self {
            attributes,
            columns,
            values,
        })
    }

    /// Space over the unique values observed in `dataset`, in order of first appearance
    pub fn from_dataset(dataset: &Dataset, attributes: &[String]) -> Result<Self> {
        let columns = attributes
            .iter()
            .map(|name| dataset.schema().index_of(name))
            .collect::<Result<Vec<_>>>()?;
        let values = columns.iter().map(|&c| dataset.unique_values(c)).collect();
        Self::new(attributes.to_vec(), columns, values)
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn values(&self) -> &[Vec<FeatureValue>] {
        &self.values
    }

    /// Number of combinations
    pub fn len(&self) -> usize {
        self.values.iter().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination; the first attribute varies slowest
    pub fn combinations(&self) -> Vec<Vec<FeatureValue>> {
        let mut combos: Vec<Vec<FeatureValue>> = vec![Vec::with_capacity(self.values.len())];
        for attr_values in &self.values {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    attr_values.iter().map(move |v| {
                        let mut combo = prefix.clone();
                        combo.push(v.clone());
                        combo
                    })
                })
                .collect();
        }
        combos
    }

    /// Position of the combination a record's attribute values fall into
    pub fn position_of(&self, values: &[FeatureValue]) -> Option<usize> {
        let mut position = 0;
        for (attr_values, &column) in self.values.iter().zip(&self.columns) {
            let value = values.get(column)?;
            let slot = attr_values.iter().position(|v| v.matches(value))?;
            position = position * attr_values.len() + slot;
        }
        Some(position)
    }

    /// Human-readable key, e.g. `derived_race=0.5, derived_sex=1`
    pub fn key(&self, combination: &[FeatureValue]) -> String {
        self.attributes
            .iter()
            .zip(combination)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Rows of one attribute combination
#[derive(Debug, Clone, PartialEq)]
pub struct Subgroup {
    pub key: String,
    pub values: Vec<FeatureValue>,
    pub indices: Vec<usize>,
    pub positives: usize,
    pub negatives: usize,
}

impl Subgroup {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Larger and smaller of the two class counts
    pub fn max_min(&self) -> (usize, usize) {
        (self.positives.max(self.negatives), self.positives.min(self.negatives))
    }
}

/// Disjoint subgroups, one per combination (empty ones included), plus the
/// rows whose attribute values fall outside the space.
#[derive(Debug, Clone)]
pub struct Partition {
    pub subgroups: Vec<Subgroup>,
    pub unassigned: Vec<usize>,
}

/// Split `dataset` by the combinations of `space`
pub fn partition(dataset: &Dataset, space: &CombinationSpace) -> Partition {
    let mut subgroups: Vec<Subgroup> = space
        .combinations()
        .into_iter()
        .map(|values| Subgroup {
            key: space.key(&values),
            values,
            indices: Vec::new(),
            positives: 0,
            negatives: 0,
        })
        .collect();
    let mut unassigned = Vec::new();

    for (i, record) in dataset.records().iter().enumerate() {
        match space.position_of(&record.values) {
            Some(pos) => {
                let group = &mut subgroups[pos];
                group.indices.push(i);
                count_label(group, record.label);
            }
            None => unassigned.push(i),
        }
    }

    Partition {
        subgroups,
        unassigned,
    }
}

fn count_label(group: &mut Subgroup, label: Label) {
    if label == POSITIVE_LABEL {
        group.positives += 1;
    } else if label == NEGATIVE_LABEL {
        group.negatives += 1;
    }
}

/// Median of all positive and negative subgroup counts, rounded half to even
pub fn median_target(subgroups: &[Subgroup]) -> usize {
    let mut counts: Vec<usize> = subgroups.iter().flat_map(|g| [g.positives, g.negatives]).collect();
    if counts.is_empty() {
        return 0;
    }
    counts.sort_unstable();
    let mid = counts.len() / 2;
    let median = if counts.len() % 2 == 0 {
        (counts[mid - 1] + counts[mid]) as f64 / 2.0
    } else {
        counts[mid] as f64
    };
    median.round_ties_even() as usize
}
