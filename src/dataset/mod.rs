//! Tabular dataset model
//!
//! A [`Dataset`] is an ordered collection of [`Record`]s sharing one
//! [`Schema`]. Each column carries a fixed [`FeatureKind`], and every record
//! carries a binary label that is logically the last column.

mod encoder;
mod io;

pub use encoder::FeatureEncoder;
pub use io::{dataframe_to_dataset, dataset_to_dataframe, load_dataframe, load_dataset, write_dataset};

use crate::error::{FairBalanceError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Class label type
pub type Label = i64;

/// Label of favorable outcomes (e.g. an approved application)
pub const POSITIVE_LABEL: Label = 1;

/// Label of unfavorable outcomes
pub const NEGATIVE_LABEL: Label = 0;

/// Tolerance used when comparing numeric attribute values
pub const VALUE_TOLERANCE: f64 = 1e-9;

/// Kind of a feature column, fixed at schema-definition time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Continuous or ordinal-encoded value
    Numeric,
    /// True/false flag
    Boolean,
    /// Free-form category
    Categorical,
    /// Fixed-meaning numeric vector
    List,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureKind::Numeric => "numeric",
            FeatureKind::Boolean => "boolean",
            FeatureKind::Categorical => "categorical",
            FeatureKind::List => "list",
        };
        f.write_str(name)
    }
}

/// A single feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    Numeric(f64),
    Boolean(bool),
    Categorical(String),
    List(Vec<f64>),
}

impl FeatureValue {
    /// Kind of this value
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureValue::Numeric(_) => FeatureKind::Numeric,
            FeatureValue::Boolean(_) => FeatureKind::Boolean,
            FeatureValue::Categorical(_) => FeatureKind::Categorical,
            FeatureValue::List(_) => FeatureKind::List,
        }
    }

    /// Scalar view of the value (booleans as 0/1)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Numeric(v) => Some(*v),
            FeatureValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Equality with a tolerance on numeric payloads.
    pub fn matches(&self, other: &FeatureValue) -> bool {
        match (self, other) {
            (FeatureValue::Numeric(a), FeatureValue::Numeric(b)) => (a - b).abs() <= VALUE_TOLERANCE,
            (FeatureValue::List(a), FeatureValue::List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= VALUE_TOLERANCE)
            }
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Numeric(v) => write!(f, "{}", v),
            FeatureValue::Boolean(b) => write!(f, "{}", b),
            FeatureValue::Categorical(s) => f.write_str(s),
            FeatureValue::List(items) => {
                let joined: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&joined.join(";"))
            }
        }
    }
}

/// Name and kind of one feature column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>, kind: FeatureKind) -> Self {
        Self { name: name.into(), kind }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, FeatureKind::Numeric)
    }
}

/// Column layout shared by every record of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    features: Vec<FeatureSpec>,
    label: String,
}

impl Schema {
    /// Create a schema from feature columns and the label column name
    pub fn new(features: Vec<FeatureSpec>, label: impl Into<String>) -> Self {
        Self {
            features,
            label: label.into(),
        }
    }

    /// Schema where every feature is numeric
    pub fn numeric(names: &[&str], label: impl Into<String>) -> Self {
        Self::new(names.iter().map(|n| FeatureSpec::numeric(*n)).collect(), label)
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Position of a feature column
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.features
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| FairBalanceError::FeatureNotFound(name.to_string()))
    }

    /// Header in output order: features, then the label
    pub fn column_names(&self) -> Vec<String> {
        self.features
            .iter()
            .map(|f| f.name.clone())
            .chain(std::iter::once(self.label.clone()))
            .collect()
    }
}

/// One row: feature values plus the binary outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub values: Vec<FeatureValue>,
    pub label: Label,
}

impl Record {
    pub fn new(values: Vec<FeatureValue>, label: Label) -> Self {
        Self { values, label }
    }

    /// Record built from plain numeric features
    pub fn numeric(values: &[f64], label: Label) -> Self {
        Self::new(values.iter().map(|&v| FeatureValue::Numeric(v)).collect(), label)
    }
}

/// Ordered collection of records with a fixed schema
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Arc<Schema>,
    records: Vec<Record>,
}

impl Dataset {
    /// Empty dataset with the given schema
    pub fn new(schema: Schema) -> Self {
        Self::with_schema(Arc::new(schema))
    }

    /// Empty dataset sharing an existing schema
    pub fn with_schema(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    /// Build a dataset, validating every record against the schema
    pub fn from_records(schema: Schema, records: Vec<Record>) -> Result<Self> {
        let mut dataset = Self::new(schema);
        dataset.records.reserve(records.len());
        for record in records {
            dataset.push(record)?;
        }
        Ok(dataset)
    }

    /// Convenience constructor for all-numeric data
    pub fn from_numeric(names: &[&str], label: &str, rows: Vec<(Vec<f64>, Label)>) -> Result<Self> {
        let records = rows
            .into_iter()
            .map(|(values, label)| Record::numeric(&values, label))
            .collect();
        Self::from_records(Schema::numeric(names, label), records)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Shared handle to the schema, for building sibling datasets
    pub fn schema_arc(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record after checking width and kinds
    pub fn push(&mut self, record: Record) -> Result<()> {
        self.validate(&record)?;
        self.records.push(record);
        Ok(())
    }

    /// Append all records of another dataset with the same schema
    pub fn extend(&mut self, other: Dataset) -> Result<()> {
        if *other.schema != *self.schema {
            return Err(FairBalanceError::ValidationError(
                "Cannot concatenate datasets with different schemas".to_string(),
            ));
        }
        self.records.extend(other.records);
        Ok(())
    }

    /// Concatenate datasets sharing `schema`
    pub fn concat(schema: Arc<Schema>, parts: Vec<Dataset>) -> Result<Dataset> {
        let mut out = Dataset::with_schema(schema);
        for part in parts {
            out.extend(part)?;
        }
        Ok(out)
    }

    /// New dataset made of the given row indices, in order
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            schema: self.schema_arc(),
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
        }
    }

    /// New dataset without the given row indices
    pub fn without(&self, removed: &BTreeSet<usize>) -> Dataset {
        Dataset {
            schema: self.schema_arc(),
            records: self
                .records
                .iter()
                .enumerate()
                .filter(|(i, _)| !removed.contains(i))
                .map(|(_, r)| r.clone())
                .collect(),
        }
    }

    /// Records with the given label
    pub fn filter_label(&self, label: Label) -> Dataset {
        Dataset {
            schema: self.schema_arc(),
            records: self.records.iter().filter(|r| r.label == label).cloned().collect(),
        }
    }

    /// Shuffle rows in place
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.records.shuffle(rng);
    }

    /// Number of records per label
    pub fn class_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.label).or_insert(0) += 1;
        }
        counts
    }

    /// Row indices per label
    pub fn class_indices(&self) -> BTreeMap<Label, Vec<usize>> {
        let mut indices: BTreeMap<Label, Vec<usize>> = BTreeMap::new();
        for (i, record) in self.records.iter().enumerate() {
            indices.entry(record.label).or_default().push(i);
        }
        indices
    }

    pub fn count_label(&self, label: Label) -> usize {
        self.records.iter().filter(|r| r.label == label).count()
    }

    /// Distinct values of a column in order of first appearance
    pub fn unique_values(&self, column: usize) -> Vec<FeatureValue> {
        let mut uniques: Vec<FeatureValue> = Vec::new();
        for record in &self.records {
            let value = &record.values[column];
            if !uniques.iter().any(|u| u.matches(value)) {
                uniques.push(value.clone());
            }
        }
        uniques
    }

    /// Replace every record with a transformed copy; the schema must still hold
    pub fn map_records<F>(&self, mut f: F) -> Result<Dataset>
    where
        F: FnMut(&Record) -> Record,
    {
        let mut out = Dataset::with_schema(self.schema_arc());
        out.records.reserve(self.records.len());
        for record in &self.records {
            out.push(f(record))?;
        }
        Ok(out)
    }

    fn validate(&self, record: &Record) -> Result<()> {
        let expected = self.schema.n_features();
        if record.values.len() != expected {
            return Err(FairBalanceError::ShapeError {
                expected: format!("{} feature values", expected),
                actual: format!("{} feature values", record.values.len()),
            });
        }
        for (spec, value) in self.schema.features.iter().zip(record.values.iter()) {
            if spec.kind != value.kind() {
                return Err(FairBalanceError::ValidationError(format!(
                    "Column '{}' expects {} values, got {}",
                    spec.name,
                    spec.kind,
                    value.kind()
                )));
            }
        }
        Ok(())
    }
}
