//! Nearest-neighbor search over records

use crate::dataset::{FeatureValue, Record};
use crate::error::{FairBalanceError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Ordered (distance, index) pair for BinaryHeap-based partial sort.
/// Ties on distance fall back to the row index.
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// Distance metric over feature values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Euclidean
    }
}

impl DistanceMetric {
    /// Metric for a Minkowski exponent (1 and 2 map to the named metrics)
    pub fn from_exponent(p: f64) -> Result<Self> {
        if !(p.is_finite() && p > 0.0) {
            return Err(FairBalanceError::InvalidParameter {
                name: "distance_exponent".to_string(),
                value: p.to_string(),
                reason: "must be a positive number".to_string(),
            });
        }
        Ok(if p == 1.0 {
            Self::Manhattan
        } else if p == 2.0 {
            Self::Euclidean
        } else {
            Self::Minkowski(p)
        })
    }

    /// Distance between two feature vectors of the same schema.
    ///
    /// Booleans and categories contribute 0 when equal and 1 otherwise;
    /// lists contribute element-wise, missing elements count as 0.
    pub fn distance(&self, a: &[FeatureValue], b: &[FeatureValue]) -> f64 {
        let mut acc = 0.0;
        for (x, y) in a.iter().zip(b.iter()) {
            for_each_difference(x, y, |d| {
                acc += match self {
                    DistanceMetric::Euclidean => d * d,
                    DistanceMetric::Manhattan => d,
                    DistanceMetric::Minkowski(p) => d.powf(*p),
                }
            });
        }
        match self {
            DistanceMetric::Euclidean => acc.sqrt(),
            DistanceMetric::Manhattan => acc,
            DistanceMetric::Minkowski(p) => acc.powf(1.0 / p),
        }
    }
}

fn for_each_difference<F: FnMut(f64)>(a: &FeatureValue, b: &FeatureValue, mut f: F) {
    match (a, b) {
        (FeatureValue::Numeric(x), FeatureValue::Numeric(y)) => f((x - y).abs()),
        (FeatureValue::Boolean(x), FeatureValue::Boolean(y)) => f(if x == y { 0.0 } else { 1.0 }),
        (FeatureValue::Categorical(x), FeatureValue::Categorical(y)) => f(if x == y { 0.0 } else { 1.0 }),
        (FeatureValue::List(x), FeatureValue::List(y)) => {
            for i in 0..x.len().max(y.len()) {
                let xi = x.get(i).copied().unwrap_or(0.0);
                let yi = y.get(i).copied().unwrap_or(0.0);
                f((xi - yi).abs());
            }
        }
        _ => f(1.0),
    }
}

/// Indices of the `k` records closest to `records[anchor]`, nearest first.
///
/// With `include_anchor` the anchor is rank 0 of the result (it is its own
/// nearest neighbor at distance 0), otherwise it is left out. Distinct rows
/// with identical values are distinct neighbors; ties are broken by index.
/// Search is brute force, so there is no index to rebuild between calls.
pub fn nearest_neighbors(
    records: &[Record],
    anchor: usize,
    k: usize,
    metric: DistanceMetric,
    include_anchor: bool,
) -> Vec<usize> {
    let others = if include_anchor { k.saturating_sub(1) } else { k };
    let point = &records[anchor].values;
    let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(others + 1);

    for (i, record) in records.iter().enumerate() {
        if i == anchor {
            continue;
        }
        let entry = DistIdx(metric.distance(point, &record.values), i);
        if heap.len() < others {
            heap.push(entry);
        } else if let Some(&top) = heap.peek() {
            if entry < top {
                heap.pop();
                heap.push(entry);
            }
        }
    }

    let mut ranked: Vec<usize> = heap.into_sorted_vec().into_iter().map(|DistIdx(_, i)| i).collect();
    if include_anchor && k > 0 {
        ranked.insert(0, anchor);
    }
    ranked
}

/// A random anchor and its two nearest distinct neighbors
#[derive(Debug, Clone, Copy)]
pub struct NeighborTriple<'a> {
    pub anchor_index: usize,
    pub neighbor_indices: [usize; 2],
    pub anchor: &'a Record,
    pub first: &'a Record,
    pub second: &'a Record,
}

/// Draws a uniformly random anchor together with its two nearest neighbors
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NeighborSampler {
    k: usize,
    metric: DistanceMetric,
}

impl NeighborSampler {
    /// Sampler consulting `k` neighbors (excluding the anchor); `k` must be at least 2
    pub fn new(k: usize, metric: DistanceMetric) -> Result<Self> {
        if k < 2 {
            return Err(FairBalanceError::InvalidParameter {
                name: "k".to_string(),
                value: k.to_string(),
                reason: "neighbor sampling needs at least 2 neighbors".to_string(),
            });
        }
        Ok(Self { k, metric })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Pick an anchor uniformly at random and return it with the records at
    /// neighbor ranks 1 and 2 (rank 0 is the anchor itself).
    pub fn sample_with_neighbors<'a, R: Rng + ?Sized>(
        &self,
        records: &'a [Record],
        rng: &mut R,
    ) -> Result<NeighborTriple<'a>> {
        let required = self.k + 1;
        if records.len() < required {
            return Err(FairBalanceError::InsufficientData {
                required,
                available: records.len(),
                class: None,
            });
        }

        let anchor = rng.gen_range(0..records.len());
        let ranked = nearest_neighbors(records, anchor, self.k + 1, self.metric, true);
        let (first, second) = (ranked[1], ranked[2]);

        Ok(NeighborTriple {
            anchor_index: anchor,
            neighbor_indices: [first, second],
            anchor: &records[anchor],
            first: &records[first],
            second: &records[second],
        })
    }
}
