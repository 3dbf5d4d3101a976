//! SMOTE-style synthesis of labelled records

use super::interpolate::{Interpolation, InterpolationParams, SynthesisStrategy};
use super::neighbors::{nearest_neighbors, DistanceMetric, NeighborSampler};
use crate::dataset::{Dataset, Label, Record};
use crate::error::{FairBalanceError, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Oversampled dataset and the number of records synthesized per class
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub dataset: Dataset,
    pub n_synthetic: BTreeMap<Label, usize>,
}

impl SynthesisResult {
    pub fn total_synthetic(&self) -> usize {
        self.n_synthetic.values().sum()
    }
}

/// Each of `classes` targeted at the largest class count.
///
/// A listed class with no rows still gets a target, so synthesizing for it
/// fails with [`FairBalanceError::EmptyMinorityClass`] instead of being skipped.
pub fn majority_targets(dataset: &Dataset, classes: &[Label]) -> BTreeMap<Label, usize> {
    let counts = dataset.class_counts();
    let majority = counts.values().copied().max().unwrap_or(0);
    classes.iter().map(|&class| (class, majority)).collect()
}

/// Generates synthetic records of a class from its existing members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticRecordSynthesizer {
    strategy: SynthesisStrategy,
    /// Number of nearest neighbors consulted per anchor
    k_neighbors: usize,
    metric: DistanceMetric,
    params: InterpolationParams,
}

impl SyntheticRecordSynthesizer {
    pub fn new(strategy: SynthesisStrategy) -> Self {
        Self {
            strategy,
            k_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            params: InterpolationParams::default(),
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_params(mut self, params: InterpolationParams) -> Self {
        self.params = params;
        self
    }

    pub fn strategy(&self) -> SynthesisStrategy {
        self.strategy
    }

    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    /// Oversample each class in `targets` up to its target count.
    ///
    /// Original records come first, synthetic ones follow. Classes already at
    /// or above their target are left alone.
    pub fn synthesize<R: Rng>(
        &self,
        dataset: &Dataset,
        targets: &BTreeMap<Label, usize>,
        rng: &mut R,
    ) -> Result<SynthesisResult> {
        let mut out = dataset.clone();
        let mut n_synthetic = BTreeMap::new();

        for (&class, &target) in targets {
            let count = dataset.count_label(class);
            if target <= count {
                continue;
            }
            let records = self.generate(dataset, class, target - count, rng)?;
            n_synthetic.insert(class, records.len());
            for record in records {
                out.push(record)?;
            }
        }

        Ok(SynthesisResult {
            dataset: out,
            n_synthetic,
        })
    }

    /// `count` new records labelled `class`, anchored on that class's members
    pub fn generate<R: Rng>(&self, dataset: &Dataset, class: Label, count: usize, rng: &mut R) -> Result<Vec<Record>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let members: Vec<Record> = dataset
            .records()
            .iter()
            .filter(|r| r.label == class)
            .cloned()
            .collect();
        if members.is_empty() {
            return Err(FairBalanceError::EmptyMinorityClass { class });
        }

        let records = match self.strategy {
            SynthesisStrategy::Smote => self.generate_smote(&members, class, count, rng)?,
            SynthesisStrategy::Crossover => self.generate_crossover(&members, class, count, rng)?,
        };
        debug!(
            class,
            count,
            members = members.len(),
            strategy = ?self.strategy,
            "Generated synthetic records"
        );
        Ok(records)
    }

    fn generate_smote<R: Rng>(&self, members: &[Record], class: Label, count: usize, rng: &mut R) -> Result<Vec<Record>> {
        // Neighbor sets include the anchor, so a lone member pairs with itself
        let k = self.k_neighbors.min(members.len()).max(1);
        let mut neighbor_cache: Vec<Option<Vec<usize>>> = vec![None; members.len()];
        let mut out = Vec::with_capacity(count);

        for _ in 0..count {
            let anchor = rng.gen_range(0..members.len());
            let neighbors = neighbor_cache[anchor]
                .get_or_insert_with(|| nearest_neighbors(members, anchor, k, self.metric, true));
            let neighbor = neighbors[rng.gen_range(0..neighbors.len())];
            let gap: f64 = rng.gen();
            out.push(self.combine(&members[anchor], &members[neighbor], &members[neighbor], gap, class, rng)?);
        }
        Ok(out)
    }

    fn generate_crossover<R: Rng>(
        &self,
        members: &[Record],
        class: Label,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Record>> {
        let k = self.k_neighbors.min(members.len().saturating_sub(1)).max(2);
        let sampler = NeighborSampler::new(k, self.metric)?;
        let mut out = Vec::with_capacity(count);

        for _ in 0..count {
            let triple = sampler
                .sample_with_neighbors(members, rng)
                .map_err(|e| e.for_class(class))?;
            out.push(self.combine(triple.anchor, triple.first, triple.second, 0.0, class, rng)?);
        }
        Ok(out)
    }

    fn combine<R: Rng>(
        &self,
        anchor: &Record,
        first: &Record,
        second: &Record,
        gap: f64,
        class: Label,
        rng: &mut R,
    ) -> Result<Record> {
        let ctx = Interpolation {
            strategy: self.strategy,
            params: &self.params,
            gap,
        };
        let mut values = Vec::with_capacity(anchor.values.len());
        for ((a, b), c) in anchor.values.iter().zip(&first.values).zip(&second.values) {
            values.push(a.kind().interpolator().interpolate(a, b, c, &ctx, &mut *rng)?);
        }
        Ok(Record::new(values, class))
    }
}

impl Default for SyntheticRecordSynthesizer {
    fn default() -> Self {
        Self::new(SynthesisStrategy::Smote)
    }
}
