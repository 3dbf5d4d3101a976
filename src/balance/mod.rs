//! Per-subgroup rebalancing
//!
//! The dataset is partitioned by every combination of protected-attribute
//! values. A single target (the median class count over all subgroups) is
//! computed from the pre-balancing distribution, then each subgroup is
//! oversampled, undersampled, or both, until its two classes sit at the
//! target.

mod subgroup;

pub use subgroup::{median_target, partition, CombinationSpace, Partition, Subgroup};

use crate::dataset::{Dataset, NEGATIVE_LABEL, POSITIVE_LABEL};
use crate::error::{FairBalanceError, Result};
use crate::synthetic::{
    majority_targets, match_minority, trim_to_target, DistanceMetric, InterpolationParams, SynthesisStrategy,
    SyntheticRecordSynthesizer,
};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Balancer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Nearest neighbors consulted per anchor
    pub k_neighbors: usize,
    /// Minkowski exponent of the neighbor distance
    pub distance_exponent: f64,
    pub crossover_probability: f64,
    pub interpolation_factor: f64,
    /// Strategy of the first oversampling stage (minority up to majority)
    pub smote_strategy: SynthesisStrategy,
    /// Strategy used to fill classes up to the target
    pub generation_strategy: SynthesisStrategy,
    pub seed: Option<u64>,
    /// Keep a failing subgroup's original rows instead of aborting
    pub skip_failed_subgroups: bool,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            distance_exponent: 2.0,
            crossover_probability: 0.8,
            interpolation_factor: 0.8,
            smote_strategy: SynthesisStrategy::Smote,
            generation_strategy: SynthesisStrategy::Crossover,
            seed: None,
            skip_failed_subgroups: false,
        }
    }
}

impl BalancerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k;
        self
    }

    pub fn with_distance_exponent(mut self, p: f64) -> Self {
        self.distance_exponent = p;
        self
    }

    pub fn with_crossover_probability(mut self, cr: f64) -> Self {
        self.crossover_probability = cr;
        self
    }

    pub fn with_interpolation_factor(mut self, f: f64) -> Self {
        self.interpolation_factor = f;
        self
    }

    pub fn with_smote_strategy(mut self, strategy: SynthesisStrategy) -> Self {
        self.smote_strategy = strategy;
        self
    }

    pub fn with_generation_strategy(mut self, strategy: SynthesisStrategy) -> Self {
        self.generation_strategy = strategy;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_skip_failed_subgroups(mut self, skip: bool) -> Self {
        self.skip_failed_subgroups = skip;
        self
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.k_neighbors < 1 {
            return Err(invalid("k_neighbors", self.k_neighbors, "must be at least 1"));
        }
        DistanceMetric::from_exponent(self.distance_exponent)?;
        for (name, value) in [
            ("crossover_probability", self.crossover_probability),
            ("interpolation_factor", self.interpolation_factor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(name, value, "must be within [0, 1]"));
            }
        }
        Ok(())
    }

    fn interpolation_params(&self) -> InterpolationParams {
        InterpolationParams {
            crossover_probability: self.crossover_probability,
            factor: self.interpolation_factor,
        }
    }
}

fn invalid(name: &str, value: impl fmt::Display, reason: &str) -> FairBalanceError {
    FairBalanceError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// What happens to a subgroup, decided from its class counts and the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceAction {
    /// No rows; nothing to do
    Empty,
    /// Neither class above target: SMOTE, then fill to target
    Oversample,
    /// Closer to raising the minority: SMOTE, then match minority and trim
    OversampleThenTrim,
    /// Closer to cutting the majority: match minority, then fill to target
    UndersampleThenFill,
    /// Both classes at or above target: match minority, then trim
    Undersample,
    /// Both classes sit exactly at the target; rows are kept as they are
    Retain,
}

impl BalanceAction {
    /// Classify a subgroup from its larger and smaller class count
    pub fn classify(max_count: usize, min_count: usize, target: usize) -> Self {
        if max_count == 0 {
            return BalanceAction::Empty;
        }
        if max_count == target && min_count == target {
            return BalanceAction::Retain;
        }
        // a majority already at the target only needs the minority raised
        if max_count <= target {
            return BalanceAction::Oversample;
        }
        if min_count < target {
            if target - min_count <= max_count - target {
                BalanceAction::OversampleThenTrim
            } else {
                BalanceAction::UndersampleThenFill
            }
        } else {
            // matching the minority lands on the target when min == target
            BalanceAction::Undersample
        }
    }

    /// Whether the subgroup finishes with a trim to target
    pub fn trims(self) -> bool {
        matches!(self, BalanceAction::OversampleThenTrim | BalanceAction::Undersample)
    }

    /// Whether the subgroup finishes with synthesis up to target
    pub fn fills(self) -> bool {
        matches!(self, BalanceAction::Oversample | BalanceAction::UndersampleThenFill)
    }
}

impl fmt::Display for BalanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BalanceAction::Empty => "empty",
            BalanceAction::Oversample => "oversample",
            BalanceAction::OversampleThenTrim => "oversample+trim",
            BalanceAction::UndersampleThenFill => "undersample+fill",
            BalanceAction::Undersample => "undersample",
            BalanceAction::Retain => "retain",
        };
        f.write_str(name)
    }
}

/// Result of balancing one subgroup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupOutcome {
    pub key: String,
    pub action: BalanceAction,
    pub positives_before: usize,
    pub negatives_before: usize,
    pub positives_after: usize,
    pub negatives_after: usize,
    pub synthesized: usize,
    pub removed: usize,
    /// Error message when the subgroup was skipped
    pub skipped: Option<String>,
}

/// Summary of a balancing pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub target: usize,
    pub outcomes: Vec<SubgroupOutcome>,
    /// Rows outside every attribute combination, carried over unchanged
    pub unassigned: usize,
}

impl BalanceReport {
    pub fn total_synthesized(&self) -> usize {
        self.outcomes.iter().map(|o| o.synthesized).sum()
    }

    pub fn total_removed(&self) -> usize {
        self.outcomes.iter().map(|o| o.removed).sum()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SubgroupOutcome> {
        self.outcomes.iter().filter(|o| o.skipped.is_some())
    }

    pub fn outcome(&self, key: &str) -> Option<&SubgroupOutcome> {
        self.outcomes.iter().find(|o| o.key == key)
    }
}

/// Planned action for one subgroup
#[derive(Debug, Clone)]
pub struct PlannedSubgroup {
    pub subgroup: Subgroup,
    pub action: BalanceAction,
}

/// Partition, target and per-subgroup actions, before any row is touched
#[derive(Debug, Clone)]
pub struct BalancePlan {
    pub space: CombinationSpace,
    pub target: usize,
    pub subgroups: Vec<PlannedSubgroup>,
    pub unassigned: Vec<usize>,
}

/// Rows produced for one subgroup
struct Processed {
    dataset: Dataset,
    synthesized: usize,
    removed: usize,
}

/// Drives every subgroup's class counts toward the shared target
#[derive(Debug, Clone)]
pub struct SubgroupBalancer {
    config: BalancerConfig,
}

impl SubgroupBalancer {
    pub fn new(config: BalancerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// Balanced copy of `dataset`
    pub fn balance(&self, dataset: &Dataset, protected_attributes: &[String]) -> Result<Dataset> {
        Ok(self.balance_with_report(dataset, protected_attributes)?.0)
    }

    /// Balanced copy of `dataset` together with the per-subgroup report
    pub fn balance_with_report(
        &self,
        dataset: &Dataset,
        protected_attributes: &[String],
    ) -> Result<(Dataset, BalanceReport)> {
        let space = CombinationSpace::from_dataset(dataset, protected_attributes)?;
        self.balance_in_space(dataset, &space)
    }

    /// Partition `dataset` and classify each subgroup
    pub fn plan(&self, dataset: &Dataset, space: &CombinationSpace) -> Result<BalancePlan> {
        check_binary_labels(dataset)?;
        let Partition { subgroups, unassigned } = partition(dataset, space);
        let target = median_target(&subgroups);

        let subgroups = subgroups
            .into_iter()
            .map(|subgroup| {
                let (max_count, min_count) = subgroup.max_min();
                let action = BalanceAction::classify(max_count, min_count, target);
                PlannedSubgroup { subgroup, action }
            })
            .collect();

        Ok(BalancePlan {
            space: space.clone(),
            target,
            subgroups,
            unassigned,
        })
    }

    /// Balance over an existing combination space
    pub fn balance_in_space(&self, dataset: &Dataset, space: &CombinationSpace) -> Result<(Dataset, BalanceReport)> {
        self.config.validate()?;
        let plan = self.plan(dataset, space)?;
        info!(
            balance_target = plan.target,
            subgroups = plan.subgroups.len(),
            rows = dataset.len(),
            "Computed balancing target"
        );

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut trimmed = Vec::new();
        let mut filled = Vec::new();
        let mut untouched = Vec::new();
        let mut outcomes = Vec::with_capacity(plan.subgroups.len());

        for PlannedSubgroup { subgroup, action } in &plan.subgroups {
            let rows = dataset.subset(&subgroup.indices);
            let mut outcome = SubgroupOutcome {
                key: subgroup.key.clone(),
                action: *action,
                positives_before: subgroup.positives,
                negatives_before: subgroup.negatives,
                positives_after: subgroup.positives,
                negatives_after: subgroup.negatives,
                synthesized: 0,
                removed: 0,
                skipped: None,
            };

            match self.process(&rows, &subgroup.key, *action, plan.target, &mut rng) {
                Ok(processed) => {
                    outcome.positives_after = processed.dataset.count_label(POSITIVE_LABEL);
                    outcome.negatives_after = processed.dataset.count_label(NEGATIVE_LABEL);
                    outcome.synthesized = processed.synthesized;
                    outcome.removed = processed.removed;
                    debug!(
                        subgroup = %subgroup.key,
                        action = %action,
                        before = rows.len(),
                        after = processed.dataset.len(),
                        "Balanced subgroup"
                    );
                    if action.trims() {
                        trimmed.push(processed.dataset);
                    } else if action.fills() {
                        filled.push(processed.dataset);
                    } else {
                        untouched.push(processed.dataset);
                    }
                }
                Err(err) if self.config.skip_failed_subgroups => {
                    warn!(subgroup = %subgroup.key, action = %action, error = %err, "Skipping subgroup");
                    outcome.skipped = Some(err.to_string());
                    untouched.push(rows);
                }
                Err(err) => return Err(err),
            }
            outcomes.push(outcome);
        }

        if !plan.unassigned.is_empty() {
            warn!(rows = plan.unassigned.len(), "Rows outside the attribute combinations kept unchanged");
            untouched.push(dataset.subset(&plan.unassigned));
        }

        let parts = trimmed.into_iter().chain(filled).chain(untouched).collect();
        let mut balanced = Dataset::concat(dataset.schema_arc(), parts)?;
        balanced.shuffle(&mut rng);

        let report = BalanceReport {
            target: plan.target,
            outcomes,
            unassigned: plan.unassigned.len(),
        };
        info!(
            rows_before = dataset.len(),
            rows_after = balanced.len(),
            synthesized = report.total_synthesized(),
            removed = report.total_removed(),
            skipped = report.skipped().count(),
            "Balancing complete"
        );
        Ok((balanced, report))
    }

    fn process(
        &self,
        rows: &Dataset,
        key: &str,
        action: BalanceAction,
        target: usize,
        rng: &mut StdRng,
    ) -> Result<Processed> {
        let mut current = Processed {
            dataset: rows.clone(),
            synthesized: 0,
            removed: 0,
        };

        match action {
            BalanceAction::Empty | BalanceAction::Retain => {}
            BalanceAction::Oversample => {
                self.smote(&mut current, rng).map_err(|e| e.in_subgroup(key, "smote"))?;
                self.fill(&mut current, target, rng)
                    .map_err(|e| e.in_subgroup(key, "generate"))?;
            }
            BalanceAction::OversampleThenTrim => {
                self.smote(&mut current, rng).map_err(|e| e.in_subgroup(key, "smote"))?;
                Self::undersample(&mut current, rng);
                Self::trim(&mut current, target, rng).map_err(|e| e.in_subgroup(key, "trim"))?;
            }
            BalanceAction::UndersampleThenFill => {
                Self::undersample(&mut current, rng);
                self.fill(&mut current, target, rng)
                    .map_err(|e| e.in_subgroup(key, "generate"))?;
            }
            BalanceAction::Undersample => {
                Self::undersample(&mut current, rng);
                Self::trim(&mut current, target, rng).map_err(|e| e.in_subgroup(key, "trim"))?;
            }
        }
        Ok(current)
    }

    fn synthesizer(&self, strategy: SynthesisStrategy) -> Result<SyntheticRecordSynthesizer> {
        Ok(SyntheticRecordSynthesizer::new(strategy)
            .with_k_neighbors(self.config.k_neighbors)
            .with_metric(DistanceMetric::from_exponent(self.config.distance_exponent)?)
            .with_params(self.config.interpolation_params()))
    }

    /// Raise every class to the subgroup's majority count
    fn smote(&self, current: &mut Processed, rng: &mut StdRng) -> Result<()> {
        let synthesizer = self.synthesizer(self.config.smote_strategy)?;
        let targets = majority_targets(&current.dataset, &[NEGATIVE_LABEL, POSITIVE_LABEL]);
        let result = synthesizer.synthesize(&current.dataset, &targets, rng)?;
        current.synthesized += result.total_synthetic();
        current.dataset = result.dataset;
        Ok(())
    }

    /// Generate both classes up to `target`
    fn fill(&self, current: &mut Processed, target: usize, rng: &mut StdRng) -> Result<()> {
        let synthesizer = self.synthesizer(self.config.generation_strategy)?;
        let targets: BTreeMap<_, _> = [(NEGATIVE_LABEL, target), (POSITIVE_LABEL, target)].into_iter().collect();
        let result = synthesizer.synthesize(&current.dataset, &targets, rng)?;
        current.synthesized += result.total_synthetic();
        current.dataset = result.dataset;
        Ok(())
    }

    fn undersample(current: &mut Processed, rng: &mut StdRng) {
        let before = current.dataset.len();
        current.dataset = match_minority(&current.dataset, rng);
        current.removed += before - current.dataset.len();
    }

    fn trim(current: &mut Processed, target: usize, rng: &mut StdRng) -> Result<()> {
        let (trimmed, removed) = trim_to_target(&current.dataset, target, rng)?;
        current.dataset = trimmed;
        current.removed += removed;
        Ok(())
    }
}

impl Default for SubgroupBalancer {
    fn default() -> Self {
        Self::new(BalancerConfig::default())
    }
}

fn check_binary_labels(dataset: &Dataset) -> Result<()> {
    match dataset
        .class_counts()
        .keys()
        .find(|&&label| label != POSITIVE_LABEL && label != NEGATIVE_LABEL)
    {
        Some(label) => Err(FairBalanceError::ValidationError(format!(
            "Balancing needs binary 0/1 labels, found {}",
            label
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_branches() {
        assert_eq!(BalanceAction::classify(0, 0, 20), BalanceAction::Empty);
        assert_eq!(BalanceAction::classify(5, 5, 20), BalanceAction::Oversample);
        // target - min = 15 <= max - target = 30
        assert_eq!(BalanceAction::classify(50, 5, 20), BalanceAction::OversampleThenTrim);
        // target - min = 15 > max - target = 5
        assert_eq!(BalanceAction::classify(25, 5, 20), BalanceAction::UndersampleThenFill);
        assert_eq!(BalanceAction::classify(50, 50, 20), BalanceAction::Undersample);
        assert_eq!(BalanceAction::classify(20, 3, 20), BalanceAction::Oversample);
        assert_eq!(BalanceAction::classify(20, 0, 20), BalanceAction::Oversample);
        assert_eq!(BalanceAction::classify(30, 20, 20), BalanceAction::Undersample);
        assert_eq!(BalanceAction::classify(20, 20, 20), BalanceAction::Retain);
    }

    #[test]
    fn test_config_validation() {
        assert!(BalancerConfig::default().validate().is_ok());
        assert!(BalancerConfig::default().with_k_neighbors(0).validate().is_err());
        assert!(BalancerConfig::default().with_crossover_probability(1.5).validate().is_err());
        assert!(BalancerConfig::default().with_distance_exponent(-1.0).validate().is_err());
    }

    #[test]
    fn test_non_binary_labels_rejected() {
        let ds = Dataset::from_numeric(&["sex", "x"], "y", vec![(vec![0.0, 0.1], 2), (vec![1.0, 0.2], 0)]).unwrap();
        let err = SubgroupBalancer::default()
            .balance(&ds, &["sex".to_string()])
            .unwrap_err();
        assert!(matches!(err, FairBalanceError::ValidationError(_)));
    }

    #[test]
    fn test_report_totals() {
        let outcome = |synthesized, removed, skipped: Option<&str>| SubgroupOutcome {
            key: "k".into(),
            action: BalanceAction::Oversample,
            positives_before: 0,
            negatives_before: 0,
            positives_after: 0,
            negatives_after: 0,
            synthesized,
            removed,
            skipped: skipped.map(String::from),
        };
        let report = BalanceReport {
            target: 3,
            outcomes: vec![outcome(4, 0, None), outcome(0, 6, Some("boom"))],
            unassigned: 0,
        };
        assert_eq!(report.total_synthesized(), 4);
        assert_eq!(report.total_removed(), 6);
        assert_eq!(report.skipped().count(), 1);
    }
}
