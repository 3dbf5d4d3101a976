//! End-to-end rebalancing pipeline
//!
//! `scale -> measure -> balance -> situation test -> measure`, driven by one
//! [`PipelineConfig`] and returning a [`PipelineOutput`]. Every stage works on
//! its own copy of the data.

use crate::balance::{BalanceReport, BalancerConfig, CombinationSpace, SubgroupBalancer};
use crate::classifier::{Classifier, ClassifierTrainer, LogisticRegressionTrainer};
use crate::dataset::{Dataset, Label};
use crate::error::{FairBalanceError, Result};
use crate::fairness::{FairnessConfig, FairnessEvaluator, GroupFairness, PerformanceMetrics};
use crate::preprocessing::{train_test_split, MinMaxScaler};
use crate::situation::{CounterfactualFilter, RemovalPolicy};
use crate::synthetic::{DistanceMetric, SynthesisStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Binary outcome column
    pub label_column: String,
    /// Attributes whose value combinations define the subgroups
    pub protected_attributes: Vec<String>,
    pub k_neighbors: usize,
    pub distance_exponent: f64,
    pub crossover_probability: f64,
    pub interpolation_factor: f64,
    pub smote_strategy: SynthesisStrategy,
    pub generation_strategy: SynthesisStrategy,
    /// Seed for balancing; entropy when unset
    pub seed: Option<u64>,
    /// Seed of the train/test splits used for evaluation
    pub split_seed: u64,
    pub test_ratio: f64,
    /// Min-max scale numeric features before anything else
    pub scale_features: bool,
    pub removal_policy: RemovalPolicy,
    pub skip_failed_subgroups: bool,
    /// Also report the inconsistency rate and performance of each model
    pub measure_inconsistency: bool,
    pub fairness: FairnessConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label_column: "action_taken".to_string(),
            protected_attributes: vec![
                "derived_ethnicity".to_string(),
                "derived_race".to_string(),
                "derived_sex".to_string(),
            ],
            k_neighbors: 5,
            distance_exponent: 2.0,
            crossover_probability: 0.8,
            interpolation_factor: 0.8,
            smote_strategy: SynthesisStrategy::Smote,
            generation_strategy: SynthesisStrategy::Crossover,
            seed: None,
            split_seed: 0,
            test_ratio: 0.3,
            scale_features: true,
            removal_policy: RemovalPolicy::Remove,
            skip_failed_subgroups: false,
            measure_inconsistency: true,
            fairness: FairnessConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn with_label_column(mut self, label: impl Into<String>) -> Self {
        self.label_column = label.into();
        self
    }

    pub fn with_protected_attributes(mut self, attributes: Vec<String>) -> Self {
        self.protected_attributes = attributes;
        self
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    pub fn with_scale_features(mut self, scale: bool) -> Self {
        self.scale_features = scale;
        self
    }

    pub fn with_skip_failed_subgroups(mut self, skip: bool) -> Self {
        self.skip_failed_subgroups = skip;
        self
    }

    pub fn with_measure_inconsistency(mut self, measure: bool) -> Self {
        self.measure_inconsistency = measure;
        self
    }

    pub fn with_fairness(mut self, fairness: FairnessConfig) -> Self {
        self.fairness = fairness;
        self
    }

    /// Settings handed to the subgroup balancer
    pub fn balancer_config(&self) -> BalancerConfig {
        BalancerConfig {
            k_neighbors: self.k_neighbors,
            distance_exponent: self.distance_exponent,
            crossover_probability: self.crossover_probability,
            interpolation_factor: self.interpolation_factor,
            smote_strategy: self.smote_strategy,
            generation_strategy: self.generation_strategy,
            seed: self.seed,
            skip_failed_subgroups: self.skip_failed_subgroups,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.protected_attributes.is_empty() {
            return Err(FairBalanceError::ConfigError(
                "At least one protected attribute is required".to_string(),
            ));
        }
        if self.protected_attributes.iter().any(|a| *a == self.label_column) {
            return Err(FairBalanceError::ConfigError(format!(
                "Label column '{}' cannot be a protected attribute",
                self.label_column
            )));
        }
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(FairBalanceError::InvalidParameter {
                name: "test_ratio".to_string(),
                value: self.test_ratio.to_string(),
                reason: "must be within (0, 1)".to_string(),
            });
        }
        DistanceMetric::from_exponent(self.distance_exponent)?;
        self.balancer_config().validate()
    }
}

/// Inconsistency rate and performance of one trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAudit {
    pub inconsistency_rate: f64,
    pub performance: PerformanceMetrics,
}

/// Metrics of a model trained and evaluated on one stage's data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub fairness: Vec<GroupFairness>,
    pub audit: Option<ModelAudit>,
}

impl StageMetrics {
    pub fn for_attribute(&self, attribute: &str) -> Option<&GroupFairness> {
        self.fairness.iter().find(|g| g.attribute == attribute)
    }
}

/// Outcome of situation testing on the balanced data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SituationSummary {
    pub tested: usize,
    pub inconsistent: usize,
    pub rate: f64,
    pub policy: RemovalPolicy,
}

/// Serializable record of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub input_rows: usize,
    pub balanced_rows: usize,
    pub final_rows: usize,
    pub balance: BalanceReport,
    pub situation: SituationSummary,
    pub before: StageMetrics,
    pub after: StageMetrics,
    pub duration_secs: f64,
}

impl PipelineReport {
    /// Write as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Report plus the datasets produced by a run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: PipelineReport,
    /// Dataset right after subgroup balancing
    pub balanced: Dataset,
    /// Balanced dataset after the removal policy
    pub dataset: Dataset,
    /// Row ids in `balanced` found inconsistent
    pub flagged: BTreeSet<usize>,
}

/// Balancing and verification pipeline
#[derive(Debug, Clone)]
pub struct FairBalancePipeline<T = LogisticRegressionTrainer> {
    config: PipelineConfig,
    trainer: T,
}

impl FairBalancePipeline<LogisticRegressionTrainer> {
    /// Pipeline using logistic regression as the audited model
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_trainer(config, LogisticRegressionTrainer::default())
    }
}

impl<T: ClassifierTrainer> FairBalancePipeline<T> {
    pub fn with_trainer(config: PipelineConfig, trainer: T) -> Self {
        Self { config, trainer }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on `dataset`
    pub fn run(&self, dataset: &Dataset) -> Result<PipelineOutput> {
        let start = Instant::now();
        self.config.validate()?;
        let attributes = &self.config.protected_attributes;

        // 1. Scaling
        let prepared = if self.config.scale_features {
            MinMaxScaler::new().fit_transform(dataset)?
        } else {
            dataset.clone()
        };

        // 2. Combination space of the pre-balance data
        let space = CombinationSpace::from_dataset(&prepared, attributes)?;
        info!(
            rows = prepared.len(),
            attributes = ?attributes,
            combinations = space.len(),
            "Prepared dataset"
        );

        // 3. Baseline
        let before = self.measure(&prepared, &space, "baseline")?;

        // 4. Balancing
        let balancer = SubgroupBalancer::new(self.config.balancer_config());
        let (balanced, balance) = balancer.balance_in_space(&prepared, &space)?;

        // 5. Situation testing with a model trained on the balanced data
        let model = self.trainer.fit(&balanced)?;
        let filter = CounterfactualFilter::new(space.clone());
        let tested = filter.find_inconsistent(&balanced, &model)?;
        let filtered = CounterfactualFilter::apply(&balanced, &tested, self.config.removal_policy);
        info!(
            policy = ?self.config.removal_policy,
            inconsistent = tested.inconsistent.len(),
            rows = filtered.len(),
            "Applied removal policy"
        );

        // 6. Final metrics
        let after = self.measure(&filtered, &space, "final")?;

        let report = PipelineReport {
            input_rows: dataset.len(),
            balanced_rows: balanced.len(),
            final_rows: filtered.len(),
            balance,
            situation: SituationSummary {
                tested: tested.total,
                inconsistent: tested.inconsistent.len(),
                rate: tested.rate(),
                policy: self.config.removal_policy,
            },
            before,
            after,
            duration_secs: start.elapsed().as_secs_f64(),
        };

        Ok(PipelineOutput {
            report,
            balanced,
            dataset: filtered,
            flagged: tested.inconsistent,
        })
    }

    /// Train on a split of `dataset` and measure fairness on the held-out part
    fn measure(&self, dataset: &Dataset, space: &CombinationSpace, stage: &str) -> Result<StageMetrics> {
        let (train, test) = train_test_split(dataset, self.config.test_ratio, self.config.split_seed)?;
        let model = self.trainer.fit(&train)?;
        let predictions = model.predict_dataset(&test)?;

        let evaluator = FairnessEvaluator::new(self.config.fairness.clone());
        let fairness = self
            .config
            .protected_attributes
            .iter()
            .map(|attribute| evaluator.evaluate(&test, attribute, &predictions))
            .collect::<Result<Vec<_>>>()?;
        for group in &fairness {
            info!(
                stage,
                attribute = %group.attribute,
                eod = group.equal_opportunity_difference,
                aod = group.average_odds_difference,
                "Fairness"
            );
        }

        let audit = if self.config.measure_inconsistency {
            let tested = CounterfactualFilter::new(space.clone()).find_inconsistent(&test, &model)?;
            let actual: Vec<Label> = test.records().iter().map(|r| r.label).collect();
            let performance = PerformanceMetrics::evaluate(&actual, &predictions)?;
            info!(
                stage,
                inconsistency_rate = tested.rate(),
                accuracy = performance.accuracy,
                f1 = performance.f1,
                "Model audit"
            );
            Some(ModelAudit {
                inconsistency_rate: tested.rate(),
                performance,
            })
        } else {
            None
        };

        Ok(StageMetrics { fairness, audit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.k_neighbors, 5);
        assert_eq!(config.label_column, "action_taken");
        assert_eq!(config.protected_attributes.len(), 3);
        assert_eq!(config.fairness.privileged_value, 0.5);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(PipelineConfig::default()
            .with_protected_attributes(Vec::new())
            .validate()
            .is_err());
        assert!(PipelineConfig::default().with_k_neighbors(0).validate().is_err());

        let mut config = PipelineConfig::default();
        config.test_ratio = 1.0;
        assert!(config.validate().is_err());

        let config = PipelineConfig::default().with_protected_attributes(vec!["action_taken".to_string()]);
        assert!(matches!(config.validate(), Err(FairBalanceError::ConfigError(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"k_neighbors": 3, "protected_attributes": ["derived_sex"], "seed": 7}"#).unwrap();
        assert_eq!(config.k_neighbors, 3);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.protected_attributes, vec!["derived_sex".to_string()]);
        assert_eq!(config.generation_strategy, SynthesisStrategy::Crossover);
        assert_eq!(config.removal_policy, RemovalPolicy::Remove);
    }

    #[test]
    fn test_balancer_config_mirrors_pipeline() {
        let config = PipelineConfig::default().with_seed(11).with_k_neighbors(3);
        let balancer = config.balancer_config();
        assert_eq!(balancer.seed, Some(11));
        assert_eq!(balancer.k_neighbors, 3);
        assert_eq!(balancer.smote_strategy, SynthesisStrategy::Smote);
    }
}
