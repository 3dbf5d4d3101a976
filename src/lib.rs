//! fairbalance - Subgroup rebalancing with fairness verification
//!
//! This crate rebalances an imbalanced, multi-group tabular dataset and
//! verifies the result:
//! - Per-subgroup oversampling (SMOTE-style synthesis) and random undersampling
//! - Counterfactual situation testing of a trained classifier
//! - Group fairness metrics before and after balancing
//!
//! # Modules
//!
//! ## Core
//! - [`synthetic`] - Neighbor sampling, record synthesis, undersampling
//! - [`balance`] - Subgroup partitioning, target computation, balancing
//! - [`situation`] - Situation testing (counterfactual consistency)
//! - [`fairness`] - Confusion matrices, EOD and AOD
//!
//! ## Data
//! - [`dataset`] - Schema, records, CSV ingestion and persistence
//! - [`preprocessing`] - Min-max scaling, train/test splitting
//! - [`classifier`] - Classifier capability and logistic regression
//!
//! ## Services
//! - [`pipeline`] - End-to-end run with a serializable report
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod dataset;
pub mod preprocessing;
pub mod classifier;

// Core
pub mod synthetic;
pub mod balance;
pub mod situation;
pub mod fairness;

// Services
pub mod pipeline;
pub mod cli;

pub use error::{FairBalanceError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{FairBalanceError, Result};

    // Data
    pub use crate::dataset::{
        load_dataset, write_dataset, Dataset, FeatureKind, FeatureSpec, FeatureValue, Label, Record, Schema,
    };
    pub use crate::preprocessing::{train_test_split, MinMaxScaler};

    // Classifier
    pub use crate::classifier::{Classifier, ClassifierTrainer, LogisticRegression, LogisticRegressionTrainer};

    // Synthesis
    pub use crate::synthetic::{
        DistanceMetric, NeighborSampler, SynthesisStrategy, SyntheticRecordSynthesizer,
    };

    // Balancing
    pub use crate::balance::{BalanceAction, BalanceReport, BalancerConfig, CombinationSpace, SubgroupBalancer};

    // Situation testing
    pub use crate::situation::{CounterfactualFilter, RemovalPolicy, SituationTestResult};

    // Fairness
    pub use crate::fairness::{calculate_ratio, ConfusionMatrix, FairnessConfig, FairnessEvaluator, GroupFairness};

    // Pipeline
    pub use crate::pipeline::{FairBalancePipeline, PipelineConfig, PipelineOutput, PipelineReport};
}
