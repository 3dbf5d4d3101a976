//! Synthetic record generation and random resampling
//!
//! Provides the building blocks of subgroup balancing:
//! - Nearest-neighbor sampling (anchor plus its two closest records)
//! - SMOTE-style interpolation, in two named strategies
//! - Random undersampling (match-minority and trim-to-target)

mod interpolate;
mod neighbors;
mod random_sampling;
mod smote;

pub use interpolate::{
    BooleanInterpolator, CategoricalInterpolator, FeatureInterpolator, Interpolation, InterpolationParams,
    ListInterpolator, NumericInterpolator, SynthesisStrategy,
};
pub use neighbors::{nearest_neighbors, DistanceMetric, NeighborSampler, NeighborTriple};
pub use random_sampling::{delete_samples, match_minority, trim_to_target};
pub use smote::{majority_targets, SynthesisResult, SyntheticRecordSynthesizer};
