//! Data preprocessing module
//!
//! Thin preparation steps that run before balancing:
//! - Min-max feature scaling of numeric columns
//! - Shuffled train/test splitting

mod scaler;
mod split;

pub use scaler::MinMaxScaler;
pub use split::train_test_split;
