//! Error types for the fairbalance pipeline

use thiserror::Error;

use crate::dataset::Label;

/// Result type alias for fairbalance operations
pub type Result<T> = std::result::Result<T, FairBalanceError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum FairBalanceError {
    #[error("Insufficient data{}: need at least {required} rows, got {available}", class_suffix(.class))]
    InsufficientData {
        required: usize,
        available: usize,
        class: Option<Label>,
    },

    #[error("Cannot oversample class {class}: it has no members to anchor on")]
    EmptyMinorityClass { class: Label },

    #[error("Cannot delete {requested} rows of class {class}: only {available} available")]
    InsufficientRows {
        class: Label,
        requested: usize,
        available: usize,
    },

    #[error("Situation test collected no predictions for record {record}")]
    EmptyPredictionSet { record: usize },

    #[error("Subgroup [{subgroup}] failed during {step}: {source}")]
    Subgroup {
        subgroup: String,
        step: String,
        #[source]
        source: Box<FairBalanceError>,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl FairBalanceError {
    /// Attach the subgroup and step that were being processed.
    pub fn in_subgroup(self, subgroup: impl Into<String>, step: impl Into<String>) -> Self {
        FairBalanceError::Subgroup {
            subgroup: subgroup.into(),
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// Record the class whose rows were insufficient; other errors pass through.
    pub fn for_class(self, class: Label) -> Self {
        match self {
            FairBalanceError::InsufficientData {
                required, available, ..
            } => FairBalanceError::InsufficientData {
                required,
                available,
                class: Some(class),
            },
            other => other,
        }
    }

    /// The innermost error, looking through subgroup context.
    pub fn root(&self) -> &FairBalanceError {
        match self {
            FairBalanceError::Subgroup { source, .. } => source.root(),
            other => other,
        }
    }
}

fn class_suffix(class: &Option<Label>) -> String {
    class.map(|c| format!(" in class {}", c)).unwrap_or_default()
}

impl From<polars::error::PolarsError> for FairBalanceError {
    fn from(err: polars::error::PolarsError) -> Self {
        FairBalanceError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for FairBalanceError {
    fn from(err: serde_json::Error) -> Self {
        FairBalanceError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FairBalanceError {
    fn from(err: ndarray::ShapeError) -> Self {
        FairBalanceError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FairBalanceError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FairBalanceError = io_err.into();
        assert!(matches!(err, FairBalanceError::IoError(_)));
    }

    #[test]
    fn test_subgroup_context_keeps_root() {
        let err = FairBalanceError::EmptyMinorityClass { class: 1 }
            .in_subgroup("derived_sex=0", "generate");
        assert!(err.to_string().contains("derived_sex=0"));
        assert!(err.to_string().contains("generate"));
        assert!(matches!(err.root(), FairBalanceError::EmptyMinorityClass { class: 1 }));
    }

    #[test]
    fn test_insufficient_data_names_class() {
        let err = FairBalanceError::InsufficientData {
            required: 3,
            available: 2,
            class: None,
        };
        assert_eq!(err.to_string(), "Insufficient data: need at least 3 rows, got 2");

        let err = err.for_class(0);
        assert!(matches!(err, FairBalanceError::InsufficientData { class: Some(0), .. }));
        assert_eq!(err.to_string(), "Insufficient data in class 0: need at least 3 rows, got 2");

        let other = FairBalanceError::ModelNotFitted.for_class(1);
        assert!(matches!(other, FairBalanceError::ModelNotFitted));
    }
}
