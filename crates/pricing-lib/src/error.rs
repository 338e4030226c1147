//! Error types for the pricing library

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while aligning features or invoking the estimator.
///
/// All of these are deterministic failures; retrying the same request
/// yields the same error.
#[derive(Debug, Error)]
pub enum PricingError {
    /// A label-encoded field carried a value the encoder was never fitted on
    #[error("Unknown category '{value}' for label-encoded field '{field}'")]
    UnknownCategory { field: String, value: String },

    /// Strict policy: a one-hot value has no matching schema column
    #[error("Category '{value}' for field '{field}' was not seen at training time")]
    UnseenCategory { field: String, value: String },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Range estimate requested but the model exposes no ensemble members")]
    EmptyEnsemble,

    #[error("Model does not expose feature importances")]
    ImportanceUnavailable,

    #[error("Invalid value for '{field}': {reason}")]
    InvalidAttribute { field: String, reason: String },

    #[error("Invalid percentile {0}, expected a value in [0, 100]")]
    InvalidPercentile(f64),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Failed to load artifact {path:?}: {reason}")]
    Artifact { path: PathBuf, reason: String },

    #[error("Checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

impl PricingError {
    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Artifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Short label for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownCategory { .. } => "unknown_category",
            Self::UnseenCategory { .. } => "unseen_category",
            Self::SchemaMismatch(_) => "schema_mismatch",
            Self::EmptyEnsemble => "empty_ensemble",
            Self::ImportanceUnavailable => "importance_unavailable",
            Self::InvalidAttribute { .. } => "invalid_attribute",
            Self::InvalidPercentile(_) => "invalid_percentile",
            Self::Model(_) => "model",
            Self::Artifact { .. } => "artifact",
            Self::ChecksumMismatch { .. } => "checksum_mismatch",
        }
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PricingError>;
