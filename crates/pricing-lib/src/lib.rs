//! Pricing library for used-vehicle price estimation
//!
//! This crate provides the core functionality for:
//! - Aligning raw vehicle attributes onto a trained model's column schema
//! - Running the trained estimator (ONNX graph or tree-ensemble export)
//! - Percentile price ranges from ensemble members and importance ranking
//! - Artifact loading with checksum validation
//! - Metrics and structured logging

pub mod artifacts;
pub mod error;
pub mod models;
pub mod observability;
pub mod predictor;

pub use artifacts::{ArtifactBundle, ArtifactChecksums, ArtifactPaths, ModelFormat};
pub use error::{PricingError, Result};
pub use models::*;
pub use observability::{render_metrics, PricingMetrics, StructuredLogger};
pub use predictor::{
    CategoryPolicy, ColumnSchema, CurrencyConverter, DisplayPrice, EstimatorConfig,
    EstimatorInvoker, LabelEncoder, PredictionRequest, PricePredictor, Regressor, SchemaAligner,
    INDICATOR_SEPARATOR,
};
