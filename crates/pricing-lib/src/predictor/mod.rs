//! ML prediction engine

mod estimator;
mod features;
mod forest;
mod inference;
mod output;
mod pipeline;
mod schema;


pub use estimator::{percentile, EstimatorConfig, EstimatorInvoker, DEFAULT_TOP_K};
pub use features::{CategoryPolicy, SchemaAligner};
pub use forest::{ForestRegressor, RegressionTree};
pub use inference::OnnxRegressor;
pub use output::{CurrencyConverter, DisplayPrice, USD};
pub use pipeline::{PredictionRequest, PricePredictor};
pub use schema::{indicator_column, ColumnSchema, LabelEncoder, INDICATOR_SEPARATOR};

use crate::error::Result;
use crate::models::AlignedFeatureVector;

/// A trained regression model that maps one aligned row to one scalar.
///
/// Optional capabilities are exposed explicitly instead of being probed
/// at runtime.
pub trait Regressor: Send + Sync {
    /// Point estimate for a single row
    fn predict(&self, features: &AlignedFeatureVector) -> Result<f64>;

    /// Number of input columns the model was built for
    fn input_width(&self) -> usize;

    /// Member access, for models that are ensembles of independent estimators
    fn ensemble(&self) -> Option<&dyn Ensemble> {
        None
    }

    /// Per-feature importance scores, aligned to the model-column schema
    fn feature_importances(&self) -> Option<&[f64]> {
        None
    }

    fn model_version(&self) -> &str;
}

/// Independently queryable members of an ensemble model
pub trait Ensemble {
    fn member_count(&self) -> usize;

    /// One prediction per member for the same row
    fn member_predictions(&self, features: &AlignedFeatureVector) -> Result<Vec<f64>>;
}
