//! Estimator invocation
//!
//! Point estimate, ensemble percentile range and feature-importance
//! ranking on top of an opaque [`Regressor`].

use super::schema::ColumnSchema;
use super::Regressor;
use crate::error::{PricingError, Result};
use crate::models::{AlignedFeatureVector, FeatureImportance, PriceRange};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_LOWER_PERCENTILE: f64 = 10.0;
pub const DEFAULT_UPPER_PERCENTILE: f64 = 90.0;
pub const DEFAULT_TOP_K: usize = 10;

/// Configuration for range and importance queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    pub top_k: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            lower_percentile: DEFAULT_LOWER_PERCENTILE,
            upper_percentile: DEFAULT_UPPER_PERCENTILE,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        for p in [self.lower_percentile, self.upper_percentile] {
            if !(0.0..=100.0).contains(&p) {
                return Err(PricingError::InvalidPercentile(p));
            }
        }
        if self.lower_percentile > self.upper_percentile {
            return Err(PricingError::InvalidPercentile(self.lower_percentile));
        }
        Ok(())
    }
}

/// Inclusive linear-interpolation percentile of an ascending sample.
///
/// rank = p/100 * (n - 1), interpolated between the two bracketing order
/// statistics. Returns `None` for an empty sample.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let fraction = rank - lo as f64;
    Some(sorted[lo] + fraction * (sorted[hi] - sorted[lo]))
}

/// Feeds aligned rows to the model
#[derive(Clone)]
pub struct EstimatorInvoker {
    model: Arc<dyn Regressor>,
    schema: Arc<ColumnSchema>,
    config: EstimatorConfig,
}

impl EstimatorInvoker {
    pub fn new(
        model: Arc<dyn Regressor>,
        schema: Arc<ColumnSchema>,
        config: EstimatorConfig,
    ) -> Result<Self> {
        config.validate()?;
        if model.input_width() != schema.len() {
            return Err(PricingError::SchemaMismatch(format!(
                "model takes {} features but the schema has {} columns",
                model.input_width(),
                schema.len()
            )));
        }
        Ok(Self {
            model,
            schema,
            config,
        })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn model_version(&self) -> &str {
        self.model.model_version()
    }

    /// Point estimate in the model's currency, never negative
    pub fn point_estimate(&self, features: &AlignedFeatureVector) -> Result<f64> {
        let raw = self.model.predict(features)?;
        if !raw.is_finite() {
            return Err(PricingError::Model(format!(
                "model returned a non-finite prediction ({})",
                raw
            )));
        }
        if raw < 0.0 {
            warn!(prediction = raw, "Negative price prediction clamped to zero");
            return Ok(0.0);
        }
        Ok(raw)
    }

    /// Percentile range over ensemble member predictions
    pub fn range_estimate(&self, features: &AlignedFeatureVector) -> Result<PriceRange> {
        let ensemble = self.model.ensemble().ok_or_else(|| {
            debug!("Model is not an ensemble, no range available");
            PricingError::EmptyEnsemble
        })?;
        if ensemble.member_count() == 0 {
            return Err(PricingError::EmptyEnsemble);
        }

        let mut predictions = ensemble.member_predictions(features)?;
        if predictions.iter().any(|p| !p.is_finite()) {
            return Err(PricingError::Model(
                "ensemble member returned a non-finite prediction".to_string(),
            ));
        }
        predictions.sort_by(f64::total_cmp);

        let lower = percentile(&predictions, self.config.lower_percentile)
            .ok_or(PricingError::EmptyEnsemble)?;
        let upper = percentile(&predictions, self.config.upper_percentile)
            .ok_or(PricingError::EmptyEnsemble)?;

        debug!(members = predictions.len(), lower, upper, "Computed ensemble range");

        Ok(PriceRange {
            lower: lower.max(0.0),
            upper: upper.max(0.0),
            lower_percentile: self.config.lower_percentile,
            upper_percentile: self.config.upper_percentile,
            members: predictions.len(),
        })
    }

    /// Top-K schema columns by importance, highest first. Ties keep schema order.
    pub fn top_features(&self) -> Result<Vec<FeatureImportance>> {
        self.top_k_features(self.config.top_k)
    }

    pub fn top_k_features(&self, k: usize) -> Result<Vec<FeatureImportance>> {
        let scores = self
            .model
            .feature_importances()
            .ok_or(PricingError::ImportanceUnavailable)?;
        if scores.len() != self.schema.len() {
            return Err(PricingError::SchemaMismatch(format!(
                "{} importance scores for {} schema columns",
                scores.len(),
                self.schema.len()
            )));
        }

        let mut ranked: Vec<(&String, f64)> =
            self.schema.columns().iter().zip(scores.iter().copied()).collect();
        // stable sort keeps schema order among equal scores
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(feature, importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect())
    }
}
