//! Observability infrastructure for price estimation
//!
//! Provides:
//! - Prometheus metrics (prediction latency, prediction and error counts,
//!   unmatched categories, loaded model info)
//! - Structured logging of prediction events with tracing

use crate::error::PricingError;
use crate::models::PriceEstimate;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    Encoder, GaugeVec, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PricingMetricsInner> = OnceLock::new();

struct PricingMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions: IntCounter,
    prediction_errors: IntCounterVec,
    unmatched_categories: IntCounter,
    model_info: GaugeVec,
}

impl PricingMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "price_estimator_prediction_latency_seconds",
                "Time spent aligning features and running the estimator",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions: register_int_counter!(
                "price_estimator_predictions_total",
                "Total number of price estimates produced"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors: register_int_counter_vec!(
                "price_estimator_prediction_errors_total",
                "Total number of rejected prediction requests by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            unmatched_categories: register_int_counter!(
                "price_estimator_unmatched_categories_total",
                "Categorical values that matched no model column and were zero-filled"
            )
            .expect("Failed to register unmatched_categories_total"),

            model_info: register_gauge_vec!(
                "price_estimator_model_info",
                "Information about the currently loaded model",
                &["version", "format"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Lightweight handle to the global metrics instance.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct PricingMetrics {
    _private: (),
}

impl Default for PricingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PricingMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PricingMetricsInner {
        GLOBAL_METRICS.get_or_init(PricingMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions.inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner().prediction_errors.with_label_values(&[kind]).inc();
    }

    pub fn add_unmatched_categories(&self, count: usize) {
        self.inner().unmatched_categories.inc_by(count as u64);
    }

    pub fn set_model_info(&self, version: &str, format: &str) {
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[version, format])
            .set(1.0);
    }
}

/// Render every registered metric in the Prometheus text format
pub fn render_metrics() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Structured logger for prediction events
#[derive(Clone)]
pub struct StructuredLogger {
    source: String,
}

impl StructuredLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn log_startup(&self, version: &str, model_version: &str, columns: usize) {
        info!(
            event = "startup",
            source = %self.source,
            version = %version,
            model_version = %model_version,
            columns,
            "Price estimator ready"
        );
    }

    pub fn log_prediction(&self, estimate: &PriceEstimate, elapsed_us: u64) {
        info!(
            event = "prediction_generated",
            source = %self.source,
            price_usd = estimate.price_usd,
            lower_usd = ?estimate.range.map(|r| r.lower),
            upper_usd = ?estimate.range.map(|r| r.upper),
            unmatched = estimate.unmatched.len(),
            warnings = estimate.warnings.len(),
            model_version = %estimate.model_version,
            elapsed_us,
            "Generated price estimate"
        );
    }

    pub fn log_rejection(&self, error: &PricingError) {
        warn!(
            event = "prediction_rejected",
            source = %self.source,
            kind = error.kind(),
            error = %error,
            "Prediction request rejected"
        );
    }
}
