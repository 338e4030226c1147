//! End-to-end price prediction
//!
//! raw record -> schema alignment -> estimator -> price estimate, with
//! metrics and structured logging around each request. The predictor only
//! holds immutable shared handles, so one instance can serve any number
//! of sequential or concurrent requests.

use super::estimator::{EstimatorConfig, EstimatorInvoker};
use super::features::{CategoryPolicy, SchemaAligner};
use crate::artifacts::ArtifactBundle;
use crate::error::Result;
use crate::models::{PriceEstimate, RawRecord, VehicleAttributes, REFERENCE_YEAR};
use crate::observability::{PricingMetrics, StructuredLogger};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Optional outputs requested alongside the point estimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub with_range: bool,
    pub with_importance: bool,
}

impl PredictionRequest {
    pub fn point() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self {
            with_range: true,
            with_importance: true,
        }
    }
}

/// Aligner and invoker bound to one loaded model
#[derive(Clone)]
pub struct PricePredictor {
    aligner: SchemaAligner,
    invoker: EstimatorInvoker,
    reference_year: i32,
    metrics: PricingMetrics,
    logger: StructuredLogger,
}

impl PricePredictor {
    pub fn new(aligner: SchemaAligner, invoker: EstimatorInvoker) -> Self {
        Self {
            aligner,
            invoker,
            reference_year: REFERENCE_YEAR,
            metrics: PricingMetrics::new(),
            logger: StructuredLogger::new("pricing-lib"),
        }
    }

    pub fn from_bundle(
        bundle: ArtifactBundle,
        policy: CategoryPolicy,
        config: EstimatorConfig,
    ) -> Result<Self> {
        let format = bundle.format;
        let mut aligner = SchemaAligner::new(Arc::clone(&bundle.schema)).with_policy(policy);
        if let Some(encoder) = bundle.label_encoder {
            aligner = aligner.with_label_encoder(encoder);
        }
        let invoker = EstimatorInvoker::new(bundle.model, bundle.schema, config)?;

        let predictor = Self::new(aligner, invoker);
        predictor
            .metrics
            .set_model_info(predictor.invoker.model_version(), format.as_str());
        predictor.logger.log_startup(
            env!("CARGO_PKG_VERSION"),
            predictor.invoker.model_version(),
            predictor.aligner.schema().len(),
        );
        Ok(predictor)
    }

    pub fn with_reference_year(mut self, reference_year: i32) -> Self {
        self.reference_year = reference_year;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn aligner(&self) -> &SchemaAligner {
        &self.aligner
    }

    pub fn invoker(&self) -> &EstimatorInvoker {
        &self.invoker
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Validate typed attributes, then predict
    pub fn predict_attributes(
        &self,
        attributes: &VehicleAttributes,
        request: PredictionRequest,
    ) -> Result<PriceEstimate> {
        self.tracked(|| {
            let record = attributes.to_record(self.reference_year)?;
            let warnings = attributes.plausibility_warnings(self.reference_year);
            for warning in &warnings {
                warn!(warning = %warning, "Implausible vehicle attributes");
            }
            let mut estimate = self.estimate(&record, request)?;
            estimate.warnings = warnings;
            Ok(estimate)
        })
    }

    /// Predict from a raw record whose fields are already in training layout
    pub fn predict_record(
        &self,
        record: &RawRecord,
        request: PredictionRequest,
    ) -> Result<PriceEstimate> {
        self.tracked(|| self.estimate(record, request))
    }

    fn estimate(&self, record: &RawRecord, request: PredictionRequest) -> Result<PriceEstimate> {
        let features = self.aligner.align(record)?;
        let price_usd = self.invoker.point_estimate(&features)?;
        let range = if request.with_range {
            Some(self.invoker.range_estimate(&features)?)
        } else {
            None
        };
        let top_features = if request.with_importance {
            Some(self.invoker.top_features()?)
        } else {
            None
        };

        Ok(PriceEstimate {
            price_usd,
            range,
            top_features,
            unmatched: features.unmatched().to_vec(),
            warnings: Vec::new(),
            model_version: self.invoker.model_version().to_string(),
            generated_at: chrono::Utc::now().timestamp(),
        })
    }

    fn tracked(&self, run: impl FnOnce() -> Result<PriceEstimate>) -> Result<PriceEstimate> {
        let start = Instant::now();
        let result = run();
        let elapsed = start.elapsed();
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());

        match &result {
            Ok(estimate) => {
                self.metrics.inc_predictions();
                self.metrics.add_unmatched_categories(estimate.unmatched.len());
                self.logger
                    .log_prediction(estimate, elapsed.as_micros() as u64);
            }
            Err(e) => {
                self.metrics.inc_prediction_errors(e.kind());
                self.logger.log_rejection(e);
            }
        }
        result
    }
}
