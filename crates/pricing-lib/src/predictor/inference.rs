//! ONNX inference using tract
//!
//! Runs an exported regression graph with a single `[1, width]` f32 input
//! and a scalar output. The graph is optimized once at load time and is
//! read-only afterwards.

use super::Regressor;
use crate::error::{PricingError, Result};
use crate::models::AlignedFeatureVector;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

fn model_error(context: &str, err: impl std::fmt::Display) -> PricingError {
    PricingError::Model(format!("{}: {}", context, err))
}

/// ONNX-backed regressor. Point estimates only: the graph does not expose
/// ensemble members or importances.
pub struct OnnxRegressor {
    model: TractModel,
    width: usize,
    version: String,
}

impl OnnxRegressor {
    /// Load and optimize an ONNX model from bytes for rows of `width` features
    pub fn new(model_bytes: &[u8], width: usize, version: impl Into<String>) -> Result<Self> {
        let model = Self::load_model(model_bytes, width)?;
        let version = version.into();
        debug!(version = %version, width, "Loaded ONNX model");
        Ok(Self {
            model,
            width,
            version,
        })
    }

    fn load_model(model_bytes: &[u8], width: usize) -> Result<TractModel> {
        tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .map_err(|e| model_error("Failed to parse ONNX model", e))?
            .with_input_fact(0, f32::fact([1, width]).into())
            .map_err(|e| model_error("Failed to set input shape", e))?
            .into_optimized()
            .map_err(|e| model_error("Failed to optimize model", e))?
            .into_runnable()
            .map_err(|e| model_error("Failed to create runnable model", e))
    }

    /// Convert the aligned row to a `[1, width]` tensor
    fn features_to_tensor(&self, features: &AlignedFeatureVector) -> Result<Tensor> {
        if features.len() != self.width {
            return Err(PricingError::SchemaMismatch(format!(
                "model expects {} features, got {}",
                self.width,
                features.len()
            )));
        }
        let data: Vec<f32> = features.values().iter().map(|&v| v as f32).collect();
        let array = tract_ndarray::Array2::from_shape_vec((1, self.width), data)
            .map_err(|e| model_error("Failed to shape input", e))?;
        Ok(array.into())
    }
}

impl Regressor for OnnxRegressor {
    fn predict(&self, features: &AlignedFeatureVector) -> Result<f64> {
        let start = Instant::now();
        let input = self.features_to_tensor(features)?;

        let result = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| model_error("Inference failed", e))?;
        let output = result
            .first()
            .ok_or_else(|| PricingError::Model("No output from model".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| model_error("Unexpected output type", e))?;
        let value = view
            .iter()
            .next()
            .copied()
            .ok_or_else(|| PricingError::Model("Model output is empty".to_string()))?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target", MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(f64::from(value))
    }

    fn input_width(&self) -> usize {
        self.width
    }

    fn model_version(&self) -> &str {
        &self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::ColumnSchema;
    use std::sync::Arc;

    /// price = 2*a + 0.5*b - c + 100, as a MatMul + Add graph
    const LINEAR_PRICE: &[u8] = include_bytes!("../../testdata/linear_price.onnx");

    fn row(values: Vec<f64>) -> AlignedFeatureVector {
        let names = (0..values.len()).map(|i| format!("f{}", i)).collect();
        let schema = Arc::new(ColumnSchema::new(names).unwrap());
        AlignedFeatureVector::from_values(schema, values).unwrap()
    }

    #[test]
    fn test_linear_graph_prediction() {
        let model = OnnxRegressor::new(LINEAR_PRICE, 3, "linear-v1").unwrap();
        assert_eq!(model.input_width(), 3);
        assert_eq!(model.model_version(), "linear-v1");
        assert!(model.ensemble().is_none());
        assert!(model.feature_importances().is_none());

        let price = model.predict(&row(vec![10.0, 4.0, 2.0])).unwrap();
        assert!((price - 120.0).abs() < 1e-4, "got {}", price);

        let price = model.predict(&row(vec![0.0, 0.0, 0.0])).unwrap();
        assert!((price - 100.0).abs() < 1e-4, "got {}", price);
    }

    #[test]
    fn test_wrong_width_rejected() {
        let model = OnnxRegressor::new(LINEAR_PRICE, 3, "linear-v1").unwrap();
        let result = model.predict(&row(vec![1.0, 2.0]));
        assert!(matches!(result, Err(PricingError::SchemaMismatch(_))));
    }

    #[test]
    fn test_invalid_model_bytes() {
        let result = OnnxRegressor::new(b"not an onnx graph", 4, "v1");
        assert!(matches!(result, Err(PricingError::Model(_))));
    }

    #[test]
    fn test_empty_model_bytes() {
        assert!(OnnxRegressor::new(&[], 4, "v1").is_err());
    }
}
