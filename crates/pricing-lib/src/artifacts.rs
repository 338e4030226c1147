//! Loading of the model, column-schema and label-encoder artifacts
//!
//! Artifacts are read once at startup, optionally checked against a
//! SHA-256 digest, and handed out as immutable shared handles.

use crate::error::{PricingError, Result};
use crate::predictor::{ColumnSchema, ForestRegressor, LabelEncoder, OnnxRegressor, Regressor};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Serialized model format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// `.onnx` graph run with tract
    Onnx,
    /// `.json` tree-ensemble export
    Forest,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("onnx") => Ok(Self::Onnx),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Forest),
            _ => Err(PricingError::artifact(
                path,
                "unsupported model format, expected .onnx or .json",
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
            Self::Forest => "forest",
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected SHA-256 digests (hex) of the artifacts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactChecksums {
    pub model: Option<String>,
    pub columns: Option<String>,
    pub label_encoder: Option<String>,
}

/// Locations of the artifacts on disk
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub columns: PathBuf,
    pub label_encoder: Option<PathBuf>,
    pub checksums: ArtifactChecksums,
}

impl ArtifactPaths {
    pub fn in_dir(
        dir: impl AsRef<Path>,
        model_file: &str,
        columns_file: &str,
        label_encoder_file: Option<&str>,
    ) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(model_file),
            columns: dir.join(columns_file),
            label_encoder: label_encoder_file.map(|f| dir.join(f)),
            checksums: ArtifactChecksums::default(),
        }
    }

    pub fn with_checksums(mut self, checksums: ArtifactChecksums) -> Self {
        self.checksums = checksums;
        self
    }
}

/// Loaded artifacts, read-only for the rest of the process
#[derive(Clone)]
pub struct ArtifactBundle {
    pub model: Arc<dyn Regressor>,
    pub format: ModelFormat,
    pub schema: Arc<ColumnSchema>,
    pub label_encoder: Option<Arc<LabelEncoder>>,
}

impl ArtifactBundle {
    /// Assemble a bundle from already-built parts, checking the model width
    pub fn from_parts(
        model: Arc<dyn Regressor>,
        format: ModelFormat,
        schema: ColumnSchema,
        label_encoder: Option<LabelEncoder>,
    ) -> Result<Self> {
        if model.input_width() != schema.len() {
            return Err(PricingError::SchemaMismatch(format!(
                "model takes {} features but the schema has {} columns",
                model.input_width(),
                schema.len()
            )));
        }
        Ok(Self {
            model,
            format,
            schema: Arc::new(schema),
            label_encoder: label_encoder.map(Arc::new),
        })
    }

    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let columns_bytes = read_verified(&paths.columns, paths.checksums.columns.as_deref())?;
        let columns: Vec<String> = serde_json::from_slice(&columns_bytes)
            .map_err(|e| PricingError::artifact(&paths.columns, e))?;
        let schema = ColumnSchema::new(columns)?;
        debug!(path = ?paths.columns, columns = schema.len(), "Loaded column schema");

        let label_encoder = match &paths.label_encoder {
            Some(path) => {
                let bytes = read_verified(path, paths.checksums.label_encoder.as_deref())?;
                let encoder: LabelEncoder = serde_json::from_slice(&bytes)
                    .map_err(|e| PricingError::artifact(path, e))?;
                debug!(
                    path = ?path,
                    field = %encoder.field(),
                    classes = encoder.classes().len(),
                    "Loaded label encoder"
                );
                Some(encoder)
            }
            None => None,
        };

        let format = ModelFormat::from_path(&paths.model)?;
        let model_bytes = read_verified(&paths.model, paths.checksums.model.as_deref())?;
        let model: Arc<dyn Regressor> = match format {
            ModelFormat::Onnx => {
                let version = paths
                    .model
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("onnx");
                Arc::new(OnnxRegressor::new(&model_bytes, schema.len(), version)?)
            }
            ModelFormat::Forest => Arc::new(ForestRegressor::from_json(&model_bytes)?),
        };

        let bundle = Self::from_parts(model, format, schema, label_encoder)?;
        info!(
            model = ?paths.model,
            format = %format,
            version = %bundle.model.model_version(),
            columns = bundle.schema.len(),
            label_encoded = bundle.label_encoder.is_some(),
            "Artifacts loaded"
        );
        Ok(bundle)
    }
}

/// Hex-encoded SHA-256 digest
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn read_verified(path: &Path, expected: Option<&str>) -> Result<Vec<u8>> {
    let bytes = fs::read(path).map_err(|e| PricingError::artifact(path, e))?;
    if let Some(expected) = expected {
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(PricingError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: expected.to_string(),
                actual,
            });
        }
    }
    Ok(bytes)
}
