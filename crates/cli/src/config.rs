//! Configuration management for the CLI
//!
//! Settings come from an optional TOML file overlaid by `CARPRICE__*`
//! environment variables, e.g. `CARPRICE__ARTIFACTS__DIR=/srv/models`.

use anyhow::{anyhow, Context, Result};
use pricing_lib::{
    ArtifactChecksums, ArtifactPaths, CategoryPolicy, CurrencyConverter, EstimatorConfig,
    REFERENCE_YEAR,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub artifacts: ArtifactSettings,

    /// Year the vehicle age is computed against
    #[serde(default = "default_reference_year")]
    pub reference_year: i32,

    #[serde(default)]
    pub category_policy: CategoryPolicy,

    #[serde(default = "default_lower_percentile")]
    pub lower_percentile: f64,

    #[serde(default = "default_upper_percentile")]
    pub upper_percentile: f64,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Display currencies as units per US dollar
    #[serde(default = "default_currencies")]
    pub currencies: BTreeMap<String, f64>,
}

/// Where the trained artifacts live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSettings {
    #[serde(default = "default_artifact_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_model_file")]
    pub model_file: String,

    #[serde(default = "default_columns_file")]
    pub columns_file: String,

    #[serde(default)]
    pub label_encoder_file: Option<String>,

    #[serde(default)]
    pub checksums: ArtifactChecksums,
}

fn default_reference_year() -> i32 {
    REFERENCE_YEAR
}

fn default_lower_percentile() -> f64 {
    EstimatorConfig::default().lower_percentile
}

fn default_upper_percentile() -> f64 {
    EstimatorConfig::default().upper_percentile
}

fn default_top_k() -> usize {
    EstimatorConfig::default().top_k
}

fn default_currencies() -> BTreeMap<String, f64> {
    BTreeMap::from([("USD".to_string(), 1.0), ("MXN".to_string(), 17.0)])
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_model_file() -> String {
    "model.json".to_string()
}

fn default_columns_file() -> String {
    "model_columns.json".to_string()
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            dir: default_artifact_dir(),
            model_file: default_model_file(),
            columns_file: default_columns_file(),
            label_encoder_file: None,
            checksums: ArtifactChecksums::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            artifacts: ArtifactSettings::default(),
            reference_year: default_reference_year(),
            category_policy: CategoryPolicy::default(),
            lower_percentile: default_lower_percentile(),
            upper_percentile: default_upper_percentile(),
            top_k: default_top_k(),
            currencies: default_currencies(),
        }
    }
}

impl Config {
    /// Load configuration from the given file (must exist) or the default
    /// location (may be absent), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(path) = Self::config_path() {
                    builder = builder.add_source(config::File::from(path).required(false));
                }
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("CARPRICE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Get the default configuration file path
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("carprice").join("config.toml"))
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        let artifacts = &self.artifacts;
        ArtifactPaths::in_dir(
            &artifacts.dir,
            &artifacts.model_file,
            &artifacts.columns_file,
            artifacts.label_encoder_file.as_deref(),
        )
        .with_checksums(artifacts.checksums.clone())
    }

    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            lower_percentile: self.lower_percentile,
            upper_percentile: self.upper_percentile,
            top_k: self.top_k,
        }
    }

    /// Converter for a configured currency code (case-insensitive)
    pub fn converter(&self, code: &str) -> Result<CurrencyConverter> {
        let rate = self
            .currencies
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(code))
            .map(|(_, rate)| *rate)
            .ok_or_else(|| {
                anyhow!(
                    "Unknown currency '{}' (configured: {})",
                    code,
                    self.currency_codes().join(", ")
                )
            })?;
        Ok(CurrencyConverter::new(code.to_ascii_uppercase(), rate)?)
    }

    fn currency_codes(&self) -> Vec<String> {
        self.currencies
            .keys()
            .map(|code| code.to_ascii_uppercase())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.reference_year, 2025);
        assert_eq!(config.category_policy, CategoryPolicy::Lenient);
        assert_eq!(config.estimator_config(), EstimatorConfig::default());
        assert_eq!(config.artifacts.model_file, "model.json");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
reference_year = 2024
category_policy = "strict"
top_k = 5

[artifacts]
dir = "/srv/models"
model_file = "rf.json"
label_encoder_file = "label_encoder.json"

[currencies]
USD = 1.0
EUR = 0.92
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.reference_year, 2024);
        assert_eq!(config.category_policy, CategoryPolicy::Strict);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.lower_percentile, 10.0);

        let paths = config.artifact_paths();
        assert_eq!(paths.model, PathBuf::from("/srv/models/rf.json"));
        assert_eq!(paths.columns, PathBuf::from("/srv/models/model_columns.json"));
        assert_eq!(
            paths.label_encoder,
            Some(PathBuf::from("/srv/models/label_encoder.json"))
        );

        let eur = config.converter("eur").unwrap();
        assert_eq!(eur.code(), "EUR");
        assert!((eur.rate() - 0.92).abs() < 1e-12);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_unknown_currency() {
        let config = Config::default();
        let err = config.converter("JPY").unwrap_err();
        assert!(err.to_string().contains("JPY"));
        assert!(config.converter("mxn").is_ok());
    }
}
