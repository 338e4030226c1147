//! Model-column schema and label encoding table
//!
//! Both are fitted alongside the model, loaded once and never mutated.

use crate::error::{PricingError, Result};
use crate::models::fields;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Separator between field name and category in one-hot column names
pub const INDICATOR_SEPARATOR: char = '_';

/// Composite key of a one-hot indicator column
pub fn indicator_column(field: &str, value: &str) -> String {
    format!("{}{}{}", field, INDICATOR_SEPARATOR, value)
}

/// Ordered column names the estimator was fit on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ColumnSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(PricingError::SchemaMismatch(
                "model-column schema has no columns".to_string(),
            ));
        }
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if column.is_empty() {
                return Err(PricingError::SchemaMismatch(format!(
                    "column {} has an empty name",
                    i
                )));
            }
            if index.insert(column.clone(), i).is_some() {
                return Err(PricingError::SchemaMismatch(format!(
                    "duplicate column '{}'",
                    column
                )));
            }
        }
        Ok(Self { columns, index })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false for a constructed schema
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Category values that have an indicator column for `field`, in schema order
    pub fn categories_for(&self, field: &str) -> Vec<&str> {
        self.columns
            .iter()
            .filter_map(|c| {
                c.strip_prefix(field)
                    .and_then(|rest| rest.strip_prefix(INDICATOR_SEPARATOR))
            })
            .collect()
    }

    /// True if the model was trained with one-hot columns for `field`
    pub fn has_indicators_for(&self, field: &str) -> bool {
        !self.categories_for(field).is_empty()
    }
}

impl TryFrom<Vec<String>> for ColumnSchema {
    type Error = PricingError;

    fn try_from(columns: Vec<String>) -> Result<Self> {
        Self::new(columns)
    }
}

impl From<ColumnSchema> for Vec<String> {
    fn from(schema: ColumnSchema) -> Self {
        schema.columns
    }
}

fn default_encoded_field() -> String {
    fields::MANUFACTURER.to_string()
}

#[derive(Deserialize)]
struct EncoderFile {
    #[serde(default = "default_encoded_field")]
    field: String,
    classes: Vec<String>,
}

/// Fitted mapping from category name to integer code.
///
/// The code of a class is its position in the class list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "EncoderFile")]
pub struct LabelEncoder {
    field: String,
    classes: Vec<String>,
    #[serde(skip_serializing)]
    codes: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn new(field: impl Into<String>, classes: Vec<String>) -> Result<Self> {
        let field = field.into();
        if classes.is_empty() {
            return Err(PricingError::SchemaMismatch(format!(
                "label encoder for '{}' has no classes",
                field
            )));
        }
        let mut codes = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if codes.insert(class.clone(), code).is_some() {
                return Err(PricingError::SchemaMismatch(format!(
                    "label encoder for '{}' lists '{}' twice",
                    field, class
                )));
            }
        }
        Ok(Self {
            field,
            classes,
            codes,
        })
    }

    /// Field whose text value is replaced by a code
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn transform(&self, value: &str) -> Result<f64> {
        self.codes
            .get(value)
            .map(|&code| code as f64)
            .ok_or_else(|| PricingError::UnknownCategory {
                field: self.field.clone(),
                value: value.to_string(),
            })
    }
}

impl TryFrom<EncoderFile> for LabelEncoder {
    type Error = PricingError;

    fn try_from(file: EncoderFile) -> Result<Self> {
        Self::new(file.field, file.classes)
    }
}
