//! Schema alignment for ML inference
//!
//! Turns a raw attribute record into the fixed-width numeric row the
//! estimator was trained on: label encoding, one-hot expansion of the
//! remaining categorical fields, then reindexing onto the model-column
//! schema with zero-fill.

use super::schema::{indicator_column, ColumnSchema, LabelEncoder};
use crate::error::{PricingError, Result};
use crate::models::{AlignedFeatureVector, AttributeValue, RawRecord, UnmatchedCategory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What to do with a categorical value that has no column in the schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryPolicy {
    /// Contribute all-zero indicators for the field and report the value
    #[default]
    Lenient,
    /// Reject the record with `UnseenCategory`
    Strict,
}

/// Aligns raw records onto the model-column schema
#[derive(Debug, Clone)]
pub struct SchemaAligner {
    schema: Arc<ColumnSchema>,
    encoder: Option<Arc<LabelEncoder>>,
    policy: CategoryPolicy,
}

impl SchemaAligner {
    pub fn new(schema: Arc<ColumnSchema>) -> Self {
        Self {
            schema,
            encoder: None,
            policy: CategoryPolicy::default(),
        }
    }

    pub fn with_label_encoder(mut self, encoder: Arc<LabelEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn with_policy(mut self, policy: CategoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn schema(&self) -> &Arc<ColumnSchema> {
        &self.schema
    }

    pub fn label_encoder(&self) -> Option<&LabelEncoder> {
        self.encoder.as_deref()
    }

    pub fn policy(&self) -> CategoryPolicy {
        self.policy
    }

    /// Align one record. Pure function of the record and the aligner's handles.
    pub fn align(&self, record: &RawRecord) -> Result<AlignedFeatureVector> {
        let mut values = vec![0.0; self.schema.len()];
        let mut unmatched = Vec::new();

        for (field, value) in record.iter() {
            match value {
                AttributeValue::Number(n) => {
                    if !n.is_finite() {
                        return Err(PricingError::invalid(field, "must be a finite number"));
                    }
                    self.place(field, *n, &mut values);
                }
                AttributeValue::Text(text) => match self.encoder_for(field) {
                    Some(encoder) => {
                        let code = encoder.transform(text)?;
                        self.place(field, code, &mut values);
                    }
                    None if self.schema.contains(field) => {
                        // a numeric column for a text field needs its label codes
                        return Err(PricingError::SchemaMismatch(format!(
                            "'{}' is a numeric model column but no label encoder is \
                             loaded to code '{}'",
                            field, text
                        )));
                    }
                    None => {
                        let column = indicator_column(field, text);
                        if let Some(i) = self.schema.position(&column) {
                            values[i] = 1.0;
                        } else if self.schema.has_indicators_for(field) {
                            self.unmatched_category(field, text, &mut unmatched)?;
                        } else {
                            trace!(field = %field, "Field has no indicator columns, ignoring");
                        }
                    }
                },
            }
        }

        debug!(
            width = values.len(),
            unmatched = unmatched.len(),
            "Aligned record onto model schema"
        );

        Ok(AlignedFeatureVector::new(
            Arc::clone(&self.schema),
            values,
            unmatched,
        ))
    }

    fn encoder_for(&self, field: &str) -> Option<&LabelEncoder> {
        self.encoder.as_deref().filter(|e| e.field() == field)
    }

    fn place(&self, column: &str, value: f64, values: &mut [f64]) {
        match self.schema.position(column) {
            Some(i) => values[i] = value,
            None => trace!(column = %column, "Column not in model schema, dropping"),
        }
    }

    fn unmatched_category(
        &self,
        field: &str,
        value: &str,
        unmatched: &mut Vec<UnmatchedCategory>,
    ) -> Result<()> {
        match self.policy {
            CategoryPolicy::Strict => Err(PricingError::UnseenCategory {
                field: field.to_string(),
                value: value.to_string(),
            }),
            CategoryPolicy::Lenient => {
                warn!(
                    field = %field,
                    value = %value,
                    "Category not seen at training time, all indicators for the field are zero"
                );
                unmatched.push(UnmatchedCategory {
                    field: field.to_string(),
                    value: value.to_string(),
                });
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(names: &[&str]) -> Arc<ColumnSchema> {
        Arc::new(ColumnSchema::new(names.iter().map(|s| s.to_string()).collect()).unwrap())
    }

    fn sedan_schema() -> Arc<ColumnSchema> {
        schema(&[
            "Doors",
            "Mileage",
            "Category_SUV",
            "Category_Sedan",
            "Color_Black",
            "Color_White",
        ])
    }

    fn sedan() -> RawRecord {
        RawRecord::new()
            .with("Doors", 4.0)
            .with("Mileage", 60_000.0)
            .with("Category", "Sedan")
            .with("Color", "White")
    }

    #[test]
    fn test_width_and_order_follow_schema() {
        let aligner = SchemaAligner::new(sedan_schema());
        let vector = aligner.align(&sedan()).unwrap();
        assert_eq!(vector.len(), 6);
        assert_eq!(vector.values(), &[4.0, 60_000.0, 0.0, 1.0, 0.0, 1.0]);
        assert!(vector.unmatched().is_empty());
    }

    #[test]
    fn test_alignment_is_idempotent() {
        let aligner = SchemaAligner::new(sedan_schema());
        let a = aligner.align(&sedan()).unwrap();
        let b = aligner.align(&sedan()).unwrap();
        let bits = |v: &AlignedFeatureVector| {
            v.values().iter().map(|x| x.to_bits()).collect::<Vec<_>>()
        };
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_missing_columns_zero_filled() {
        let aligner = SchemaAligner::new(schema(&["Doors", "Levy", "Category_Sedan"]));
        let vector = aligner.align(&RawRecord::new().with("Doors", 2.0)).unwrap();
        assert_eq!(vector.get("Levy"), Some(0.0));
        assert_eq!(vector.get("Category_Sedan"), Some(0.0));
    }

    #[test]
    fn test_extra_columns_dropped() {
        let aligner = SchemaAligner::new(schema(&["Doors"]));
        let record = RawRecord::new().with("Doors", 5.0).with("Airbags", 8.0);
        let vector = aligner.align(&record).unwrap();
        assert_eq!(vector.values(), &[5.0]);
    }

    #[test]
    fn test_lenient_policy_zeroes_unseen_category() {
        let aligner = SchemaAligner::new(sedan_schema());
        let record = sedan().with("Category", "Limousine");
        let vector = aligner.align(&record).unwrap();
        assert_eq!(vector.get("Category_SUV"), Some(0.0));
        assert_eq!(vector.get("Category_Sedan"), Some(0.0));
        assert_eq!(
            vector.unmatched(),
            &[UnmatchedCategory {
                field: "Category".to_string(),
                value: "Limousine".to_string(),
            }]
        );
    }

    #[test]
    fn test_strict_policy_rejects_unseen_category() {
        let aligner = SchemaAligner::new(sedan_schema()).with_policy(CategoryPolicy::Strict);
        let record = sedan().with("Color", "Magenta");
        match aligner.align(&record) {
            Err(PricingError::UnseenCategory { field, value }) => {
                assert_eq!(field, "Color");
                assert_eq!(value, "Magenta");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_strict_policy_ignores_fields_the_model_never_used() {
        let aligner = SchemaAligner::new(sedan_schema()).with_policy(CategoryPolicy::Strict);
        let record = sedan().with("Wheel", "Right wheel");
        assert!(aligner.align(&record).is_ok());
    }

    #[test]
    fn test_label_encoded_field() {
        let encoder = LabelEncoder::new(
            "Manufacturer",
            vec!["Audi".to_string(), "BMW".to_string(), "Toyota".to_string()],
        )
        .unwrap();
        let aligner = SchemaAligner::new(schema(&["Manufacturer", "Doors"]))
            .with_label_encoder(Arc::new(encoder));
        let record = RawRecord::new()
            .with("Manufacturer", "Toyota")
            .with("Doors", 4.0);
        assert_eq!(aligner.align(&record).unwrap().values(), &[2.0, 4.0]);

        let record = RawRecord::new().with("Manufacturer", "Lada");
        assert!(matches!(
            aligner.align(&record),
            Err(PricingError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_manufacturer_one_hot_without_encoder() {
        let aligner = SchemaAligner::new(schema(&["Manufacturer_BMW", "Manufacturer_Toyota"]));
        let record = RawRecord::new().with("Manufacturer", "Toyota");
        assert_eq!(aligner.align(&record).unwrap().values(), &[0.0, 1.0]);
    }

    #[test]
    fn test_text_for_numeric_column_without_encoder_rejected() {
        let record = RawRecord::new()
            .with("Manufacturer", "Toyota")
            .with("Doors", 4.0);
        for policy in [CategoryPolicy::Lenient, CategoryPolicy::Strict] {
            let aligner =
                SchemaAligner::new(schema(&["Manufacturer", "Doors"])).with_policy(policy);
            match aligner.align(&record) {
                Err(PricingError::SchemaMismatch(msg)) => {
                    assert!(msg.contains("Manufacturer"))
                }
                other => panic!("unexpected result under {:?}: {:?}", policy, other),
            }
        }
    }

    #[test]
    fn test_non_finite_number_rejected() {
        let aligner = SchemaAligner::new(schema(&["Levy"]));
        let record = RawRecord::new().with("Levy", f64::INFINITY);
        assert!(matches!(
            aligner.align(&record),
            Err(PricingError::InvalidAttribute { .. })
        ));
    }
}
