//! Core data models for vehicle price estimation

use crate::error::{PricingError, Result};
use crate::predictor::ColumnSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Year the training data's `Car_Age` column was computed against
pub const REFERENCE_YEAR: i32 = 2025;

/// Oldest production year accepted by the input form
pub const MIN_PRODUCTION_YEAR: i32 = 1980;

pub const MIN_DOORS: u8 = 2;
pub const MAX_DOORS: u8 = 5;
pub const MIN_ENGINE_VOLUME: f64 = 0.8;
pub const MAX_ENGINE_VOLUME: f64 = 6.0;
pub const MAX_MILEAGE_KM: u32 = 500_000;
pub const MAX_LEVY: u32 = 10_000;
pub const MAX_AIRBAGS: u8 = 12;

/// Yearly mileage above which a record is flagged as implausible
pub const PLAUSIBLE_KM_PER_YEAR: u32 = 30_000;

/// Column names used by the training frame
pub mod fields {
    pub const MANUFACTURER: &str = "Manufacturer";
    pub const CATEGORY: &str = "Category";
    pub const FUEL_TYPE: &str = "Fuel type";
    pub const GEAR_BOX_TYPE: &str = "Gear box type";
    pub const DRIVE_WHEELS: &str = "Drive wheels";
    pub const LEATHER_INTERIOR: &str = "Leather interior";
    pub const WHEEL: &str = "Wheel";
    pub const COLOR: &str = "Color";
    pub const MODEL_GROUPED: &str = "Model_Grouped";
    pub const DOORS: &str = "Doors";
    pub const ENGINE_VOLUME: &str = "Engine volume";
    pub const AIRBAGS: &str = "Airbags";
    pub const HAS_TURBO: &str = "Has_Turbo";
    pub const MILEAGE: &str = "Mileage";
    pub const LEVY: &str = "Levy";
    pub const CAR_AGE: &str = "Car_Age";

    /// Text-valued fields, one-hot expanded unless label encoded
    pub const CATEGORICAL: &[&str] = &[
        MANUFACTURER,
        CATEGORY,
        FUEL_TYPE,
        GEAR_BOX_TYPE,
        DRIVE_WHEELS,
        LEATHER_INTERIOR,
        WHEEL,
        COLOR,
        MODEL_GROUPED,
    ];
}

/// A single field value in a raw attribute record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

/// Raw attribute record: field name to categorical or numeric value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, AttributeValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<AttributeValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn default_wheel() -> String {
    "Left wheel".to_string()
}

/// Typed vehicle attributes as entered on the input form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleAttributes {
    pub manufacturer: String,
    pub category: String,
    pub fuel_type: String,
    pub gear_box_type: String,
    pub drive_wheels: String,
    pub leather_interior: bool,
    #[serde(default = "default_wheel")]
    pub wheel: String,
    pub color: String,
    pub doors: u8,
    pub engine_volume: f64,
    #[serde(default)]
    pub has_turbo: bool,
    pub mileage: u32,
    #[serde(default)]
    pub levy: u32,
    pub production_year: i32,
    #[serde(default)]
    pub airbags: Option<u8>,
    /// Coarse model bucket; `Other` when not given
    #[serde(default)]
    pub model_group: Option<String>,
}

impl VehicleAttributes {
    /// Check every numeric field against the domain of the input form
    pub fn validate(&self, reference_year: i32) -> Result<()> {
        if !(MIN_DOORS..=MAX_DOORS).contains(&self.doors) {
            return Err(PricingError::invalid(
                fields::DOORS,
                format!("{} is outside {}..={}", self.doors, MIN_DOORS, MAX_DOORS),
            ));
        }
        if !self.engine_volume.is_finite()
            || !(MIN_ENGINE_VOLUME..=MAX_ENGINE_VOLUME).contains(&self.engine_volume)
        {
            return Err(PricingError::invalid(
                fields::ENGINE_VOLUME,
                format!(
                    "{} is outside {}..={} liters",
                    self.engine_volume, MIN_ENGINE_VOLUME, MAX_ENGINE_VOLUME
                ),
            ));
        }
        if self.mileage > MAX_MILEAGE_KM {
            return Err(PricingError::invalid(
                fields::MILEAGE,
                format!("{} km exceeds {}", self.mileage, MAX_MILEAGE_KM),
            ));
        }
        if self.levy > MAX_LEVY {
            return Err(PricingError::invalid(
                fields::LEVY,
                format!("{} exceeds {}", self.levy, MAX_LEVY),
            ));
        }
        if let Some(airbags) = self.airbags {
            if airbags > MAX_AIRBAGS {
                return Err(PricingError::invalid(
                    fields::AIRBAGS,
                    format!("{} exceeds {}", airbags, MAX_AIRBAGS),
                ));
            }
        }
        if !(MIN_PRODUCTION_YEAR..=reference_year).contains(&self.production_year) {
            return Err(PricingError::invalid(
                "production_year",
                format!(
                    "{} is outside {}..={}",
                    self.production_year, MIN_PRODUCTION_YEAR, reference_year
                ),
            ));
        }
        for (field, value) in [
            (fields::MANUFACTURER, &self.manufacturer),
            (fields::CATEGORY, &self.category),
            (fields::FUEL_TYPE, &self.fuel_type),
            (fields::GEAR_BOX_TYPE, &self.gear_box_type),
            (fields::DRIVE_WHEELS, &self.drive_wheels),
            (fields::WHEEL, &self.wheel),
            (fields::COLOR, &self.color),
        ] {
            if value.trim().is_empty() {
                return Err(PricingError::invalid(field, "must not be empty"));
            }
        }
        Ok(())
    }

    pub fn car_age(&self, reference_year: i32) -> i32 {
        reference_year - self.production_year
    }

    /// Validate and convert into the raw record layout of the training frame
    pub fn to_record(&self, reference_year: i32) -> Result<RawRecord> {
        self.validate(reference_year)?;

        let leather = if self.leather_interior { "Yes" } else { "No" };
        let mut record = RawRecord::new()
            .with(fields::MANUFACTURER, self.manufacturer.as_str())
            .with(fields::CATEGORY, self.category.as_str())
            .with(fields::FUEL_TYPE, self.fuel_type.as_str())
            .with(fields::GEAR_BOX_TYPE, self.gear_box_type.as_str())
            .with(fields::DRIVE_WHEELS, self.drive_wheels.as_str())
            .with(fields::LEATHER_INTERIOR, leather)
            .with(fields::WHEEL, self.wheel.as_str())
            .with(fields::COLOR, self.color.as_str())
            .with(fields::DOORS, f64::from(self.doors))
            .with(fields::ENGINE_VOLUME, self.engine_volume)
            .with(fields::HAS_TURBO, if self.has_turbo { 1.0 } else { 0.0 })
            .with(fields::MILEAGE, f64::from(self.mileage))
            .with(fields::LEVY, f64::from(self.levy))
            .with(fields::CAR_AGE, f64::from(self.car_age(reference_year)))
            .with(
                fields::MODEL_GROUPED,
                self.model_group.as_deref().unwrap_or("Other"),
            );
        if let Some(airbags) = self.airbags {
            record.insert(fields::AIRBAGS, f64::from(airbags));
        }
        Ok(record)
    }

    /// Non-blocking plausibility checks
    pub fn plausibility_warnings(&self, reference_year: i32) -> Vec<String> {
        let mut warnings = Vec::new();
        let age = self.car_age(reference_year).max(0) as u64;
        if u64::from(self.mileage) > age * u64::from(PLAUSIBLE_KM_PER_YEAR) {
            warnings.push(format!(
                "Mileage of {} km looks high for a {} year old vehicle",
                self.mileage, age
            ));
        }
        warnings
    }
}

/// A categorical value that matched no schema column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedCategory {
    pub field: String,
    pub value: String,
}

/// Numeric feature row aligned to the model-column schema
#[derive(Debug, Clone)]
pub struct AlignedFeatureVector {
    schema: Arc<ColumnSchema>,
    values: Vec<f64>,
    unmatched: Vec<UnmatchedCategory>,
}

impl AlignedFeatureVector {
    pub(crate) fn new(
        schema: Arc<ColumnSchema>,
        values: Vec<f64>,
        unmatched: Vec<UnmatchedCategory>,
    ) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Self {
            schema,
            values,
            unmatched,
        }
    }

    /// Build a vector directly from values, for models exercised without a record
    pub fn from_values(schema: Arc<ColumnSchema>, values: Vec<f64>) -> Result<Self> {
        if schema.len() != values.len() {
            return Err(PricingError::SchemaMismatch(format!(
                "{} values for a schema of {} columns",
                values.len(),
                schema.len()
            )));
        }
        Ok(Self::new(schema, values, Vec::new()))
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    /// Value of a named column, if the schema has it
    pub fn get(&self, column: &str) -> Option<f64> {
        self.schema.position(column).map(|i| self.values[i])
    }

    /// Categorical values that contributed no indicator column
    pub fn unmatched(&self) -> &[UnmatchedCategory] {
        &self.unmatched
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Percentile range over ensemble member predictions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub lower: f64,
    pub upper: f64,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    pub members: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Price estimate returned to the presentation layer, in USD
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceEstimate {
    pub price_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<PriceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_features: Option<Vec<FeatureImportance>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmatched: Vec<UnmatchedCategory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub model_version: String,
    pub generated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toyota() -> VehicleAttributes {
        VehicleAttributes {
            manufacturer: "Toyota".to_string(),
            category: "Sedan".to_string(),
            fuel_type: "Petrol".to_string(),
            gear_box_type: "Automatic".to_string(),
            drive_wheels: "Front".to_string(),
            leather_interior: true,
            wheel: default_wheel(),
            color: "Black".to_string(),
            doors: 4,
            engine_volume: 2.0,
            has_turbo: false,
            mileage: 60_000,
            levy: 0,
            production_year: 2018,
            airbags: None,
            model_group: None,
        }
    }

    #[test]
    fn test_record_layout() {
        let record = toyota().to_record(REFERENCE_YEAR).unwrap();
        assert_eq!(record.get(fields::CAR_AGE), Some(&AttributeValue::Number(7.0)));
        assert_eq!(record.get(fields::HAS_TURBO), Some(&AttributeValue::Number(0.0)));
        assert_eq!(
            record.get(fields::LEATHER_INTERIOR),
            Some(&AttributeValue::from("Yes"))
        );
        assert_eq!(
            record.get(fields::MODEL_GROUPED),
            Some(&AttributeValue::from("Other"))
        );
        assert!(record.get(fields::AIRBAGS).is_none());
    }

    #[test]
    fn test_airbags_included_when_present() {
        let mut attrs = toyota();
        attrs.airbags = Some(6);
        let record = attrs.to_record(REFERENCE_YEAR).unwrap();
        assert_eq!(record.get(fields::AIRBAGS), Some(&AttributeValue::Number(6.0)));
    }

    #[test]
    fn test_domain_validation() {
        let mut attrs = toyota();
        attrs.doors = 7;
        assert!(matches!(
            attrs.validate(REFERENCE_YEAR),
            Err(PricingError::InvalidAttribute { .. })
        ));

        let mut attrs = toyota();
        attrs.engine_volume = f64::NAN;
        assert!(attrs.validate(REFERENCE_YEAR).is_err());

        let mut attrs = toyota();
        attrs.production_year = 2030;
        assert!(attrs.to_record(REFERENCE_YEAR).is_err());

        let mut attrs = toyota();
        attrs.color = "  ".to_string();
        assert!(attrs.validate(REFERENCE_YEAR).is_err());
    }

    #[test]
    fn test_mileage_plausibility() {
        assert!(toyota().plausibility_warnings(REFERENCE_YEAR).is_empty());

        let mut attrs = toyota();
        attrs.mileage = 400_000;
        let warnings = attrs.plausibility_warnings(REFERENCE_YEAR);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("400000"));
    }

    #[test]
    fn test_record_deserializes_mixed_values() {
        let record: RawRecord =
            serde_json::from_str(r#"{"Category": "SUV", "Doors": 4}"#).unwrap();
        assert_eq!(record.get("Category"), Some(&AttributeValue::from("SUV")));
        assert_eq!(record.get("Doors"), Some(&AttributeValue::Number(4.0)));
    }

    #[test]
    fn test_attributes_defaults_from_json() {
        let attrs: VehicleAttributes = serde_json::from_str(
            r#"{
                "manufacturer": "BMW", "category": "Coupe", "fuel_type": "Diesel",
                "gear_box_type": "Manual", "drive_wheels": "Rear",
                "leather_interior": false, "color": "White", "doors": 2,
                "engine_volume": 3.0, "mileage": 10000, "production_year": 2022
            }"#,
        )
        .unwrap();
        assert_eq!(attrs.wheel, "Left wheel");
        assert_eq!(attrs.levy, 0);
        assert!(!attrs.has_turbo);
        assert!(attrs.airbags.is_none());
    }
}
