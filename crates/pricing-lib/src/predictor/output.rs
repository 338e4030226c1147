//! Display conversion of price estimates
//!
//! The model predicts in USD. Conversion to another currency is a
//! presentation step that produces a separate value and leaves the
//! estimate untouched.

use crate::error::{PricingError, Result};
use crate::models::PriceEstimate;
use serde::Serialize;

/// Currency the model was trained in
pub const USD: &str = "USD";

/// Fixed exchange rate from USD to a display currency
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyConverter {
    code: String,
    rate: f64,
}

impl CurrencyConverter {
    pub fn usd() -> Self {
        Self {
            code: USD.to_string(),
            rate: 1.0,
        }
    }

    /// `rate` is the amount of `code` per 1 USD
    pub fn new(code: impl Into<String>, rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PricingError::invalid(
                "exchange_rate",
                format!("{} is not a positive finite rate", rate),
            ));
        }
        Ok(Self {
            code: code.into(),
            rate,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn convert(&self, usd: f64) -> f64 {
        usd * self.rate
    }

    pub fn display(&self, estimate: &PriceEstimate) -> DisplayPrice {
        DisplayPrice {
            currency: self.code.clone(),
            rate: self.rate,
            price: self.convert(estimate.price_usd),
            lower: estimate.range.map(|r| self.convert(r.lower)),
            upper: estimate.range.map(|r| self.convert(r.upper)),
        }
    }
}

impl Default for CurrencyConverter {
    fn default() -> Self {
        Self::usd()
    }
}

/// Price converted for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayPrice {
    pub currency: String,
    pub rate: f64,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceRange;

    fn estimate() -> PriceEstimate {
        PriceEstimate {
            price_usd: 12_345.67,
            range: Some(PriceRange {
                lower: 10_000.0,
                upper: 15_000.5,
                lower_percentile: 10.0,
                upper_percentile: 90.0,
                members: 100,
            }),
            top_features: None,
            unmatched: Vec::new(),
            warnings: Vec::new(),
            model_version: "v1".to_string(),
            generated_at: 0,
        }
    }

    #[test]
    fn test_conversion_is_exact_product() {
        let converter = CurrencyConverter::new("MXN", 17.0).unwrap();
        let display = converter.display(&estimate());
        assert_eq!(display.price, 12_345.67 * 17.0);
        assert_eq!(display.lower, Some(10_000.0 * 17.0));
        assert_eq!(display.upper, Some(15_000.5 * 17.0));
        assert_eq!(display.currency, "MXN");
    }

    #[test]
    fn test_conversion_leaves_estimate_untouched() {
        let original = estimate();
        let _ = CurrencyConverter::new("EUR", 0.92).unwrap().display(&original);
        assert_eq!(original.price_usd, 12_345.67);
        assert_eq!(original.range.map(|r| r.lower), Some(10_000.0));
    }

    #[test]
    fn test_usd_is_identity() {
        let display = CurrencyConverter::usd().display(&estimate());
        assert_eq!(display.price, 12_345.67);
    }

    #[test]
    fn test_without_range() {
        let mut estimate = estimate();
        estimate.range = None;
        let display = CurrencyConverter::usd().display(&estimate);
        assert!(display.lower.is_none() && display.upper.is_none());
    }

    #[test]
    fn test_invalid_rates() {
        assert!(CurrencyConverter::new("MXN", 0.0).is_err());
        assert!(CurrencyConverter::new("MXN", -1.0).is_err());
        assert!(CurrencyConverter::new("MXN", f64::INFINITY).is_err());
    }
}
