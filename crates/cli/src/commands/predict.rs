//! Price prediction command

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use pricing_lib::{
    CurrencyConverter, DisplayPrice, PredictionRequest, PriceEstimate, PricePredictor,
    VehicleAttributes,
};
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

use crate::output::{
    format_currency, format_importance, print_info, print_json, print_table, print_warning,
    OutputFormat,
};

/// Attribute flags replaced wholesale by `--input`
const ATTRIBUTE_FLAGS: [&str; 16] = [
    "manufacturer",
    "category",
    "fuel_type",
    "gear_box_type",
    "drive_wheels",
    "leather_interior",
    "wheel",
    "color",
    "doors",
    "engine_volume",
    "turbo",
    "mileage",
    "levy",
    "production_year",
    "airbags",
    "model_group",
];

/// Vehicle attributes, given as flags or as a JSON document
#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// JSON file with the vehicle attributes ("-" reads stdin)
    #[arg(long, short, conflicts_with_all = ATTRIBUTE_FLAGS)]
    pub input: Option<PathBuf>,

    #[arg(long, required_unless_present = "input")]
    pub manufacturer: Option<String>,

    /// Body category, e.g. Sedan, Jeep, Hatchback
    #[arg(long, required_unless_present = "input")]
    pub category: Option<String>,

    #[arg(long, required_unless_present = "input")]
    pub fuel_type: Option<String>,

    #[arg(long, required_unless_present = "input")]
    pub gear_box_type: Option<String>,

    #[arg(long, required_unless_present = "input")]
    pub drive_wheels: Option<String>,

    #[arg(long)]
    pub leather_interior: bool,

    #[arg(long, default_value = "Left wheel")]
    pub wheel: String,

    #[arg(long, required_unless_present = "input")]
    pub color: Option<String>,

    #[arg(long, required_unless_present = "input")]
    pub doors: Option<u8>,

    /// Engine volume in liters
    #[arg(long, required_unless_present = "input")]
    pub engine_volume: Option<f64>,

    #[arg(long)]
    pub turbo: bool,

    /// Odometer reading in km
    #[arg(long, required_unless_present = "input")]
    pub mileage: Option<u32>,

    #[arg(long, default_value_t = 0)]
    pub levy: u32,

    #[arg(long, required_unless_present = "input")]
    pub production_year: Option<i32>,

    #[arg(long)]
    pub airbags: Option<u8>,

    /// Coarse model bucket (defaults to Other)
    #[arg(long)]
    pub model_group: Option<String>,

    /// Include the ensemble price range
    #[arg(long)]
    pub range: bool,

    /// Include the most influential features
    #[arg(long)]
    pub importance: bool,

    /// Display currency
    #[arg(long, default_value = "USD")]
    pub currency: String,
}

impl PredictArgs {
    pub fn attributes(&self) -> Result<VehicleAttributes> {
        if let Some(path) = &self.input {
            let content = if path.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
            } else {
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?
            };
            return serde_json::from_str(&content).context("Failed to parse vehicle attributes");
        }

        Ok(VehicleAttributes {
            manufacturer: required(&self.manufacturer, "manufacturer")?,
            category: required(&self.category, "category")?,
            fuel_type: required(&self.fuel_type, "fuel-type")?,
            gear_box_type: required(&self.gear_box_type, "gear-box-type")?,
            drive_wheels: required(&self.drive_wheels, "drive-wheels")?,
            leather_interior: self.leather_interior,
            wheel: self.wheel.clone(),
            color: required(&self.color, "color")?,
            doors: required(&self.doors, "doors")?,
            engine_volume: required(&self.engine_volume, "engine-volume")?,
            has_turbo: self.turbo,
            mileage: required(&self.mileage, "mileage")?,
            levy: self.levy,
            production_year: required(&self.production_year, "production-year")?,
            airbags: self.airbags,
            model_group: self.model_group.clone(),
        })
    }

    pub fn request(&self) -> PredictionRequest {
        PredictionRequest {
            with_range: self.range,
            with_importance: self.importance,
        }
    }
}

fn required<T: Clone>(value: &Option<T>, flag: &str) -> Result<T> {
    match value {
        Some(v) => Ok(v.clone()),
        None => bail!("--{} is required", flag),
    }
}

/// Estimate together with its currency view
#[derive(Serialize)]
struct PredictionReport<'a> {
    estimate: &'a PriceEstimate,
    display: DisplayPrice,
}

/// Row for the importance table
#[derive(Tabled, Serialize)]
struct ImportanceRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Importance")]
    importance: String,
}

/// Run a prediction and print it
pub fn predict(
    predictor: &PricePredictor,
    converter: &CurrencyConverter,
    args: &PredictArgs,
    format: OutputFormat,
) -> Result<()> {
    let attributes = args.attributes()?;
    let estimate = predictor.predict_attributes(&attributes, args.request())?;
    let display = converter.display(&estimate);

    match format {
        OutputFormat::Json => print_json(&PredictionReport {
            estimate: &estimate,
            display,
        }),
        OutputFormat::Table => print_report(&estimate, &display),
    }
}

fn print_report(estimate: &PriceEstimate, display: &DisplayPrice) -> Result<()> {
    for warning in &estimate.warnings {
        print_warning(warning);
    }
    for unmatched in &estimate.unmatched {
        print_warning(&format!(
            "{} '{}' is unknown to the model and was ignored",
            unmatched.field, unmatched.value
        ));
    }

    println!("{}", "Price Estimate".bold());
    println!("{}", "=".repeat(50));
    println!(
        "Estimated price:        {}",
        format_currency(display.price, &display.currency).green().bold()
    );

    if let (Some(range), Some(lower), Some(upper)) = (&estimate.range, display.lower, display.upper)
    {
        println!(
            "Likely range (p{:.0}-p{:.0}): {} - {}",
            range.lower_percentile,
            range.upper_percentile,
            format_currency(lower, &display.currency),
            format_currency(upper, &display.currency)
        );
        println!("Ensemble members:       {}", range.members);
    }
    println!("Model version:          {}", estimate.model_version.cyan());
    println!();

    if let Some(features) = &estimate.top_features {
        println!("{}", "Most influential features".bold());
        let rows: Vec<ImportanceRow> = features
            .iter()
            .enumerate()
            .map(|(i, f)| ImportanceRow {
                rank: i + 1,
                feature: f.feature.clone(),
                importance: format_importance(f.importance),
            })
            .collect();
        print_table(&rows, OutputFormat::Table)?;
    }

    if display.currency != "USD" {
        print_info(&format!(
            "Converted from USD at {} {} per dollar",
            display.rate, display.currency
        ));
    }
    Ok(())
}
