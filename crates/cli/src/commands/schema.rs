//! Schema inspection commands

use anyhow::{bail, Result};
use pricing_lib::{fields, PricePredictor, INDICATOR_SEPARATOR};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_table, OutputFormat};

/// Row for the column schema table
#[derive(Tabled, Serialize)]
struct ColumnRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Kind")]
    kind: String,
}

/// Row for the category vocabulary table
#[derive(Tabled, Serialize)]
struct VocabRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Encoding")]
    encoding: String,
    #[tabled(rename = "Known values")]
    #[serde(skip)]
    joined: String,
    #[tabled(skip)]
    values: Vec<String>,
}

/// Categorical field a one-hot column was expanded from
fn indicator_field(column: &str) -> Option<&'static str> {
    fields::CATEGORICAL.iter().copied().find(|field| {
        column
            .strip_prefix(field)
            .and_then(|rest| rest.strip_prefix(INDICATOR_SEPARATOR))
            .is_some_and(|value| !value.is_empty())
    })
}

/// Show the model's input columns in order
pub fn show_schema(predictor: &PricePredictor, format: OutputFormat) -> Result<()> {
    let aligner = predictor.aligner();
    let encoded = aligner.label_encoder().map(|e| e.field());

    let rows: Vec<ColumnRow> = aligner
        .schema()
        .columns()
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let kind = if Some(column.as_str()) == encoded {
                "label-encoded".to_string()
            } else if let Some(field) = indicator_field(column) {
                format!("indicator ({})", field)
            } else {
                "numeric".to_string()
            };
            ColumnRow {
                index,
                column: column.clone(),
                kind,
            }
        })
        .collect();

    print_table(&rows, format)
}

/// List the category values the model was trained on
pub fn show_vocab(
    predictor: &PricePredictor,
    field: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let aligner = predictor.aligner();
    let selected: Vec<&str> = match field {
        Some(name) => match fields::CATEGORICAL
            .iter()
            .find(|known| known.eq_ignore_ascii_case(name))
        {
            Some(known) => vec![*known],
            None => bail!(
                "Unknown categorical field '{}' (expected one of: {})",
                name,
                fields::CATEGORICAL.join(", ")
            ),
        },
        None => fields::CATEGORICAL.to_vec(),
    };

    let rows: Vec<VocabRow> = selected
        .into_iter()
        .filter_map(|name| {
            let (encoding, values): (&str, Vec<String>) = match aligner.label_encoder() {
                Some(encoder) if encoder.field() == name => {
                    ("label", encoder.classes().to_vec())
                }
                _ => (
                    "one-hot",
                    aligner
                        .schema()
                        .categories_for(name)
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                ),
            };
            if values.is_empty() {
                return None;
            }
            Some(VocabRow {
                field: name.to_string(),
                encoding: encoding.to_string(),
                joined: values.join(", "),
                values,
            })
        })
        .collect();

    print_table(&rows, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_field() {
        assert_eq!(indicator_field("Category_Sedan"), Some("Category"));
        assert_eq!(indicator_field("Fuel type_Plug-in Hybrid"), Some("Fuel type"));
        assert_eq!(indicator_field("Model_Grouped_Other"), Some("Model_Grouped"));
        assert_eq!(indicator_field("Car_Age"), None);
        assert_eq!(indicator_field("Has_Turbo"), None);
        assert_eq!(indicator_field("Category_"), None);
    }
}
