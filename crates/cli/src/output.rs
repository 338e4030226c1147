//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(
    items: &[T],
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return Ok(());
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => print_json(&items)?,
    }
    Ok(())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Group the integer part of a whole number with commas
pub fn format_thousands(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Format a price with no decimals, e.g. `$12,346 USD`
pub fn format_currency(amount: f64, currency: &str) -> String {
    let amount = format_thousands(amount);
    match currency {
        "USD" | "MXN" => format!("${} {}", amount, currency),
        "EUR" => format!("€{} {}", amount, currency),
        "GBP" => format!("£{} {}", amount, currency),
        _ => format!("{} {}", amount, currency),
    }
}

/// Format a relative importance as a percentage
pub fn format_importance(importance: f64) -> String {
    format!("{:.1}%", importance * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.4), "999");
        assert_eq!(format_thousands(1_000.0), "1,000");
        assert_eq!(format_thousands(12_345.6), "12,346");
        assert_eq!(format_thousands(1_234_567.0), "1,234,567");
        assert_eq!(format_thousands(-4_500.0), "-4,500");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(12_250.0, "USD"), "$12,250 USD");
        assert_eq!(format_currency(208_250.0, "MXN"), "$208,250 MXN");
        assert_eq!(format_currency(1_500.0, "EUR"), "€1,500 EUR");
        assert_eq!(format_currency(1_500.0, "JPY"), "1,500 JPY");
    }

    #[test]
    fn test_format_importance() {
        assert_eq!(format_importance(0.4567), "45.7%");
        assert_eq!(format_importance(1.0), "100.0%");
    }
}
