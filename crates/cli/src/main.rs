//! Vehicle Price Estimator CLI
//!
//! A command-line tool for estimating used-vehicle prices from trained
//! model artifacts and inspecting the model's input schema.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{predict, schema};
use pricing_lib::{render_metrics, ArtifactBundle, CategoryPolicy, PricePredictor};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Vehicle Price Estimator CLI
#[derive(Parser)]
#[command(name = "carprice")]
#[command(author, version, about = "CLI for the Vehicle Price Estimator", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/carprice/config.toml)
    #[arg(long, env = "CARPRICE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the model artifacts (overrides the config file)
    #[arg(long, env = "CARPRICE_ARTIFACTS", global = true)]
    pub artifacts: Option<PathBuf>,

    /// Reject category values the model has never seen
    #[arg(long, global = true)]
    pub strict: bool,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Print prediction metrics (Prometheus text format) after the command
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Estimate the price of a vehicle
    Predict(predict::PredictArgs),

    /// Show the model's input columns
    Schema,

    /// List the category values the model knows
    Vocab {
        /// Only show this field (e.g. Manufacturer, Category)
        #[arg(long)]
        field: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_predictor(config: &config::Config) -> Result<PricePredictor> {
    let paths = config.artifact_paths();
    debug!(
        model = %paths.model.display(),
        columns = %paths.columns.display(),
        "Loading artifacts"
    );

    let bundle = ArtifactBundle::load(&paths).with_context(|| {
        format!(
            "Failed to load artifacts from {}",
            config.artifacts.dir.display()
        )
    })?;
    let predictor =
        PricePredictor::from_bundle(bundle, config.category_policy, config.estimator_config())?
            .with_reference_year(config.reference_year);
    Ok(predictor)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.artifacts {
        config.artifacts.dir = dir;
    }
    if cli.strict {
        config.category_policy = CategoryPolicy::Strict;
    }

    let predictor = load_predictor(&config)?;

    // Execute command
    match &cli.command {
        Commands::Predict(args) => {
            let converter = config.converter(&args.currency)?;
            predict::predict(&predictor, &converter, args, cli.format)?;
        }
        Commands::Schema => {
            schema::show_schema(&predictor, cli.format)?;
        }
        Commands::Vocab { field } => {
            schema::show_vocab(&predictor, field.as_deref(), cli.format)?;
        }
    }

    if cli.metrics {
        eprint!("{}", render_metrics()?);
    }

    Ok(())
}
