//! Heatmap raster command-line tool.
//!
//! Validates raster sources, reports their value distribution and shows how
//! a layer preset colors individual values.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use heatmap_cli::commands;
use heatmap_cli::config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "heatmap-cli")]
#[command(about = "Validate, inspect and colorize heatmap rasters")]
struct Args {
    /// Log level
    #[arg(long, global = true, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Preset file layered over the built-in presets (YAML, or JSON by extension)
    #[arg(long, global = true, env = "HEATMAP_PRESETS")]
    presets: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that a source is a readable raster
    Validate {
        /// File path or http(s) URL
        source: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize a raster's values and the scale a preset derives from them
    Inspect {
        /// File path or http(s) URL
        source: String,

        /// Layer preset
        #[arg(short, long, default_value = "lst")]
        preset: String,

        /// Include the heat island class breakdown
        #[arg(long)]
        classes: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the color each raw value gets
    Colorize {
        /// File path or http(s) URL
        source: String,

        /// Layer preset
        #[arg(short, long, default_value = "lst")]
        preset: String,

        /// Raw sample values
        #[arg(short, long = "value", required = true, num_args = 1.., allow_negative_numbers = true)]
        values: Vec<f64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = CliConfig::load(args.presets.as_deref())?;
    info!(command = ?args.command, "Starting heatmap-cli");

    match args.command {
        Command::Validate { source, json } => {
            let report = commands::validate(&config, &source).await?;
            print(&report, json)?;
            if !report.valid {
                anyhow::bail!("{} is not a valid raster", source);
            }
        }
        Command::Inspect {
            source,
            preset,
            classes,
            json,
        } => {
            let report = commands::inspect(&config, &source, &preset, classes).await?;
            print(&report, json)?;
        }
        Command::Colorize {
            source,
            preset,
            values,
            json,
        } => {
            let report = commands::colorize(&config, &source, &preset, &values).await?;
            print(&report, json)?;
        }
    }

    Ok(())
}

fn print<R: Serialize + std::fmt::Display>(report: &R, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}
