#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the crop risk toolchain.
//!
//! `hist-mean` reduces historical crop model runs to per-category yield
//! baselines; `impact` turns a scenario run into relative yield anomalies
//! and computes their impact on an exposure; `spam` extracts a SPAM
//! agricultural table as exposure JSON. All jobs read their settings from
//! one TOML file (see [`config`]).
//!
//! Uses `indicatif-log-bridge` (via [`crop_risk_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress`.

mod config;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::RunConfig;

#[derive(Parser)]
#[command(name = "crop_risk", about = "Crop yield climate risk toolchain")]
struct Cli {
    /// Path to the TOML run configuration
    #[arg(long, default_value = "crop_risk.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build historical-mean yield baselines from historical model runs
    HistMean {
        /// Override the configured output path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compute the impact of a relative yield hazard on an exposure
    Impact {
        /// Only these events, comma-separated (overrides the configuration)
        #[arg(long, value_delimiter = ',')]
        events: Option<Vec<String>>,
        /// Only this region id (overrides the configuration)
        #[arg(long)]
        region: Option<u32>,
        /// Override the configured output path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Extract a SPAM agricultural table as exposures
    Spam {
        /// Override the configured country (ISO3 code or name)
        #[arg(long)]
        country: Option<String>,
        /// Override the configured output path
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crop_risk_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = RunConfig::from_path(&cli.config)?;

    match cli.command {
        Commands::HistMean { output } => {
            let mut hist = config
                .hist_mean
                .ok_or("Configuration has no [hist_mean] section")?;
            if let Some(output) = output {
                hist.output = output;
            }
            let baseline = run::hist_mean(&hist, &multi)?;
            println!(
                "Historical means for {} categories over {}",
                baseline.categories.len(),
                baseline.yearrange
            );
        }
        Commands::Impact {
            events,
            region,
            output,
        } => {
            let mut impact = config
                .impact
                .ok_or("Configuration has no [impact] section")?;
            if events.is_some() {
                impact.events = events;
            }
            if region.is_some() {
                impact.region = region;
            }
            if let Some(output) = output {
                impact.output = output;
            }
            let summary = run::impact(&impact)?;
            println!(
                "aai_agg = {} {} ({} excluded points)",
                summary.aai_agg, summary.unit, summary.excluded_points
            );
        }
        Commands::Spam { country, output } => {
            let mut spam = config.spam.ok_or("Configuration has no [spam] section")?;
            if country.is_some() {
                spam.load.country = country;
            }
            if let Some(output) = output {
                spam.output = output;
            }
            let exposures = run::spam(&spam)?;
            println!(
                "{} SPAM cells, total {:.1} {}",
                exposures.len(),
                exposures.total_value(),
                exposures.value_unit
            );
        }
    }

    Ok(())
}
