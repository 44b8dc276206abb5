//! CLI argument parsing for claimscreen

use crate::config::ScreeningConfig;
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Named starting points for the screening thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Tukey fence (1.5 x IQR), groups of 4 or more
    Standard,
    /// Far-out fence (3 x IQR), groups of 8 or more
    Strict,
    /// Tight fence (1 x IQR), groups of 4 or more
    Permissive,
}

impl Preset {
    pub fn config(self) -> ScreeningConfig {
        match self {
            Preset::Standard => ScreeningConfig::default(),
            Preset::Strict => ScreeningConfig::strict(),
            Preset::Permissive => ScreeningConfig::permissive(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "claimscreen")]
#[command(version)]
#[command(
    about = "Flag billing providers whose claims are upper-tail IQR outliers among same-procedure, same-month peers",
    long_about = None
)]
pub struct Cli {
    /// Claims CSV, sorted by HCPCS code then claim month
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output CSV for flagged rows
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "outlier_billing_providers_multi.csv"
    )]
    pub output: PathBuf,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Threshold preset; the individual flags below still override it
    #[arg(long, value_enum)]
    pub preset: Option<Preset>,

    /// Minimum present values needed to score a metric in a peer group
    #[arg(long = "min-group-size", value_name = "N")]
    pub min_group_size: Option<usize>,

    /// IQR multiplier for the upper fence (Q3 + X * IQR)
    #[arg(long = "iqr-multiplier", value_name = "X")]
    pub iqr_multiplier: Option<f64>,

    /// Classification worker threads
    #[arg(short = 'j', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Closed peer groups buffered ahead of the workers
    #[arg(long = "queue-capacity", value_name = "N")]
    pub queue_capacity: Option<usize>,

    /// With more than one worker, write groups as they finish instead of in
    /// input order (same rows, run-to-run order may differ)
    #[arg(long)]
    pub unordered: bool,

    /// Also write the run summary as JSON
    #[arg(long = "summary-json", value_name = "FILE")]
    pub summary_json: Option<PathBuf>,

    /// Do not print the summary report to stderr
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable trace-level logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Build the effective configuration: file or preset, then flag overrides
    pub fn resolve_config(&self) -> Result<ScreeningConfig> {
        let mut config = match (&self.config, self.preset) {
            (Some(path), _) => ScreeningConfig::from_toml_file(path)?,
            (None, Some(preset)) => preset.config(),
            (None, None) => ScreeningConfig::default(),
        };

        if let Some(n) = self.min_group_size {
            config.min_group_size = n;
        }
        if let Some(x) = self.iqr_multiplier {
            config.iqr_multiplier = x;
        }
        if let Some(n) = self.workers {
            config.workers = n;
        }
        if let Some(n) = self.queue_capacity {
            config.queue_capacity = n;
        }
        if self.unordered {
            config.ordered_output = false;
        }

        config.validate()?;
        Ok(config)
    }
}
