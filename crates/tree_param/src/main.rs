//! IPPAN Split Search CLI
//!
//! Searches the root node of a gradient dataset for its best split and
//! prints a reproducible JSON report.

use anyhow::{Context, Result};
use clap::Parser;
use ippan_tree_param::{search_dataset, GradientDataset, TrainParam};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "split-search")]
#[command(author = "IPPAN Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic best-split search for gradient-boosted trees", long_about = None)]
struct Args {
    /// Input CSV dataset path (feature columns, then grad and hess)
    #[arg(short, long)]
    input: PathBuf,

    /// TOML file with tree parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Monotone constraints, e.g. "(1,0,-1)"
    #[arg(long)]
    monotone: Option<String>,

    /// Parameter override as key=value (repeatable)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Apply TREE_PARAM_* environment overrides
    #[arg(long)]
    env: bool,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_params(args: &Args) -> Result<TrainParam> {
    let mut param = match &args.config {
        Some(path) => TrainParam::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TrainParam::default(),
    };

    if args.env {
        param
            .apply_env_overrides()
            .context("Invalid TREE_PARAM_* override")?;
    }

    for pair in &args.params {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got `{pair}`"))?;
        param
            .set_field(key, value)
            .with_context(|| format!("Invalid parameter override `{pair}`"))?;
    }

    if let Some(text) = &args.monotone {
        param.monotone_constraints = text.parse().context("Invalid --monotone value")?;
    }

    for warning in param.validate().context("Invalid tree parameters")? {
        tracing::warn!("{}", warning);
    }
    Ok(param)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // stdout carries the report
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("IPPAN Split Search v{}", env!("CARGO_PKG_VERSION"));
    info!("═══════════════════════════════════════════");

    let param = load_params(&args)?;

    info!("Loading dataset from: {}", args.input.display());
    let dataset = GradientDataset::from_csv(&args.input).context("Failed to load dataset")?;
    info!(
        "Loaded {} rows with {} features",
        dataset.len(),
        dataset.feature_count
    );
    if param.monotone_constraints.len() > dataset.feature_count {
        anyhow::bail!(
            "{} monotone constraints given for {} features",
            param.monotone_constraints.len(),
            dataset.feature_count
        );
    }

    info!("Feature statistics:");
    for (i, stats) in dataset.feature_stats().iter().enumerate() {
        match stats {
            Some((min, max)) => info!("  Feature {}: min={}, max={}", i, min, max),
            None => info!("  Feature {}: all values missing", i),
        }
    }

    info!("Search configuration:");
    info!("  reg_lambda: {}", param.reg_lambda);
    info!("  reg_alpha: {}", param.reg_alpha);
    info!("  min_child_weight: {}", param.min_child_weight);
    info!("  max_delta_step: {}", param.max_delta_step);
    info!("  default_direction: {}", param.default_direction);
    info!("  monotone_constraints: {}", param.monotone_constraints);

    info!("═══════════════════════════════════════════");
    let report = search_dataset(&dataset, &param);

    if report.split.pruned {
        info!("No split kept; node stays a leaf (weight {})", report.split.leaf_weight);
    } else {
        info!(
            "Best split: feature {} < {} (missing {}), loss_chg {}",
            report.split.feature,
            report.split.entry.split_value,
            if report.split.default_left { "left" } else { "right" },
            report.split.entry.loss_chg
        );
    }
    info!("  Digest: {}", report.digest);

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &json).context("Failed to write report")?;
            info!("✓ Report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
