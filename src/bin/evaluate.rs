//! Score a persisted prediction report.
//!
//! ## Usage
//!
//! ```bash
//! # Default overlaps, background segments included
//! cargo run --bin evaluate -- results/test.json
//!
//! # Exclude class 0 from segment F1 and append the row to a metrics log
//! cargo run --bin evaluate -- results/test.json --background 0 \
//!     --metrics-log results/test_metrics.csv --epoch 49
//! ```

use action_seg_eval::{config::Config, metrics_log::MetricsLog, report::PredictionReport, Checkpoint};
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON report mapping each video to its ground truth and predictions
    report: PathBuf,

    /// JSON config file; command-line options override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// IoU thresholds for segment F1
    #[arg(long, value_delimiter = ',')]
    overlaps: Option<Vec<f64>>,

    /// Classes excluded from segment metrics
    #[arg(long, value_delimiter = ',', conflicts_with = "eval_background")]
    background: Option<Vec<usize>>,

    /// Keep background segments in segment metrics
    #[arg(long)]
    eval_background: bool,

    /// Also report the Edit score
    #[arg(long)]
    eval_edit: bool,

    /// CSV metrics log to append the result to
    #[arg(long)]
    metrics_log: Option<PathBuf>,

    /// Column prefix in the metrics log
    #[arg(long, default_value = "test-metric")]
    prefix: String,

    /// Epoch recorded in the metrics log
    #[arg(long, default_value_t = -1)]
    epoch: i64,
}

impl Args {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(overlaps) = &self.overlaps {
            config.overlaps = overlaps.clone();
        }
        if let Some(background) = &self.background {
            config.background_classes = background.clone();
            config.eval_background = false;
        }
        if self.eval_background {
            config.eval_background = true;
        }
        if self.eval_edit {
            config.eval_edit = true;
        }

        config.validate().context("Invalid evaluation settings")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config = args.config()?;

    let report = PredictionReport::read_json(&args.report)
        .with_context(|| format!("Failed to read report {}", args.report.display()))?;

    let mut checkpoint = Checkpoint::from_config(args.epoch, &config)?;
    let recorded = checkpoint.record_report(&report)?;
    if recorded == 0 {
        bail!("Report {} has no video with ground truth", args.report.display());
    }
    info!("Recorded {recorded} of {} videos", report.len());

    let metrics = checkpoint.compute_metrics();
    println!("{}", metrics.to_log_line());

    if let Some(path) = &args.metrics_log {
        let mut log = MetricsLog::open(path)
            .with_context(|| format!("Failed to open metrics log {}", path.display()))?;
        log.append(args.epoch, &args.prefix, metrics)
            .with_context(|| format!("Failed to append to {}", path.display()))?;
    }

    Ok(())
}
