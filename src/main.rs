//! # Tide Sites Application Entry Point
//!
//! Command line front end for the tide analysis library. It loads a water
//! level record, fits the harmonic model, predicts over a date range and
//! shows the result as terminal tables, an ASCII chart or a PPM image.
//!
//! ## Commands
//! - `analyze <csv|url>`: fit, predict and display in one go
//! - `predict --model m.json`: predict from a saved model
//! - `extrema --model m.json`: high and low waters from a saved model
//! - `constituents`: list the supported constituents
//!
//! Logs go to stderr and are filtered with `RUST_LOG`; results go to stdout.

// Test modules
#[cfg(test)]
mod tests;

use anyhow::{bail, Context};
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tide_sites_lib::{
    chart,
    config::Config,
    harmonics::Tide,
    observations,
    prediction::{self, PredictionError, PredictionRequest},
    renderer, LevelTable, Observation,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Tidal harmonic analysis and water level prediction
#[derive(Parser, Debug)]
#[command(name = "tide-sites")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./tide-config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit a harmonic model to a water level record and predict from it
    Analyze(AnalyzeArgs),

    /// Predict water levels from a saved model
    Predict(PredictArgs),

    /// List high and low waters from a saved model
    Extrema(ExtremaArgs),

    /// List the supported tidal constituents
    Constituents,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// CSV file or http(s) URL with `datetime, water level` columns
    pub source: String,

    /// First prediction date (defaults to the first observation's date)
    #[arg(long)]
    pub start: Option<String>,

    /// Last prediction date, inclusive (defaults to the last observation's date)
    #[arg(long)]
    pub end: Option<String>,

    /// Prediction interval in seconds, at least 3600
    #[arg(long)]
    pub interval: Option<i64>,

    /// Only fit and display the harmonic table
    #[arg(long)]
    pub no_prediction: bool,

    /// Print the combined data table
    #[arg(long)]
    pub show_data: bool,

    /// Write a PPM chart of source and prediction
    #[arg(long)]
    pub chart: Option<PathBuf>,

    /// Write the fitted model as JSON
    #[arg(long)]
    pub save_model: Option<PathBuf>,

    /// Write the combined dataset as CSV
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Model JSON written by `analyze --save-model`
    #[arg(long)]
    pub model: PathBuf,

    #[arg(long)]
    pub start: String,

    /// Inclusive
    #[arg(long)]
    pub end: String,

    /// Prediction interval in seconds, at least 3600
    #[arg(long)]
    pub interval: Option<i64>,

    /// Write the predictions as CSV instead of printing them
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ExtremaArgs {
    /// Model JSON written by `analyze --save-model`
    #[arg(long)]
    pub model: PathBuf,

    #[arg(long)]
    pub start: String,

    /// Inclusive; the whole day is searched
    #[arg(long)]
    pub end: String,
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "tide_sites=info".into()))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match &cli.command {
        Commands::Analyze(args) => run_analyze(args, &config, &mut out),
        Commands::Predict(args) => run_predict(args, &config, &mut out),
        Commands::Extrema(args) => run_extrema(args, &config, &mut out),
        Commands::Constituents => {
            renderer::write_constituents(&mut out, Utc::now().naive_utc())?;
            Ok(())
        }
    }
}

/// Read observations from disk or over the network.
fn load_observations(source: &str, config: &Config) -> anyhow::Result<Vec<Observation>> {
    // Create Tokio runtime for the optional HTTP fetch
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(observations::load(source, &config.csv))
        .with_context(|| format!("failed to load observations from {}", source))
}

fn parse_date_arg(value: &str, config: &Config) -> anyhow::Result<NaiveDate> {
    observations::parse_date_only(value, config.csv.day_first)
        .with_context(|| format!("invalid date '{}'", value))
}

/// Prediction window from explicit dates, filling gaps from the record.
fn prediction_request(
    start: Option<&str>,
    end: Option<&str>,
    interval: i64,
    observations: &[Observation],
    config: &Config,
) -> anyhow::Result<PredictionRequest> {
    let mut request = PredictionRequest::covering(observations, interval)
        .context("no observations to derive a prediction window from")?;
    if let Some(start) = start {
        request.start = parse_date_arg(start, config)?;
    }
    if let Some(end) = end {
        request.end = parse_date_arg(end, config)?;
    }
    Ok(request)
}

pub fn save_model(tide: &Tide, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, tide)?;
    writer
        .flush()
        .with_context(|| format!("failed to write model {}", path.display()))?;
    info!(path = %path.display(), terms = tide.terms.len(), "model saved");
    Ok(())
}

pub fn load_model(path: &Path) -> anyhow::Result<Tide> {
    let file = File::open(path)
        .with_context(|| format!("failed to open model {}", path.display()))?;
    let tide: Tide = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid model file {}", path.display()))?;
    Ok(Tide::new(tide.terms))
}

fn write_table_csv(table: &LevelTable, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    table.write_csv(BufWriter::new(file))?;
    info!(path = %path.display(), rows = table.points.len(), "table written");
    Ok(())
}

pub fn run_analyze<W: Write>(
    args: &AnalyzeArgs,
    config: &Config,
    out: &mut W,
) -> anyhow::Result<()> {
    let observations = load_observations(&args.source, config)?;
    let options = config
        .analysis
        .decompose_options()
        .context("invalid constituent list in configuration")?;
    let tide = Tide::decompose(&observations, &options).context("harmonic analysis failed")?;

    // Observations are sorted, so the first one is the earliest
    let reference = observations[0].time;
    renderer::write_harmonic_table(out, &tide, reference, config.display.harmonic_rows)?;
    writeln!(out)?;
    renderer::write_classification(out, &tide)?;
    writeln!(out)?;

    let mut table = LevelTable::from_observations(&observations);
    if config.prediction.enabled && !args.no_prediction {
        let interval = args.interval.unwrap_or(config.prediction.interval_seconds);
        let request = prediction_request(
            args.start.as_deref(),
            args.end.as_deref(),
            interval,
            &observations,
            config,
        )?;
        match prediction::predict(&tide, &request) {
            Ok(points) => table.extend_predictions(points),
            Err(e @ PredictionError::IntervalTooShort(_)) => {
                warn!(error = %e, "skipping prediction");
            }
            Err(e) => return Err(e).context("prediction failed"),
        }
    }

    if args.show_data {
        renderer::write_data_table(out, &table)?;
        writeln!(out)?;
    }
    renderer::draw_ascii(
        out,
        &table,
        config.display.ascii_rows,
        config.display.ascii_columns,
    )?;

    if let Some(path) = &args.chart {
        chart::save_chart(
            &table,
            config.display.chart_width,
            config.display.chart_height,
            path,
        )
        .with_context(|| format!("failed to write chart {}", path.display()))?;
    }
    if let Some(path) = &args.save_model {
        save_model(&tide, path)?;
    }
    if let Some(path) = &args.output {
        write_table_csv(&table, path)?;
    }
    Ok(())
}

pub fn run_predict<W: Write>(
    args: &PredictArgs,
    config: &Config,
    out: &mut W,
) -> anyhow::Result<()> {
    let tide = load_model(&args.model)?;
    let request = PredictionRequest {
        start: parse_date_arg(&args.start, config)?,
        end: parse_date_arg(&args.end, config)?,
        interval_seconds: args.interval.unwrap_or(config.prediction.interval_seconds),
    };
    let points = prediction::predict(&tide, &request)?;
    let table = LevelTable { points };

    match &args.output {
        Some(path) => write_table_csv(&table, path),
        None => {
            renderer::write_data_table(out, &table)?;
            Ok(())
        }
    }
}

/// Search window for extrema: whole days from `start` through `end`.
fn extrema_window(
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<(NaiveDateTime, NaiveDateTime)> {
    if end < start {
        bail!("end date {} is before start date {}", end, start);
    }
    let from = start.and_time(chrono::NaiveTime::MIN);
    let to = end.and_time(chrono::NaiveTime::MIN) + Duration::days(1);
    Ok((from, to))
}

pub fn run_extrema<W: Write>(
    args: &ExtremaArgs,
    config: &Config,
    out: &mut W,
) -> anyhow::Result<()> {
    let tide = load_model(&args.model)?;
    let (from, to) = extrema_window(
        parse_date_arg(&args.start, config)?,
        parse_date_arg(&args.end, config)?,
    )?;
    let extrema = tide.extrema(from, to);
    info!(count = extrema.len(), "found high and low waters");

    renderer::write_extrema(out, &extrema)?;
    writeln!(out)?;
    renderer::write_classification(out, &tide)?;
    Ok(())
}
