//! # Observation Loading
//!
//! Reads a two-column `datetime, water level` CSV into time-sorted
//! [`Observation`]s, either from a local file or over HTTP(S).
//!
//! ## Date-time formats
//! ISO (`2023-01-31 14:00[:00]`, with `T` or a space) and RFC 3339 are
//! always accepted. Slash, dash and dot separated dates are read day-first
//! unless [`CsvConfig::day_first`] is off. A bare date means midnight.

use crate::config::CsvConfig;
use crate::Observation;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while reading observations.
#[derive(Error, Debug)]
pub enum ObservationError {
    /// The header is not exactly the configured time and level columns
    #[error("Column name should be '{time}' and '{level}'")]
    Columns { time: String, level: String },

    #[error("line {line}: cannot parse date-time '{value}'")]
    BadTime { line: u64, value: String },

    #[error("line {line}: cannot parse water level '{value}'")]
    BadLevel { line: u64, value: String },

    #[error("no observations in input")]
    Empty,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

const ISO_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DAY_FIRST_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const MONTH_FIRST_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m-%d-%Y %H:%M:%S",
    "%m-%d-%Y %H:%M",
    "%m.%d.%Y %H:%M:%S",
    "%m.%d.%Y %H:%M",
];

const ISO_DATES: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const DAY_FIRST_DATES: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const MONTH_FIRST_DATES: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%m.%d.%Y"];

/// Parse a date-time in any of the accepted formats.
///
/// # Example
/// ```
/// use tide_sites_lib::observations::parse_datetime;
///
/// let t = parse_datetime("03/04/2023 13:30", true).unwrap();
/// assert_eq!(t.to_string(), "2023-04-03 13:30:00");
/// ```
pub fn parse_datetime(value: &str, day_first: bool) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Some(t) = first_match(value, ISO_FORMATS) {
        return Some(t);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.naive_utc());
    }
    let (datetimes, dates) = if day_first {
        (DAY_FIRST_FORMATS, DAY_FIRST_DATES)
    } else {
        (MONTH_FIRST_FORMATS, MONTH_FIRST_DATES)
    };
    if let Some(t) = first_match(value, datetimes) {
        return Some(t);
    }
    parse_date(value, dates).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a calendar date, ISO or in the configured day/month order.
pub fn parse_date_only(value: &str, day_first: bool) -> Option<NaiveDate> {
    let dates = if day_first {
        DAY_FIRST_DATES
    } else {
        MONTH_FIRST_DATES
    };
    parse_date(value.trim(), dates)
}

fn parse_date(value: &str, ordered: &[&str]) -> Option<NaiveDate> {
    ISO_DATES
        .iter()
        .chain(ordered)
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

fn first_match(value: &str, formats: &[&str]) -> Option<NaiveDateTime> {
    formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Parse observations from CSV text.
///
/// The header must name exactly the configured time and level columns.
/// Rows are returned sorted by time; rows with equal times keep file order.
pub fn parse_csv<R: Read>(
    reader: R,
    config: &CsvConfig,
) -> Result<Vec<Observation>, ObservationError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv.headers()?;
    let expected = [config.time_column.as_str(), config.level_column.as_str()];
    if headers.len() != 2 || headers.iter().zip(expected).any(|(h, e)| h != e) {
        return Err(ObservationError::Columns {
            time: config.time_column.clone(),
            level: config.level_column.clone(),
        });
    }

    let mut observations = Vec::new();
    for record in csv.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let time_field = record.get(0).unwrap_or_default();
        let level_field = record.get(1).unwrap_or_default();
        if time_field.is_empty() && level_field.is_empty() {
            continue;
        }

        let time = parse_datetime(time_field, config.day_first).ok_or_else(|| {
            ObservationError::BadTime {
                line,
                value: time_field.to_string(),
            }
        })?;
        let level = level_field
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ObservationError::BadLevel {
                line,
                value: level_field.to_string(),
            })?;
        observations.push(Observation { time, level });
    }

    if observations.is_empty() {
        return Err(ObservationError::Empty);
    }
    observations.sort_by_key(|obs| obs.time);
    debug!(rows = observations.len(), "parsed observations");
    Ok(observations)
}

/// Whether `source` should be fetched over the network.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Download a CSV and parse it.
pub async fn fetch(url: &str, config: &CsvConfig) -> Result<Vec<Observation>, ObservationError> {
    info!(url, "fetching observations");
    let body = reqwest::get(url).await?.error_for_status()?.text().await?;
    parse_csv(body.as_bytes(), config)
}

/// Read a CSV from disk.
pub fn read_file<P: AsRef<Path>>(
    path: P,
    config: &CsvConfig,
) -> Result<Vec<Observation>, ObservationError> {
    let path = path.as_ref();
    info!(path = %path.display(), "reading observations");
    parse_csv(File::open(path)?, config)
}

/// Load observations from a local path or an HTTP(S) URL.
pub async fn load(source: &str, config: &CsvConfig) -> Result<Vec<Observation>, ObservationError> {
    let observations = if is_url(source) {
        fetch(source, config).await?
    } else {
        read_file(source, config)?
    };
    if let (Some(first), Some(last)) = (observations.first(), observations.last()) {
        info!(
            rows = observations.len(),
            first = %first.time,
            last = %last.time,
            "loaded observations"
        );
    }
    Ok(observations)
}
