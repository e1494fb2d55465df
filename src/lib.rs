//! # Tide Sites Core Library
//!
//! Harmonic analysis of observed water levels and prediction of future levels
//! from the fitted tidal constituents.
//!
//! ## Data Flow
//! 1. **Load**: read a `datetime, water level` CSV from disk or over HTTP
//!    ([`observations`])
//! 2. **Decompose**: least-squares fit of the tidal constituents that the
//!    record is long enough to resolve ([`harmonics::Tide::decompose`])
//! 3. **Predict**: evaluate the model over a date range at a fixed interval
//!    ([`prediction`])
//! 4. **Display**: harmonic table, data table and ASCII chart on the terminal
//!    ([`renderer`]), or a raster chart image ([`chart`])
//!
//! The astronomy behind the model lives in [`astro`] (mean longitudes and
//! Schureman's lunar orbit angles), [`nodal`] (node factors) and
//! [`constituent`] (the NOAA constituent set).
//!
//! ## Core Types
//! - [`Observation`]: one measured water level
//! - [`LevelPoint`] / [`LevelTable`]: the combined source and prediction
//!   dataset that gets tabulated and charted

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod astro;
pub mod chart;
pub mod config;
pub mod constituent;
pub mod harmonics;
mod linalg;
pub mod nodal;
pub mod observations;
pub mod prediction;
pub mod renderer;

/// Date-time format used for every table and CSV this crate writes.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single measured water level.
///
/// Times are naive and interpreted as UTC by the astronomical routines.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use tide_sites_lib::Observation;
///
/// let time = NaiveDate::from_ymd_opt(2023, 1, 1)
///     .unwrap()
///     .and_hms_opt(6, 0, 0)
///     .unwrap();
/// let obs = Observation { time, level: 1.25 };
/// assert_eq!(obs.level, 1.25);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub time: NaiveDateTime,
    pub level: f64,
}

/// Origin of a row in the combined dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    /// Measured level read from the input file
    Source,
    /// Level computed from the harmonic model
    Prediction,
}

impl SeriesKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SeriesKind::Source => "source",
            SeriesKind::Prediction => "prediction",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the combined dataset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelPoint {
    pub time: NaiveDateTime,
    pub level: f64,
    pub kind: SeriesKind,
}

/// Observed levels followed by predicted levels.
///
/// Source rows are kept in time order and always precede prediction rows,
/// which is the order they are tabulated and written out in.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use tide_sites_lib::{LevelTable, Observation, SeriesKind};
///
/// let t = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let table = LevelTable::from_observations(&[Observation { time: t, level: 0.5 }]);
///
/// assert_eq!(table.points.len(), 1);
/// assert_eq!(table.points[0].kind, SeriesKind::Source);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LevelTable {
    pub points: Vec<LevelPoint>,
}

impl LevelTable {
    pub fn from_observations(observations: &[Observation]) -> Self {
        let points = observations
            .iter()
            .map(|obs| LevelPoint {
                time: obs.time,
                level: obs.level,
                kind: SeriesKind::Source,
            })
            .collect();
        Self { points }
    }

    /// Append prediction rows after the existing rows.
    pub fn extend_predictions(&mut self, predictions: impl IntoIterator<Item = LevelPoint>) {
        self.points.extend(predictions);
    }

    pub fn series(&self, kind: SeriesKind) -> impl Iterator<Item = &LevelPoint> {
        self.points.iter().filter(move |p| p.kind == kind)
    }

    /// `(min, max)` of all levels, or `None` for an empty table.
    pub fn level_bounds(&self) -> Option<(f64, f64)> {
        if self.points.is_empty() {
            return None;
        }
        Some(
            self.points
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), p| {
                    (min.min(p.level), max.max(p.level))
                }),
        )
    }

    /// `(earliest, latest)` of all times, or `None` for an empty table.
    pub fn time_bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.points.first()?.time;
        Some(self.points.iter().fold((first, first), |(min, max), p| {
            (min.min(p.time), max.max(p.time))
        }))
    }

    /// Write the table as `datetime,water level,type` CSV.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(["datetime", "water level", "type"])?;
        for point in &self.points {
            out.write_record([
                point.time.format(DATETIME_FORMAT).to_string(),
                point.level.to_string(),
                point.kind.as_str().to_string(),
            ])?;
        }
        out.flush()?;
        Ok(())
    }
}
