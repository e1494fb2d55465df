//! Water level prediction over a date range.
//!
//! A prediction covers whole days: from `start` at midnight up to and
//! including `end` at midnight, at a fixed spacing of at least one hour.

use crate::harmonics::Tide;
use crate::{LevelPoint, Observation, SeriesKind};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::info;

/// Shortest spacing between predicted levels.
pub const MIN_INTERVAL_SECONDS: i64 = 3600;

#[derive(Error, Debug, PartialEq)]
pub enum PredictionError {
    #[error("Interval must be at least {min} seconds, got {0}", min = MIN_INTERVAL_SECONDS)]
    IntervalTooShort(i64),

    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

/// Date window and spacing of a prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval_seconds: i64,
}

impl PredictionRequest {
    /// A request spanning the dates of the first and last observation.
    ///
    /// Returns `None` for an empty record.
    pub fn covering(observations: &[Observation], interval_seconds: i64) -> Option<Self> {
        let first = observations.iter().map(|o| o.time).min()?;
        let last = observations.iter().map(|o| o.time).max()?;
        Some(Self {
            start: first.date(),
            end: last.date(),
            interval_seconds,
        })
    }

    pub fn validate(&self) -> Result<(), PredictionError> {
        if self.interval_seconds < MIN_INTERVAL_SECONDS {
            return Err(PredictionError::IntervalTooShort(self.interval_seconds));
        }
        if self.end < self.start {
            return Err(PredictionError::EndBeforeStart {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// The instants this request predicts at.
    pub fn times(&self) -> Result<Vec<NaiveDateTime>, PredictionError> {
        self.validate()?;
        Ok(date_range(self.start, self.end, self.interval_seconds))
    }
}

/// Instants from `start` 00:00 to `end` 00:00 inclusive, `interval_seconds`
/// apart. Empty when `end` precedes `start` or the interval is not positive.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use tide_sites_lib::prediction::date_range;
///
/// let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
/// assert_eq!(date_range(start, end, 3600).len(), 25);
/// ```
pub fn date_range(start: NaiveDate, end: NaiveDate, interval_seconds: i64) -> Vec<NaiveDateTime> {
    if interval_seconds <= 0 || end < start {
        return Vec::new();
    }
    let first = start.and_time(chrono::NaiveTime::MIN);
    let last = end.and_time(chrono::NaiveTime::MIN);
    let step = Duration::seconds(interval_seconds);

    let mut times = Vec::new();
    let mut t = first;
    while t <= last {
        times.push(t);
        t += step;
    }
    times
}

/// Predict levels for a request, tagged as prediction rows.
pub fn predict(
    tide: &Tide,
    request: &PredictionRequest,
) -> Result<Vec<LevelPoint>, PredictionError> {
    let times = request.times()?;
    let levels = tide.at(&times);
    info!(
        start = %request.start,
        end = %request.end,
        points = times.len(),
        "predicted water levels"
    );
    Ok(times
        .into_iter()
        .zip(levels)
        .map(|(time, level)| LevelPoint {
            time,
            level,
            kind: SeriesKind::Prediction,
        })
        .collect())
}
