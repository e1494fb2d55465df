//! # Harmonic Tide Model
//!
//! A [`Tide`] is a list of harmonic terms. The water level at a time `t`,
//! measured in hours from a reference instant `t₀`, is
//!
//! ```text
//! η(t) = Σ fᵢ(t) · Aᵢ · cos(ωᵢ·t + V₀ᵢ + uᵢ(t) − φᵢ)
//! ```
//!
//! where `ωᵢ` and `V₀ᵢ` are each constituent's speed and equilibrium argument
//! at `t₀`, and `fᵢ`, `uᵢ` its node factor and nodal angle. The mean level is
//! carried as the constant constituent Z0. Because `V₀` is astronomical, the
//! phases `φᵢ` do not depend on `t₀`: one model predicts any date.
//!
//! ## Node factor blocks
//! `f` and `u` drift over the 18.6-year nodal cycle, so they are evaluated
//! once per block of [`DEFAULT_PARTITION_HOURS`] at the block midpoint.
//! Speeds change far more slowly and are held at their value at `t₀`.
//!
//! ## Decomposition
//! [`Tide::decompose`] fits amplitudes and phases by linear least squares
//! on the cosine and sine coefficients of each term. Only constituents that
//! complete more than `n_period` cycles over the record are fitted.

use crate::astro::astro;
use crate::constituent::{Constituent, NOAA};
use crate::linalg::NormalEquations;
use crate::Observation;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Node factors are refreshed every 10 days.
pub const DEFAULT_PARTITION_HOURS: f64 = 240.0;

/// Constituents must complete at least this many cycles to be fitted.
pub const DEFAULT_N_PERIOD: f64 = 2.0;

/// Relative ridge term for the normal equations.
pub const DEFAULT_RIDGE: f64 = 1e-10;

const D2R: f64 = std::f64::consts::PI / 180.0;
const R2D: f64 = 180.0 / std::f64::consts::PI;

#[derive(Error, Debug, PartialEq)]
pub enum HarmonicsError {
    #[error("at least two observations are required, got {0}")]
    TooFewObservations(usize),

    #[error("all observations share the same time")]
    ZeroDuration,

    #[error("a {hours:.1} hour record is too short to resolve any constituent")]
    RecordTooShort { hours: f64 },

    #[error("{observations} observations cannot determine {unknowns} unknowns")]
    Underdetermined {
        observations: usize,
        unknowns: usize,
    },

    #[error("water level at {0} is not a finite number")]
    NonFiniteLevel(NaiveDateTime),

    #[error("least squares system is singular")]
    Singular,
}

/// Amplitude and phase of one constituent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonicTerm {
    pub constituent: Constituent,
    /// Same unit as the input levels
    pub amplitude: f64,
    /// Degrees, `[0, 360)` once normalised
    pub phase: f64,
}

/// Tuning knobs for [`Tide::decompose`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposeOptions {
    /// Candidate constituents; Z0 and duplicates are ignored
    pub constituents: Vec<Constituent>,
    /// Minimum number of cycles a constituent must complete over the record
    pub n_period: f64,
    /// Length of the node factor blocks in hours
    pub partition_hours: f64,
    /// Ridge term relative to the largest diagonal entry of `AᵀA`
    pub ridge: f64,
}

impl Default for DecomposeOptions {
    fn default() -> Self {
        Self {
            constituents: NOAA.to_vec(),
            n_period: DEFAULT_N_PERIOD,
            partition_hours: DEFAULT_PARTITION_HOURS,
            ridge: DEFAULT_RIDGE,
        }
    }
}

/// High or low water.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtremumKind {
    High,
    Low,
}

impl fmt::Display for ExtremumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtremumKind::High => f.write_str("High"),
            ExtremumKind::Low => f.write_str("Low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    pub time: NaiveDateTime,
    pub level: f64,
    pub kind: ExtremumKind,
}

/// Tide type from the form number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TideClass {
    Semidiurnal,
    MixedSemidiurnal,
    MixedDiurnal,
    Diurnal,
}

impl TideClass {
    pub fn from_form_number(form: f64) -> Self {
        if form <= 0.25 {
            TideClass::Semidiurnal
        } else if form <= 1.5 {
            TideClass::MixedSemidiurnal
        } else if form <= 3.0 {
            TideClass::MixedDiurnal
        } else {
            TideClass::Diurnal
        }
    }
}

impl fmt::Display for TideClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TideClass::Semidiurnal => "semidiurnal",
            TideClass::MixedSemidiurnal => "mixed (semidiurnal)",
            TideClass::MixedDiurnal => "mixed (diurnal)",
            TideClass::Diurnal => "diurnal",
        })
    }
}

/// A fitted (or hand-built) harmonic tide model.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use tide_sites_lib::constituent::Constituent;
/// use tide_sites_lib::harmonics::{HarmonicTerm, Tide};
///
/// let tide = Tide::new(vec![
///     HarmonicTerm { constituent: Constituent::Z0, amplitude: 2.0, phase: 0.0 },
///     HarmonicTerm { constituent: Constituent::M2, amplitude: 1.0, phase: 45.0 },
/// ]);
/// let t = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let level = tide.at(&[t])[0];
/// assert!((0.9..=3.1).contains(&level));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tide {
    pub terms: Vec<HarmonicTerm>,
}

impl Tide {
    /// Build a model and normalise it.
    pub fn new(terms: Vec<HarmonicTerm>) -> Self {
        let mut tide = Self { terms };
        tide.normalize();
        tide
    }

    /// Make every amplitude non-negative and wrap phases into `[0, 360)`.
    pub fn normalize(&mut self) {
        for term in &mut self.terms {
            if term.amplitude < 0.0 {
                term.amplitude = -term.amplitude;
                term.phase += 180.0;
            }
            term.phase = term.phase.rem_euclid(360.0);
        }
    }

    /// Fit a model to observed water levels.
    pub fn decompose(
        observations: &[Observation],
        options: &DecomposeOptions,
    ) -> Result<Tide, HarmonicsError> {
        if observations.len() < 2 {
            return Err(HarmonicsError::TooFewObservations(observations.len()));
        }
        if let Some(bad) = observations.iter().find(|o| !o.level.is_finite()) {
            return Err(HarmonicsError::NonFiniteLevel(bad.time));
        }

        let mut sorted = observations.to_vec();
        sorted.sort_by_key(|o| o.time);
        let t0 = sorted[0].time;
        let span = hours_between(t0, sorted[sorted.len() - 1].time);
        if span <= 0.0 {
            return Err(HarmonicsError::ZeroDuration);
        }

        // Z0 is the mean; everything else is fitted relative to it
        let z0 = sorted.iter().map(|o| o.level).sum::<f64>() / sorted.len() as f64;

        let a0 = astro(t0);
        let mut seen = HashSet::new();
        let constituents: Vec<Constituent> = options
            .constituents
            .iter()
            .copied()
            .filter(|&c| c != Constituent::Z0 && seen.insert(c))
            .filter(|&c| 360.0 * options.n_period < span * c.speed(&a0))
            .collect();

        if constituents.is_empty() {
            return Err(HarmonicsError::RecordTooShort { hours: span });
        }
        let unknowns = 2 * constituents.len();
        if sorted.len() < unknowns {
            return Err(HarmonicsError::Underdetermined {
                observations: sorted.len(),
                unknowns,
            });
        }
        debug!(
            count = constituents.len(),
            hours = span,
            "fitting constituents resolvable over the record"
        );

        let prepared = Prepared::new(&constituents, t0);
        let mut blocks = NodeBlocks::new(t0, options.partition_hours, constituents.clone());
        let mut equations = NormalEquations::new(unknowns);
        let mut row = vec![0.0; unknowns];

        for obs in &sorted {
            let hours = hours_between(t0, obs.time);
            let factors = blocks.at(hours);
            for (j, &(f, u)) in factors.iter().enumerate() {
                let theta = prepared.speed[j] * hours + prepared.v0[j] + u;
                row[2 * j] = f * theta.cos();
                row[2 * j + 1] = f * theta.sin();
            }
            equations.add_row(&row, obs.level - z0);
        }

        let solution = equations
            .solve(options.ridge)
            .ok_or(HarmonicsError::Singular)?;

        let mut terms = Vec::with_capacity(constituents.len() + 1);
        terms.push(HarmonicTerm {
            constituent: Constituent::Z0,
            amplitude: z0,
            phase: 0.0,
        });
        for (j, &constituent) in constituents.iter().enumerate() {
            let (a, b) = (solution[2 * j], solution[2 * j + 1]);
            terms.push(HarmonicTerm {
                constituent,
                amplitude: a.hypot(b),
                phase: b.atan2(a) * R2D,
            });
        }

        info!(
            observations = sorted.len(),
            constituents = constituents.len(),
            "harmonic decomposition complete"
        );
        Ok(Tide::new(terms))
    }

    /// Predicted water level at each time.
    pub fn at(&self, times: &[NaiveDateTime]) -> Vec<f64> {
        let Some(&t0) = times.first() else {
            return Vec::new();
        };
        let mut eval = Evaluator::new(self, t0);
        times
            .iter()
            .map(|&t| eval.level(hours_between(t0, t)))
            .collect()
    }

    /// High and low waters between `start` and `end`.
    ///
    /// Turning points are bracketed by sign changes of the analytic slope on
    /// a grid finer than an eighth of the fastest constituent's period, then
    /// refined by bisection to about one second.
    pub fn extrema(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<Extremum> {
        let total = hours_between(start, end);
        let a0 = astro(start);
        let max_speed = self
            .terms
            .iter()
            .filter(|t| t.amplitude > 0.0)
            .map(|t| t.constituent.speed(&a0))
            .fold(0.0_f64, f64::max);
        if total <= 0.0 || max_speed <= 0.0 {
            return Vec::new();
        }

        let step = (360.0 / (max_speed * 8.0)).min(1.0);
        let mut eval = Evaluator::new(self, start);
        let brackets = slope_sign_changes(total, step, |h| eval.slope(h));
        brackets
            .into_iter()
            .map(|(lo, hi, lo_slope)| {
                let root = bisect(&mut eval, lo, hi, lo_slope);
                let kind = if lo_slope > 0.0 {
                    ExtremumKind::High
                } else {
                    ExtremumKind::Low
                };
                Extremum {
                    time: add_hours(start, root),
                    level: eval.level(root),
                    kind,
                }
            })
            .collect()
    }

    /// Amplitude of a constituent, zero if absent.
    pub fn amplitude(&self, constituent: Constituent) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.constituent == constituent)
            .map(|t| t.amplitude)
            .sum()
    }

    /// Mean water level (the Z0 term).
    pub fn mean_level(&self) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.constituent == Constituent::Z0)
            .map(|t| t.amplitude * (t.phase * D2R).cos())
            .sum()
    }

    /// `(K1 + O1) / (M2 + S2)`, or `None` without semidiurnal amplitude.
    pub fn form_number(&self) -> Option<f64> {
        use Constituent::{K1, M2, O1, S2};
        let semidiurnal = self.amplitude(M2) + self.amplitude(S2);
        if semidiurnal <= 0.0 {
            return None;
        }
        Some((self.amplitude(K1) + self.amplitude(O1)) / semidiurnal)
    }

    pub fn classify(&self) -> Option<TideClass> {
        self.form_number().map(TideClass::from_form_number)
    }

    /// Terms sorted by descending amplitude.
    pub fn terms_by_amplitude(&self) -> Vec<HarmonicTerm> {
        let mut terms = self.terms.clone();
        terms.sort_by(|a, b| b.amplitude.total_cmp(&a.amplitude));
        terms
    }
}

/// Hours from `t0` to `t`, negative if `t` is earlier.
pub fn hours_between(t0: NaiveDateTime, t: NaiveDateTime) -> f64 {
    (t - t0).num_milliseconds() as f64 / 3_600_000.0
}

/// `t0` plus a fractional number of hours, to the millisecond.
pub fn add_hours(t0: NaiveDateTime, hours: f64) -> NaiveDateTime {
    t0 + Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

/// Speeds and equilibrium arguments at the reference instant, in radians.
struct Prepared {
    speed: Vec<f64>,
    v0: Vec<f64>,
}

impl Prepared {
    fn new(constituents: &[Constituent], t0: NaiveDateTime) -> Self {
        let a0 = astro(t0);
        Self {
            speed: constituents.iter().map(|c| c.speed(&a0) * D2R).collect(),
            v0: constituents.iter().map(|c| c.value(&a0) * D2R).collect(),
        }
    }
}

/// `(f, u)` per constituent, evaluated at the midpoint of each block and
/// cached by block index. `u` is in radians.
struct NodeBlocks {
    t0: NaiveDateTime,
    partition_hours: f64,
    constituents: Vec<Constituent>,
    cache: HashMap<i64, Vec<(f64, f64)>>,
}

impl NodeBlocks {
    fn new(t0: NaiveDateTime, partition_hours: f64, constituents: Vec<Constituent>) -> Self {
        Self {
            t0,
            partition_hours,
            constituents,
            cache: HashMap::new(),
        }
    }

    fn at(&mut self, hours: f64) -> &[(f64, f64)] {
        let index = (hours / self.partition_hours).floor() as i64;
        let (t0, partition) = (self.t0, self.partition_hours);
        let constituents = &self.constituents;
        self.cache.entry(index).or_insert_with(|| {
            let midpoint = add_hours(t0, (index as f64 + 0.5) * partition);
            let a = astro(midpoint);
            constituents
                .iter()
                .map(|c| (c.f(&a), c.u(&a).rem_euclid(360.0) * D2R))
                .collect()
        })
    }
}

/// Evaluates a model's level and slope at hours from a fixed reference.
struct Evaluator {
    prepared: Prepared,
    blocks: NodeBlocks,
    amplitude: Vec<f64>,
    phase: Vec<f64>,
}

impl Evaluator {
    fn new(tide: &Tide, t0: NaiveDateTime) -> Self {
        let constituents: Vec<Constituent> = tide.terms.iter().map(|t| t.constituent).collect();
        Self {
            prepared: Prepared::new(&constituents, t0),
            blocks: NodeBlocks::new(t0, DEFAULT_PARTITION_HOURS, constituents),
            amplitude: tide.terms.iter().map(|t| t.amplitude).collect(),
            phase: tide.terms.iter().map(|t| t.phase * D2R).collect(),
        }
    }

    fn level(&mut self, hours: f64) -> f64 {
        let factors = self.blocks.at(hours);
        let mut total = 0.0;
        for (j, &(f, u)) in factors.iter().enumerate() {
            let theta = self.prepared.speed[j] * hours + self.prepared.v0[j] + u - self.phase[j];
            total += f * self.amplitude[j] * theta.cos();
        }
        total
    }

    /// Time derivative of the level, per hour.
    fn slope(&mut self, hours: f64) -> f64 {
        let factors = self.blocks.at(hours);
        let mut total = 0.0;
        for (j, &(f, u)) in factors.iter().enumerate() {
            let speed = self.prepared.speed[j];
            let theta = speed * hours + self.prepared.v0[j] + u - self.phase[j];
            total -= f * self.amplitude[j] * speed * theta.sin();
        }
        total
    }
}

/// Grid intervals `(lo, hi, slope at lo)` over `[0, total]` hours where the
/// slope changes sign or reaches exactly zero.
fn slope_sign_changes<F>(total: f64, step: f64, mut slope: F) -> Vec<(f64, f64, f64)>
where
    F: FnMut(f64) -> f64,
{
    let mut brackets = Vec::new();
    let mut prev_h = 0.0;
    let mut prev_slope = slope(prev_h);
    while prev_h < total {
        let h = (prev_h + step).min(total);
        let current = slope(h);
        if prev_slope != 0.0 && (current == 0.0 || current.signum() != prev_slope.signum()) {
            brackets.push((prev_h, h, prev_slope));
        }
        if current != 0.0 {
            prev_slope = current;
        } else if prev_slope != 0.0 {
            // Turning point sits on the grid; the slope continues with the other sign
            prev_slope = -prev_slope;
        }
        prev_h = h;
    }
    brackets
}

fn bisect(eval: &mut Evaluator, mut lo: f64, mut hi: f64, lo_slope: f64) -> f64 {
    const TOLERANCE_HOURS: f64 = 1.0 / 3600.0;
    for _ in 0..60 {
        if hi - lo <= TOLERANCE_HOURS {
            break;
        }
        let mid = 0.5 * (lo + hi);
        let slope = eval.slope(mid);
        if slope == 0.0 {
            return mid;
        }
        if slope.signum() == lo_slope.signum() {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}
