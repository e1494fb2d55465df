//! # Terminal Rendering
//!
//! Text output of an analysis: the harmonic table, the combined data table,
//! an ASCII chart of source against prediction, the list of high and low
//! waters and the tide classification.
//!
//! Everything writes to a `std::io::Write` so the binary can target stdout
//! and tests can capture the output in a buffer.
//!
//! ## ASCII chart
//! Time runs left to right across the configured number of columns and
//! level runs bottom to top. Source rows are plotted with `•`, prediction
//! rows with `o`, and cells holding both with `X`.

use crate::astro::astro;
use crate::constituent::Constituent;
use crate::harmonics::{hours_between, Extremum, HarmonicTerm, Tide};
use crate::{LevelTable, SeriesKind, DATETIME_FORMAT};
use chrono::NaiveDateTime;
use std::io::{self, Write};

const SOURCE_MARK: char = '•';
const PREDICTION_MARK: char = 'o';
const OVERLAP_MARK: char = 'X';

/// Width of the y-axis label column, axis line included.
const Y_AXIS_WIDTH: usize = 9;

/// Format a level for an axis label with appropriate precision and sign.
pub(crate) fn format_level(level: f64, step: f64) -> String {
    let decimals = if step >= 1.0 {
        0
    } else if step >= 0.1 {
        1
    } else {
        2
    };
    // Avoid printing "-0"
    let level = if level.abs() < step * 1e-6 {
        0.0
    } else {
        level
    };
    if level > 0.0 {
        format!("+{:.*}", decimals, level)
    } else {
        format!("{:.*}", decimals, level)
    }
}

/// A 1, 2 or 5 times power of ten step giving at most `max_labels` labels.
pub(crate) fn label_step(range: f64, max_labels: usize) -> f64 {
    if range <= 0.0 || !range.is_finite() {
        return 1.0;
    }
    let raw = range / max_labels.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|&s| s >= raw)
        .unwrap_or(10.0 * magnitude)
}

/// Multiples of `step` within `[min, max]`, at most `limit` of them.
///
/// Labels are counted rather than accumulated, so a step below the float
/// spacing at large levels still ends.
pub(crate) fn label_levels(min: f64, max: f64, step: f64, limit: usize) -> Vec<f64> {
    if step.is_nan() || step <= 0.0 || !min.is_finite() || !max.is_finite() {
        return Vec::new();
    }
    let first = (min / step).ceil() as i64;
    let last = (max / step + 1e-9).floor() as i64;
    (first..=last).take(limit).map(|k| k as f64 * step).collect()
}

/// Print the harmonic table, largest amplitude first.
///
/// Speeds are evaluated at `reference`. A `limit` of zero prints every term.
pub fn write_harmonic_table<W: Write>(
    out: &mut W,
    tide: &Tide,
    reference: NaiveDateTime,
    limit: usize,
) -> io::Result<()> {
    let a = astro(reference);
    let terms: Vec<HarmonicTerm> = tide.terms_by_amplitude();
    let shown = if limit == 0 {
        terms.len()
    } else {
        limit.min(terms.len())
    };

    writeln!(out, "Harmonic constituents")?;
    writeln!(
        out,
        "{:<11} {:>12} {:>10} {:>13}",
        "constituent", "amplitude", "phase", "speed (°/h)"
    )?;
    for term in &terms[..shown] {
        writeln!(
            out,
            "{:<11} {:>12.4} {:>10.2} {:>13.7}",
            term.constituent.name(),
            term.amplitude,
            term.phase,
            term.constituent.speed(&a)
        )?;
    }
    if shown < terms.len() {
        writeln!(out, "... {} more", terms.len() - shown)?;
    }
    Ok(())
}

/// Print the combined dataset as a table.
pub fn write_data_table<W: Write>(out: &mut W, table: &LevelTable) -> io::Result<()> {
    writeln!(out, "{:<19}  {:>12}  {}", "datetime", "water level", "type")?;
    for point in &table.points {
        writeln!(
            out,
            "{:<19}  {:>12.4}  {}",
            point.time.format(DATETIME_FORMAT),
            point.level,
            point.kind
        )?;
    }
    Ok(())
}

/// Print high and low waters in time order.
pub fn write_extrema<W: Write>(out: &mut W, extrema: &[Extremum]) -> io::Result<()> {
    if extrema.is_empty() {
        return writeln!(out, "No high or low waters in range");
    }
    writeln!(out, "{:<19}  {:<4}  {:>12}", "datetime", "tide", "water level")?;
    for extremum in extrema {
        writeln!(
            out,
            "{:<19}  {:<4}  {:>12.4}",
            extremum.time.format(DATETIME_FORMAT),
            extremum.kind,
            extremum.level
        )?;
    }
    Ok(())
}

/// Print the mean level and the form number classification.
pub fn write_classification<W: Write>(out: &mut W, tide: &Tide) -> io::Result<()> {
    writeln!(out, "Mean level: {:.4}", tide.mean_level())?;
    match (tide.form_number(), tide.classify()) {
        (Some(form), Some(class)) => writeln!(out, "Form number: {:.3} ({})", form, class),
        _ => writeln!(out, "Form number: undefined (no M2 or S2 amplitude)"),
    }
}

/// Print every supported constituent with its speed at `reference`.
pub fn write_constituents<W: Write>(out: &mut W, reference: NaiveDateTime) -> io::Result<()> {
    let a = astro(reference);
    writeln!(out, "{:<11} {:>13} {:>12}", "constituent", "speed (°/h)", "period (h)")?;
    for constituent in Constituent::all() {
        let speed = constituent.speed(&a);
        let period = if speed > 0.0 {
            format!("{:.4}", 360.0 / speed)
        } else {
            "-".to_string()
        };
        writeln!(out, "{:<11} {:>13.7} {:>12}", constituent.name(), speed, period)?;
    }
    Ok(())
}

/// Render the combined dataset as an ASCII chart.
pub fn draw_ascii<W: Write>(
    out: &mut W,
    table: &LevelTable,
    rows: usize,
    columns: usize,
) -> io::Result<()> {
    let (Some((min_level, max_level)), Some((first, last))) =
        (table.level_bounds(), table.time_bounds())
    else {
        return writeln!(out, "(no data to chart)");
    };
    let rows = rows.max(2);
    let columns = columns.max(2);
    let span = hours_between(first, last);

    let level_to_row = |level: f64| {
        if max_level <= min_level {
            return rows / 2;
        }
        let normalized = (level - min_level) / (max_level - min_level);
        ((1.0 - normalized) * (rows as f64 - 1.0)).round() as usize
    };
    let time_to_column = |time: NaiveDateTime| {
        if span <= 0.0 {
            return 0;
        }
        let normalized = hours_between(first, time) / span;
        (normalized * (columns as f64 - 1.0)).round() as usize
    };

    let mut grid = vec![vec![' '; columns + Y_AXIS_WIDTH]; rows];
    for row in grid.iter_mut() {
        row[Y_AXIS_WIDTH - 1] = '│';
    }

    // Y-axis labels on round values
    let step = label_step(max_level - min_level, rows / 3);
    for label_level in label_levels(min_level, max_level, step, rows) {
        let row = level_to_row(label_level);
        if row < rows {
            let label = format!(
                "{:>width$}",
                format_level(label_level, step),
                width = Y_AXIS_WIDTH - 2
            );
            for (i, ch) in label.chars().take(Y_AXIS_WIDTH - 2).enumerate() {
                grid[row][i] = ch;
            }
            grid[row][Y_AXIS_WIDTH - 1] = '┤';
        }
    }

    for point in &table.points {
        let row = level_to_row(point.level).min(rows - 1);
        let column = time_to_column(point.time).min(columns - 1) + Y_AXIS_WIDTH;
        let mark = match point.kind {
            SeriesKind::Source => SOURCE_MARK,
            SeriesKind::Prediction => PREDICTION_MARK,
        };
        let cell = &mut grid[row][column];
        *cell = match *cell {
            ' ' => mark,
            existing if existing == mark => mark,
            _ => OVERLAP_MARK,
        };
    }

    for row in grid {
        writeln!(out, "{}", row.into_iter().collect::<String>())?;
    }

    // Time axis with the first and last instants under its ends
    let padding = " ".repeat(Y_AXIS_WIDTH - 1);
    writeln!(out, "{}└{}", padding, "─".repeat(columns))?;
    let left = first.format("%Y-%m-%d %H:%M").to_string();
    let right = last.format("%Y-%m-%d %H:%M").to_string();
    let gap = columns.saturating_sub(left.len() + right.len()).max(1);
    writeln!(out, "{} {}{}{}", padding, left, " ".repeat(gap), right)?;
    writeln!(
        out,
        "{} {} source   {} prediction   {} both",
        padding, SOURCE_MARK, PREDICTION_MARK, OVERLAP_MARK
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harmonics::ExtremumKind;
    use crate::{LevelPoint, Observation};
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn test_table() -> LevelTable {
        let mut table = LevelTable::from_observations(&[
            Observation {
                time: at(0),
                level: 1.0,
            },
            Observation {
                time: at(6),
                level: 3.0,
            },
            Observation {
                time: at(12),
                level: 1.0,
            },
        ]);
        table.extend_predictions([
            LevelPoint {
                time: at(0),
                level: 1.0,
                kind: SeriesKind::Prediction,
            },
            LevelPoint {
                time: at(6),
                level: 2.0,
                kind: SeriesKind::Prediction,
            },
            LevelPoint {
                time: at(12),
                level: 1.2,
                kind: SeriesKind::Prediction,
            },
        ]);
        table
    }

    fn render<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_format_level() {
        assert_eq!(format_level(0.0, 0.5), "0.0");
        assert_eq!(format_level(1.0, 1.0), "+1");
        assert_eq!(format_level(1.5, 0.5), "+1.5");
        assert_eq!(format_level(-1.5, 0.5), "-1.5");
        assert_eq!(format_level(-0.25, 0.05), "-0.25");
    }

    #[test]
    fn test_label_step() {
        assert!((label_step(2.0, 4) - 0.5).abs() < 1e-12);
        assert!((label_step(10.0, 5) - 2.0).abs() < 1e-12);
        assert!((label_step(0.3, 6) - 0.05).abs() < 1e-12);
        assert_eq!(label_step(0.0, 4), 1.0);
    }

    #[test]
    fn test_label_levels() {
        let levels = label_levels(0.9, 3.0, 0.5, 10);
        assert_eq!(levels, vec![1.0, 1.5, 2.0, 2.5, 3.0]);
        assert_eq!(label_levels(0.0, 10.0, 1.0, 3).len(), 3);
        assert!(label_levels(0.0, 1.0, 0.0, 10).is_empty());
    }

    #[test]
    fn test_label_levels_below_float_spacing() {
        // Adding 0.5 to 1e16 is a no-op; counting must still end
        let levels = label_levels(1.0e16, 1.0e16 + 2.0, 0.5, 20);
        assert_eq!(levels.len(), 5);
        assert!(levels.iter().all(|&l| (l - 1.0e16).abs() <= 2.0));
    }

    #[test]
    fn test_ascii_large_levels() {
        let table = LevelTable::from_observations(&[
            Observation {
                time: at(0),
                level: 1.0e16,
            },
            Observation {
                time: at(6),
                level: 1.0e16 + 2.0,
            },
        ]);
        let text = render(|out| draw_ascii(out, &table, 20, 40));
        assert!(text.contains(SOURCE_MARK));
        assert!(text.contains('┤'));
    }

    #[test]
    fn test_ascii_markers() {
        let text = render(|out| draw_ascii(out, &test_table(), 10, 13));
        let lines: Vec<&str> = text.lines().collect();

        // Source and prediction coincide at the first sample
        assert!(text.contains(OVERLAP_MARK));
        // Top row holds the source maximum only
        assert!(lines[0].contains(SOURCE_MARK));
        assert!(!lines[0].contains(PREDICTION_MARK));
        assert!(text.contains(PREDICTION_MARK));
        assert!(text.contains("2023-06-01 00:00"));
        assert!(text.contains("2023-06-01 12:00"));
    }

    #[test]
    fn test_ascii_y_labels() {
        let text = render(|out| draw_ascii(out, &test_table(), 13, 20));
        assert!(text.contains("+1.0"));
        assert!(text.contains("+3.0"));
        assert!(text.contains('┤'));
    }

    #[test]
    fn test_ascii_flat_series() {
        let table = LevelTable::from_observations(&[Observation {
            time: at(0),
            level: 0.5,
        }]);
        let text = render(|out| draw_ascii(out, &table, 5, 10));
        assert!(text.contains(SOURCE_MARK));
    }

    #[test]
    fn test_ascii_empty() {
        let text = render(|out| draw_ascii(out, &LevelTable::default(), 5, 10));
        assert_eq!(text, "(no data to chart)\n");
    }

    #[test]
    fn test_data_table() {
        let text = render(|out| write_data_table(out, &test_table()));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("datetime"));
        assert!(lines[1].starts_with("2023-06-01 00:00:00"));
        assert!(lines[1].ends_with("source"));
        assert!(lines[6].ends_with("prediction"));
    }

    #[test]
    fn test_harmonic_table_limit() {
        let tide = Tide::new(vec![
            HarmonicTerm {
                constituent: Constituent::Z0,
                amplitude: 1.0,
                phase: 0.0,
            },
            HarmonicTerm {
                constituent: Constituent::M2,
                amplitude: 0.8,
                phase: 10.0,
            },
            HarmonicTerm {
                constituent: Constituent::K1,
                amplitude: 0.2,
                phase: 20.0,
            },
        ]);
        let text = render(|out| write_harmonic_table(out, &tide, at(0), 2));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[2].starts_with("Z0"));
        assert!(lines[3].starts_with("M2"));
        assert!(lines[3].contains("28.98"));
        assert_eq!(lines[4], "... 1 more");

        let text = render(|out| write_harmonic_table(out, &tide, at(0), 0));
        assert!(text.contains("K1"));
        assert!(!text.contains("more"));
    }

    #[test]
    fn test_extrema_listing() {
        let extrema = [
            Extremum {
                time: at(3),
                level: 1.5,
                kind: ExtremumKind::High,
            },
            Extremum {
                time: at(9),
                level: -1.5,
                kind: ExtremumKind::Low,
            },
        ];
        let text = render(|out| write_extrema(out, &extrema));
        assert!(text.contains("2023-06-01 03:00:00  High"));
        assert!(text.contains("2023-06-01 09:00:00  Low"));

        let text = render(|out| write_extrema(out, &[]));
        assert_eq!(text, "No high or low waters in range\n");
    }

    #[test]
    fn test_classification_line() {
        let tide = Tide::new(vec![
            HarmonicTerm {
                constituent: Constituent::M2,
                amplitude: 1.0,
                phase: 0.0,
            },
            HarmonicTerm {
                constituent: Constituent::K1,
                amplitude: 0.1,
                phase: 0.0,
            },
        ]);
        let text = render(|out| write_classification(out, &tide));
        assert!(text.contains("Form number: 0.100 (semidiurnal)"));

        let text = render(|out| write_classification(out, &Tide::new(Vec::new())));
        assert!(text.contains("undefined"));
    }

    #[test]
    fn test_constituent_listing() {
        let text = render(|out| write_constituents(out, at(0)));
        assert_eq!(text.lines().count(), 39);
        assert!(text.contains("M2"));
        assert!(text.contains("12.42"));
    }
}
