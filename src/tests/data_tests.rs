//! # End-to-End Tests for the Command Line Flows
//!
//! These tests drive the `analyze`, `predict` and `extrema` commands the way
//! `main` does, against synthetic records written to temporary files. The
//! records are generated from a known harmonic model so the fitted model and
//! the predictions can be checked against it.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, NamedTempFile};
use tide_sites_lib::config::Config;
use tide_sites_lib::constituent::Constituent;
use tide_sites_lib::harmonics::{ExtremumKind, HarmonicTerm, Tide};

use crate::{
    load_model, run_analyze, run_extrema, run_predict, save_model, AnalyzeArgs, ExtremaArgs,
    PredictArgs,
};

fn term(constituent: Constituent, amplitude: f64, phase: f64) -> HarmonicTerm {
    HarmonicTerm {
        constituent,
        amplitude,
        phase,
    }
}

fn known_tide() -> Tide {
    Tide::new(vec![
        term(Constituent::Z0, 1.5, 0.0),
        term(Constituent::M2, 1.2, 40.0),
        term(Constituent::S2, 0.4, 80.0),
        term(Constituent::K1, 0.3, 200.0),
        term(Constituent::O1, 0.2, 300.0),
    ])
}

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Write an hourly day-first record of `hours + 1` rows generated from the known model.
fn write_record(dir: &Path, hours: i64) -> PathBuf {
    let times: Vec<NaiveDateTime> = (0..=hours).map(|h| start() + Duration::hours(h)).collect();
    let levels = known_tide().at(&times);
    let mut text = String::from("datetime, water level\n");
    for (time, level) in times.iter().zip(levels) {
        text.push_str(&format!("{}, {:.6}\n", time.format("%d/%m/%Y %H:%M"), level));
    }
    let path = dir.join("record.csv");
    fs::write(&path, text).unwrap();
    path
}

fn analyze_args(source: &Path) -> AnalyzeArgs {
    AnalyzeArgs {
        source: source.to_str().unwrap().to_string(),
        start: None,
        end: None,
        interval: None,
        no_prediction: false,
        show_data: false,
        chart: None,
        save_model: None,
        output: None,
    }
}

/// Config fitting only the constituents present in the synthetic record.
fn main_constituents_config() -> Config {
    let mut config = Config::default();
    config.analysis.constituents = Some(
        ["M2", "S2", "N2", "K1", "O1"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    config
}

fn count_rows(csv: &str, kind: &str) -> usize {
    csv.lines()
        .skip(1)
        .filter(|line| line.ends_with(&format!(",{}", kind)))
        .count()
}

/// A month of hourly data reproduces the generating model, and every output
/// file the command can write is produced.
#[test]
fn analyze_recovers_model_and_writes_outputs() {
    let dir = tempdir().unwrap();
    let record = write_record(dir.path(), 30 * 24);
    let mut args = analyze_args(&record);
    args.save_model = Some(dir.path().join("model.json"));
    args.output = Some(dir.path().join("combined.csv"));
    args.chart = Some(dir.path().join("chart.ppm"));

    let mut out = Vec::new();
    run_analyze(&args, &main_constituents_config(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Harmonic constituents"), "missing harmonic table");
    assert!(text.contains("Form number"), "missing classification");

    let model = load_model(&dir.path().join("model.json")).unwrap();
    let expected = known_tide();
    for c in [Constituent::M2, Constituent::S2, Constituent::K1, Constituent::O1] {
        assert!(
            (model.amplitude(c) - expected.amplitude(c)).abs() < 0.01,
            "{} amplitude {} expected {}",
            c,
            model.amplitude(c),
            expected.amplitude(c)
        );
    }
    let m2 = model
        .terms
        .iter()
        .find(|t| t.constituent == Constituent::M2)
        .unwrap();
    assert!((m2.phase - 40.0).abs() < 1.0, "M2 phase {}", m2.phase);
    assert!(model.amplitude(Constituent::N2) < 0.01);

    let combined = fs::read_to_string(dir.path().join("combined.csv")).unwrap();
    assert!(combined.starts_with("datetime,water level,type\n"));
    assert_eq!(count_rows(&combined, "source"), 721);
    // Default window: first to last observation date, both ends inclusive
    assert_eq!(count_rows(&combined, "prediction"), 721);
    assert!(combined.contains("2023-01-31 00:00:00"));

    let chart = fs::read(dir.path().join("chart.ppm")).unwrap();
    assert!(chart.starts_with(b"P6\n960 480\n255\n"));
}

/// A sub-hour interval is reported and the prediction skipped, not failed.
#[test]
fn analyze_skips_prediction_for_short_interval() {
    let dir = tempdir().unwrap();
    let record = write_record(dir.path(), 5 * 24);
    let mut args = analyze_args(&record);
    args.interval = Some(1800);
    args.output = Some(dir.path().join("combined.csv"));

    let mut out = Vec::new();
    run_analyze(&args, &main_constituents_config(), &mut out).unwrap();

    let combined = fs::read_to_string(dir.path().join("combined.csv")).unwrap();
    assert_eq!(count_rows(&combined, "source"), 121);
    assert_eq!(count_rows(&combined, "prediction"), 0);
}

/// Explicit dates override the default window, and `--show-data` prints the rows.
#[test]
fn analyze_with_explicit_window_and_data_table() {
    let dir = tempdir().unwrap();
    let record = write_record(dir.path(), 5 * 24);
    let mut args = analyze_args(&record);
    args.start = Some("10/01/2023".to_string());
    args.end = Some("11/01/2023".to_string());
    args.interval = Some(7200);
    args.show_data = true;

    let mut out = Vec::new();
    run_analyze(&args, &main_constituents_config(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let predictions: Vec<&str> = text
        .lines()
        .filter(|line| line.ends_with("prediction") && line.starts_with("2023"))
        .collect();
    assert_eq!(predictions.len(), 13, "two days at two hours, both ends included");
    assert!(predictions[0].starts_with("2023-01-10 00:00:00"));
    assert!(predictions[12].starts_with("2023-01-11 00:00:00"));
}

/// Turning prediction off leaves only source rows.
#[test]
fn analyze_without_prediction() {
    let dir = tempdir().unwrap();
    let record = write_record(dir.path(), 3 * 24);
    let mut args = analyze_args(&record);
    args.no_prediction = true;
    args.output = Some(dir.path().join("combined.csv"));

    let mut config = main_constituents_config();
    config.prediction.enabled = true;
    let mut out = Vec::new();
    run_analyze(&args, &config, &mut out).unwrap();

    let combined = fs::read_to_string(dir.path().join("combined.csv")).unwrap();
    assert_eq!(count_rows(&combined, "prediction"), 0);
    assert_eq!(count_rows(&combined, "source"), 73);
}

/// Files with the wrong header are rejected with the column message.
#[test]
fn analyze_rejects_wrong_columns() {
    let mut file = NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"time,level\n01/01/2023 00:00,1.0\n").unwrap();

    let args = analyze_args(file.path());
    let err = run_analyze(&args, &Config::default(), &mut Vec::new()).unwrap_err();
    let message = format!("{:#}", err);
    assert!(
        message.contains("Column name should be 'datetime' and 'water level'"),
        "unexpected error: {}",
        message
    );
}

/// Configured column names replace the default header.
#[test]
fn analyze_with_configured_columns() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("custom.csv");
    let times: Vec<NaiveDateTime> = (0..=72).map(|h| start() + Duration::hours(h)).collect();
    let levels = known_tide().at(&times);
    let mut text = String::from("time,level\n");
    for (time, level) in times.iter().zip(levels) {
        text.push_str(&format!("{},{}\n", time.format("%Y-%m-%d %H:%M:%S"), level));
    }
    fs::write(&path, text).unwrap();

    let mut config = main_constituents_config();
    config.csv.time_column = "time".to_string();
    config.csv.level_column = "level".to_string();
    let mut args = analyze_args(&path);
    args.no_prediction = true;

    run_analyze(&args, &config, &mut Vec::new()).unwrap();
}

/// A saved model predicts without the original record.
#[test]
fn predict_from_saved_model() {
    let dir = tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    save_model(&known_tide(), &model_path).unwrap();

    let args = PredictArgs {
        model: model_path.clone(),
        start: "2023-02-01".to_string(),
        end: "2023-02-02".to_string(),
        interval: None,
        output: None,
    };
    let mut out = Vec::new();
    run_predict(&args, &Config::default(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 26, "header plus 25 hourly rows");

    let output = dir.path().join("predicted.csv");
    let args = PredictArgs {
        output: Some(output.clone()),
        ..args
    };
    run_predict(&args, &Config::default(), &mut Vec::new()).unwrap();
    let csv = fs::read_to_string(output).unwrap();
    assert_eq!(count_rows(&csv, "prediction"), 25);
}

/// Prediction commands refuse intervals under an hour and reversed dates.
#[test]
fn predict_rejects_invalid_requests() {
    let file = NamedTempFile::new().unwrap();
    save_model(&known_tide(), file.path()).unwrap();

    let mut args = PredictArgs {
        model: file.path().to_path_buf(),
        start: "2023-02-01".to_string(),
        end: "2023-02-02".to_string(),
        interval: Some(600),
        output: None,
    };
    assert!(run_predict(&args, &Config::default(), &mut Vec::new()).is_err());

    args.interval = None;
    args.start = "2023-02-03".to_string();
    assert!(run_predict(&args, &Config::default(), &mut Vec::new()).is_err());
}

/// The saved model is a plain `{"terms": [...]}` document.
#[test]
fn saved_model_json_shape() {
    let file = NamedTempFile::new().unwrap();
    save_model(&known_tide(), file.path()).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(file.path()).unwrap()).unwrap();
    let terms = value["terms"].as_array().unwrap();
    assert_eq!(terms.len(), 5);
    assert_eq!(terms[1]["constituent"], "M2");
    assert_eq!(terms[1]["amplitude"], 1.2);

    let reloaded = load_model(file.path()).unwrap();
    for (loaded, original) in reloaded.terms.iter().zip(known_tide().terms) {
        assert_eq!(loaded.constituent, original.constituent);
        assert!((loaded.amplitude - original.amplitude).abs() < 1e-12);
        assert!((loaded.phase - original.phase).abs() < 1e-9);
    }
}

/// A write failure at the end of the model file is reported, not dropped.
#[cfg(target_os = "linux")]
#[test]
fn save_model_reports_failed_flush() {
    // Opening /dev/full succeeds; every write to it fails with ENOSPC
    let result = save_model(&known_tide(), Path::new("/dev/full"));
    assert!(result.is_err(), "write to /dev/full succeeded");
}

/// High and low waters over a day alternate and are listed in order.
#[test]
fn extrema_alternate_over_a_day() {
    let file = NamedTempFile::new().unwrap();
    save_model(&known_tide(), file.path()).unwrap();

    let args = ExtremaArgs {
        model: file.path().to_path_buf(),
        start: "2023-03-05".to_string(),
        end: "2023-03-05".to_string(),
    };
    let mut out = Vec::new();
    run_extrema(&args, &Config::default(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let kinds: Vec<ExtremumKind> = text
        .lines()
        .filter(|line| line.starts_with("2023-03-05"))
        .map(|line| {
            if line.contains("High") {
                ExtremumKind::High
            } else {
                ExtremumKind::Low
            }
        })
        .collect();
    assert!(
        (3..=5).contains(&kinds.len()),
        "expected 3-5 turning points in a semidiurnal day, got {}",
        kinds.len()
    );
    for pair in kinds.windows(2) {
        assert_ne!(pair[0], pair[1], "high and low waters should alternate");
    }
    assert!(text.contains("semidiurnal"));
}

/// A reversed extrema window is an error.
#[test]
fn extrema_rejects_reversed_dates() {
    let file = NamedTempFile::new().unwrap();
    save_model(&known_tide(), file.path()).unwrap();

    let args = ExtremaArgs {
        model: file.path().to_path_buf(),
        start: "2023-03-05".to_string(),
        end: "2023-03-04".to_string(),
    };
    assert!(run_extrema(&args, &Config::default(), &mut Vec::new()).is_err());
}
