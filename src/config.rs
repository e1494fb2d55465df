//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the tide-config.toml file.
//! It provides a centralized way to configure CSV parsing, harmonic analysis,
//! prediction defaults and display sizes. Every field has a default, so a
//! partial file only overrides what it names.

use crate::constituent::{Constituent, UnknownConstituent, NOAA};
use crate::harmonics::{DecomposeOptions, DEFAULT_N_PERIOD, DEFAULT_PARTITION_HOURS, DEFAULT_RIDGE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "tide-config.toml";

/// Application configuration loaded from tide-config.toml
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Input file layout
    pub csv: CsvConfig,
    /// Harmonic analysis settings
    pub analysis: AnalysisConfig,
    /// Prediction defaults
    pub prediction: PredictionConfig,
    /// Terminal and image output
    pub display: DisplayConfig,
}

/// Layout of the observation CSV
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Header of the date-time column
    pub time_column: String,
    /// Header of the water level column
    pub level_column: String,
    /// Read ambiguous dates such as 03/04/2023 as 3 April (true) or March 4 (false)
    pub day_first: bool,
}

/// Harmonic analysis settings
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum number of cycles a constituent must complete to be fitted
    pub n_period: f64,
    /// Hours between node factor updates
    pub partition_hours: f64,
    /// Relative ridge term for the least squares solve
    pub ridge: f64,
    /// Candidate constituents by name; the NOAA set when absent
    pub constituents: Option<Vec<String>>,
}

/// Prediction defaults
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Whether `analyze` predicts unless told otherwise
    pub enabled: bool,
    /// Spacing of predicted levels in seconds
    pub interval_seconds: i64,
}

/// Terminal and image output settings
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Height of the ASCII chart in rows
    pub ascii_rows: usize,
    /// Width of the ASCII chart plot area in columns
    pub ascii_columns: usize,
    /// Raster chart width in pixels
    pub chart_width: u32,
    /// Raster chart height in pixels
    pub chart_height: u32,
    /// Rows of the harmonic table to print; 0 prints all
    pub harmonic_rows: usize,
}

impl Default for CsvConfig {
    fn default() -> Self {
        CsvConfig {
            time_column: "datetime".to_string(),
            level_column: "water level".to_string(),
            day_first: true,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            n_period: DEFAULT_N_PERIOD,
            partition_hours: DEFAULT_PARTITION_HOURS,
            ridge: DEFAULT_RIDGE,
            constituents: None,
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        PredictionConfig {
            enabled: true,
            interval_seconds: 3600,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            ascii_rows: 20,
            ascii_columns: 100,
            chart_width: 960,
            chart_height: 480,
            harmonic_rows: 0,
        }
    }
}

impl AnalysisConfig {
    /// Resolve the configured names into decomposition options.
    pub fn decompose_options(&self) -> Result<DecomposeOptions, UnknownConstituent> {
        let constituents = match &self.constituents {
            Some(names) => names
                .iter()
                .map(|name| name.parse::<Constituent>())
                .collect::<Result<Vec<_>, _>>()?,
            None => NOAA.to_vec(),
        };
        Ok(DecomposeOptions {
            constituents,
            n_period: self.n_period,
            partition_hours: self.partition_hours,
            ridge: self.ridge,
        })
    }
}

impl Config {
    /// Load configuration from tide-config.toml file
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "invalid config file, using defaults"
                    );
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.csv.time_column, "datetime");
        assert_eq!(config.csv.level_column, "water level");
        assert!(config.csv.day_first);
        assert_eq!(config.analysis.n_period, 2.0);
        assert_eq!(config.analysis.partition_hours, 240.0);
        assert_eq!(config.prediction.interval_seconds, 3600);
        assert!(config.prediction.enabled);
    }

    #[test]
    fn test_config_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.analysis.constituents = Some(vec!["M2".to_string(), "K1".to_string()]);
        config.display.chart_width = 640;
        config.save(file.path()).unwrap();

        let loaded = Config::load_from_path(file.path());
        assert_eq!(loaded.display.chart_width, 640);
        assert_eq!(
            loaded.analysis.constituents,
            Some(vec!["M2".to_string(), "K1".to_string()])
        );
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[csv]
day_first = false

[prediction]
interval_seconds = 7200
"#,
        )
        .unwrap();
        assert!(!config.csv.day_first);
        assert_eq!(config.csv.time_column, "datetime");
        assert_eq!(config.prediction.interval_seconds, 7200);
        assert!(config.prediction.enabled);
        assert_eq!(config.display.ascii_rows, 20);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.csv.level_column, "water level");
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "[analysis]\nn_period = \"two\"\n").unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.analysis.n_period, 2.0);
    }

    #[test]
    fn test_decompose_options() {
        let mut analysis = AnalysisConfig::default();
        assert_eq!(analysis.decompose_options().unwrap().constituents.len(), 37);

        analysis.constituents = Some(vec!["M2".into(), "S2".into()]);
        let options = analysis.decompose_options().unwrap();
        assert_eq!(options.constituents, vec![Constituent::M2, Constituent::S2]);

        analysis.constituents = Some(vec!["M2".into(), "Q9".into()]);
        assert!(analysis.decompose_options().is_err());
    }
}
