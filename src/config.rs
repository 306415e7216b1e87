//! TOML-based pipeline configuration.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

/// Top-level pipeline configuration parsed from TOML.
///
/// All fields default to the values the original study used, so an empty file
/// is a valid configuration apart from the input/output paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtenderConfig {
    /// Input file locations.
    #[serde(default)]
    pub inputs: InputsConfig,
    /// Hour classification lookup store.
    #[serde(default)]
    pub hour_logic: HourLogicConfig,
    /// Projection horizon.
    #[serde(default)]
    pub horizon: HorizonConfig,
    /// Output file location.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Input file locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputsConfig {
    /// Wide CSV of historical hourly prices (MonthD, Hour, one column per hub).
    pub hourly_prices: PathBuf,
    /// Wide CSV of monthly forecasts (MonthD, one column per hub+peak label).
    pub monthly_forecasts: PathBuf,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            hourly_prices: PathBuf::from("hourly_prices.csv"),
            monthly_forecasts: PathBuf::from("monthly_forecasts.csv"),
        }
    }
}

/// Hour classification lookup store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HourLogicConfig {
    /// SQLite database holding the ISO_Hour_Logic table.
    pub database: PathBuf,
    /// ISO/region name the lookup is filtered to.
    pub iso_name: String,
}

impl Default for HourLogicConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("hour_logic.sqlite"),
            iso_name: "New York ISO".to_string(),
        }
    }
}

/// Projection horizon, inclusive on both dates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HorizonConfig {
    /// First day of the projection (hours start at 00:00).
    pub start: NaiveDate,
    /// Last day of the projection (hours run through 23:00).
    pub end: NaiveDate,
    /// Spine step in hours (must be > 0).
    pub step_hours: u32,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2039, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2043, 12, 31).unwrap(),
            step_hours: 1,
        }
    }
}

/// Output file location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Destination CSV (Hourly_TS, hub_on_off, Final_Price).
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("hourly_extension.csv"),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Default for ExtenderConfig {
    fn default() -> Self {
        Self {
            inputs: InputsConfig::default(),
            hour_logic: HourLogicConfig::default(),
            horizon: HorizonConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl ExtenderConfig {
    /// Parses a configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.horizon.step_hours == 0 {
            errors.push(ConfigError {
                field: "horizon.step_hours".into(),
                message: "must be > 0".into(),
            });
        }
        if self.horizon.start > self.horizon.end {
            errors.push(ConfigError {
                field: "horizon.start".into(),
                message: "must be <= horizon.end".into(),
            });
        }
        if self.hour_logic.iso_name.trim().is_empty() {
            errors.push(ConfigError {
                field: "hour_logic.iso_name".into(),
                message: "must not be empty".into(),
            });
        }

        errors
    }
}
