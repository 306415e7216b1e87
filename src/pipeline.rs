//! End-to-end pipeline orchestration.

use anyhow::{Context, Result};
use log::info;

use crate::config::ExtenderConfig;
use crate::expand::{build_hour_spine, distinct_strings, project_prices};
use crate::export::write_output;
use crate::hour_logic::hour_class_frame;
use crate::models::{HourClassRow, PipelineSummary};
use crate::reconcile::{apply_shift_ratios, verify_reconciliation, RECONCILIATION_TOLERANCE};
use crate::reshape::{load_hourly_long, load_monthly_long};
use crate::shape::{classify_hours, compute_shape};

/// Runs the full extension: reshape, classify, shape, project, reconcile,
/// export.
///
/// The hour classification rows come in from the caller so the external store
/// stays a plain collaborator; the pipeline itself never opens a connection.
pub struct ExtensionPipeline {
    config: ExtenderConfig,
}

impl ExtensionPipeline {
    pub fn new(config: ExtenderConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, hour_class: &[HourClassRow]) -> Result<PipelineSummary> {
        let cfg = &self.config;

        info!(
            "loading hourly prices from {}",
            cfg.inputs.hourly_prices.display()
        );
        let hourly_long = load_hourly_long(&cfg.inputs.hourly_prices)?;
        info!("hourly input unpivoted to {} rows", hourly_long.height());

        let class_df = hour_class_frame(hour_class)?;
        let classified = classify_hours(&hourly_long, &class_df)?;

        info!(
            "loading monthly forecasts from {}",
            cfg.inputs.monthly_forecasts.display()
        );
        let monthly_long = load_monthly_long(&cfg.inputs.monthly_forecasts)?;
        info!("monthly input unpivoted to {} rows", monthly_long.height());

        let shape = compute_shape(&classified, &monthly_long)?;

        let spine = build_hour_spine(cfg.horizon.start, cfg.horizon.end, cfg.horizon.step_hours)?;
        let horizon_hours = spine.height();

        let projected = project_prices(&spine, &shape, &monthly_long)?;
        let reconciled = apply_shift_ratios(&projected)?;
        let max_reconciliation_error =
            verify_reconciliation(&reconciled, RECONCILIATION_TOLERANCE)
                .context("reconciled output failed the monthly-mean check")?;

        let rows_written = write_output(&reconciled, &cfg.output.path)?;

        let summary = PipelineSummary {
            horizon_hours,
            hub_count: distinct_strings(&shape, "hub")?.len(),
            hub_on_off_count: distinct_strings(&reconciled, "hub_on_off")?.len(),
            rows_written,
            max_reconciliation_error,
        };
        info!(
            "pipeline complete: {} rows over {} hours for {} hub+label series",
            summary.rows_written, summary.horizon_hours, summary.hub_on_off_count
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HorizonConfig, InputsConfig, OutputConfig};
    use crate::models::PeakLabel;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::fmt::Write as _;
    use tempfile::TempDir;

    /// Weekday HE 8-23 on-peak, everything else off-peak.
    fn week_classification() -> Vec<HourClassRow> {
        let mut rows = Vec::new();
        for dow in 0..7 {
            for hour_ending in 1..=24 {
                let label = if dow < 5 && (8..=23).contains(&hour_ending) {
                    PeakLabel::On
                } else {
                    PeakLabel::Off
                };
                rows.push(HourClassRow { dow, hour_ending, label });
            }
        }
        rows
    }

    fn on_peak(hour_ending: i32) -> bool {
        (8..=23).contains(&hour_ending)
    }

    /// Hourly history: Monday 2038-01-04 and Tuesday 2038-01-05 for one hub,
    /// 60 on-peak and 40 off-peak against a flat 50 forecast, so the shape
    /// ratios are 1.2 and 0.8.
    fn write_fixtures(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let mut hourly = String::from("MonthD,Hour,HubA\n");
        for day in [4u32, 5] {
            for hour in 0..24u32 {
                let he = hour as i32 + 1;
                let price = if on_peak(he) { 60.0 } else { 40.0 };
                writeln!(hourly, "2038-01-{day:02} {hour:02}:00:00,{he},{price}").unwrap();
            }
        }
        let hourly_path = dir.path().join("hourly.csv");
        std::fs::write(&hourly_path, hourly).unwrap();

        let monthly = "MonthD,HubA On,HubA Off\n\
                       2038-01-01,50.0,50.0\n\
                       2039-01-01,100.0,30.0\n";
        let monthly_path = dir.path().join("monthly.csv");
        std::fs::write(&monthly_path, monthly).unwrap();

        (hourly_path, monthly_path)
    }

    fn fixture_config(dir: &TempDir) -> ExtenderConfig {
        let (hourly_prices, monthly_forecasts) = write_fixtures(dir);
        ExtenderConfig {
            inputs: InputsConfig {
                hourly_prices,
                monthly_forecasts,
            },
            horizon: HorizonConfig {
                // Monday and Tuesday a year on, so both historical day shapes apply.
                start: NaiveDate::from_ymd_opt(2039, 1, 3).unwrap(),
                end: NaiveDate::from_ymd_opt(2039, 1, 4).unwrap(),
                step_hours: 1,
            },
            output: OutputConfig {
                path: dir.path().join("out.csv"),
            },
            ..ExtenderConfig::default()
        }
    }

    #[test]
    fn end_to_end_reconciles_to_the_forecast() {
        let dir = TempDir::new().unwrap();
        let cfg = fixture_config(&dir);
        let output_path = cfg.output.path.clone();

        let summary = ExtensionPipeline::new(cfg).run(&week_classification()).unwrap();
        assert_eq!(summary.horizon_hours, 48);
        assert_eq!(summary.rows_written, 48);
        assert_eq!(summary.hub_count, 1);
        assert_eq!(summary.hub_on_off_count, 2);
        assert!(summary.max_reconciliation_error < RECONCILIATION_TOLERANCE);

        // With flat on/off prices the shift ratio collapses each series onto
        // its forecast: every on-peak hour is 100, every off-peak hour 30.
        let content = std::fs::read_to_string(&output_path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "Hourly_TS,hub_on_off,Final_Price");

        let mut seen_keys = HashSet::new();
        let mut rows = 0;
        for line in lines {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 3, "bad row: {line}");
            let hour: i32 = fields[0][11..13].parse().unwrap();
            let price: f64 = fields[2].parse().unwrap();
            let expected = match fields[1] {
                "HubA On" => 100.0,
                "HubA Off" => 30.0,
                other => panic!("fabricated hub+label {other}"),
            };
            assert!(on_peak(hour + 1) == (fields[1] == "HubA On"), "bad row: {line}");
            assert!((price - expected).abs() < 1e-9, "bad price in: {line}");
            seen_keys.insert(fields[1].to_string());
            rows += 1;
        }
        assert_eq!(rows, 48);
        assert_eq!(seen_keys.len(), 2);
    }

    #[test]
    fn horizon_month_without_forecast_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let mut cfg = fixture_config(&dir);
        // February 2039 has no row in the monthly file.
        cfg.horizon.start = NaiveDate::from_ymd_opt(2039, 2, 7).unwrap();
        cfg.horizon.end = NaiveDate::from_ymd_opt(2039, 2, 8).unwrap();

        let err = ExtensionPipeline::new(cfg)
            .run(&week_classification())
            .unwrap_err();
        assert!(err.to_string().contains("no shape ratio") || err.to_string().contains("no monthly forecast"));
    }

    #[test]
    fn horizon_dow_missing_from_history_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let mut cfg = fixture_config(&dir);
        // Saturday: the historical data only covers Monday and Tuesday.
        cfg.horizon.start = NaiveDate::from_ymd_opt(2039, 1, 8).unwrap();
        cfg.horizon.end = NaiveDate::from_ymd_opt(2039, 1, 8).unwrap();

        let err = ExtensionPipeline::new(cfg)
            .run(&week_classification())
            .unwrap_err();
        assert!(err.to_string().contains("no shape ratio"));
    }
}
