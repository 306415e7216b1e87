//! Dense hour spine generation and full-horizon price projection.

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Duration, NaiveDate, Timelike};
use log::info;
use polars::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::reshape::month_start_key;
use crate::shape::report_join;

pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Generates the hour-start spine over `[start 00:00, end 23:00]` inclusive.
///
/// Columns: `ts` (formatted timestamp), `hour_ending`, `dow`, `month_start`,
/// `month_num`.
pub fn build_hour_spine(start: NaiveDate, end: NaiveDate, step_hours: u32) -> Result<DataFrame> {
    if step_hours == 0 {
        bail!("spine step must be > 0 hours");
    }
    if start > end {
        bail!("horizon start {start} is after horizon end {end}");
    }

    let mut ts = Vec::new();
    let mut hour_ending = Vec::new();
    let mut dow = Vec::new();
    let mut month_start = Vec::new();
    let mut month_num = Vec::new();

    let mut dt = start.and_hms_opt(0, 0, 0).unwrap();
    let last = end.and_hms_opt(23, 0, 0).unwrap();
    let step = Duration::hours(step_hours as i64);

    while dt <= last {
        ts.push(dt.format(TS_FORMAT).to_string());
        hour_ending.push(dt.hour() as i32 + 1);
        dow.push(dt.weekday().num_days_from_monday() as i32);
        month_start.push(month_start_key(&dt));
        month_num.push(dt.month() as i32);
        dt = dt + step;
    }

    let df = DataFrame::new(vec![
        Series::new("ts".into(), ts),
        Series::new("hour_ending".into(), hour_ending),
        Series::new("dow".into(), dow),
        Series::new("month_start".into(), month_start),
        Series::new("month_num".into(), month_num),
    ])?;

    info!("hour spine covers {} hours ({start} through {end})", df.height());
    Ok(df)
}

/// Projects raw hourly prices across the spine.
///
/// Each spine hour picks up one shape row per hub via
/// (month number, day-of-week, hour-ending), then the matching monthly
/// forecast via (month-start, hub+label); `raw_price = forecast * avg_ratio`.
/// Both joins are verified complete: any spine hour or forecast month that
/// fails to match is reported, never silently dropped.
pub fn project_prices(
    spine: &DataFrame,
    shape: &DataFrame,
    monthly_long: &DataFrame,
) -> Result<DataFrame> {
    let hubs = distinct_strings(shape, "hub")?;
    if hubs.is_empty() {
        bail!("shape table has no hubs to project");
    }

    let with_ratio = spine
        .clone()
        .lazy()
        .join(
            shape.clone().lazy(),
            [col("month_num"), col("dow"), col("hour_ending")],
            [col("month_num"), col("dow"), col("hour_ending")],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()
        .context("spine/shape join failed")?;

    let expected = spine.height() * hubs.len();
    if with_ratio.height() != expected {
        report_unmatched_spine_hours(spine, shape, &hubs)?;
    }
    report_join("spine/shape", expected, with_ratio.height())?;

    let monthly_keyed = monthly_long
        .clone()
        .lazy()
        .select([col("hub_on_off"), col("month_start"), col("forecast_price")]);

    let projected = with_ratio
        .clone()
        .lazy()
        .join(
            monthly_keyed,
            [col("hub_on_off"), col("month_start")],
            [col("hub_on_off"), col("month_start")],
            JoinArgs::new(JoinType::Inner),
        )
        .with_column((col("forecast_price") * col("avg_ratio")).alias("raw_price"))
        .collect()
        .context("spine/forecast join failed")?;

    if projected.height() != with_ratio.height() {
        report_unmatched_forecast_months(&with_ratio, monthly_long)?;
    }
    report_join("spine/forecast", with_ratio.height(), projected.height())?;

    Ok(projected)
}

pub(crate) fn distinct_strings(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    let ca = df.column(column)?.str()?;
    let mut seen = HashSet::new();
    for i in 0..df.height() {
        if let Some(v) = ca.get(i) {
            seen.insert(v.to_string());
        }
    }
    let mut out: Vec<String> = seen.into_iter().collect();
    out.sort();
    Ok(out)
}

/// Names the spine hours that found no shape row, then fails.
fn report_unmatched_spine_hours(
    spine: &DataFrame,
    shape: &DataFrame,
    hubs: &[String],
) -> Result<()> {
    let mut shape_keys: HashMap<&str, HashSet<(i32, i32, i32)>> = HashMap::new();
    let hub_col = shape.column("hub")?.str()?;
    let m = shape.column("month_num")?.i32()?;
    let d = shape.column("dow")?.i32()?;
    let h = shape.column("hour_ending")?.i32()?;
    for i in 0..shape.height() {
        if let (Some(hub), Some(m), Some(d), Some(h)) =
            (hub_col.get(i), m.get(i), d.get(i), h.get(i))
        {
            shape_keys.entry(hub).or_default().insert((m, d, h));
        }
    }

    let ts = spine.column("ts")?.str()?;
    let m = spine.column("month_num")?.i32()?;
    let d = spine.column("dow")?.i32()?;
    let h = spine.column("hour_ending")?.i32()?;

    let mut missing = 0usize;
    let mut examples = Vec::new();
    for i in 0..spine.height() {
        let key = (m.get(i).unwrap(), d.get(i).unwrap(), h.get(i).unwrap());
        for hub in hubs {
            let covered = shape_keys
                .get(hub.as_str())
                .map(|keys| keys.contains(&key))
                .unwrap_or(false);
            if !covered {
                missing += 1;
                if examples.len() < 5 {
                    examples.push(format!("{} for hub {}", ts.get(i).unwrap_or("?"), hub));
                }
            }
        }
    }

    if missing == 0 {
        // The count moved the other way: some (month, dow, hour) slot carries
        // more than one shape row for the same hub.
        let total: usize = shape_keys.values().map(|k| k.len()).sum();
        bail!(
            "shape table has duplicate (month, day-of-week, hour) slots: {} rows for {} distinct keys",
            shape.height(),
            total
        );
    }

    bail!(
        "{missing} spine hour(s) have no shape ratio (e.g. {}); \
         the historical hourly data does not cover every (month, day-of-week, hour) slot",
        examples.join(", ")
    )
}

/// Names the (month, hub+label) pairs missing from the monthly forecast, then fails.
fn report_unmatched_forecast_months(with_ratio: &DataFrame, monthly_long: &DataFrame) -> Result<()> {
    let mut available: HashSet<(String, String)> = HashSet::new();
    let key = monthly_long.column("hub_on_off")?.str()?;
    let month = monthly_long.column("month_start")?.str()?;
    for i in 0..monthly_long.height() {
        if let (Some(k), Some(m)) = (key.get(i), month.get(i)) {
            available.insert((k.to_string(), m.to_string()));
        }
    }

    let key = with_ratio.column("hub_on_off")?.str()?;
    let month = with_ratio.column("month_start")?.str()?;
    let mut missing: HashSet<(String, String)> = HashSet::new();
    for i in 0..with_ratio.height() {
        if let (Some(k), Some(m)) = (key.get(i), month.get(i)) {
            if !available.contains(&(k.to_string(), m.to_string())) {
                missing.insert((k.to_string(), m.to_string()));
            }
        }
    }

    let mut sorted: Vec<String> = missing.iter().map(|(k, m)| format!("{k} {m}")).collect();
    sorted.sort();
    let shown = sorted.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
    bail!(
        "{} (hub+label, month) pair(s) in the horizon have no monthly forecast (e.g. {shown})",
        sorted.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn spine_covers_january_without_gaps() {
        let spine = build_hour_spine(date(2039, 1, 1), date(2039, 1, 31), 1).unwrap();
        assert_eq!(spine.height(), 31 * 24);

        let ts = spine.column("ts").unwrap().str().unwrap();
        assert_eq!(ts.get(0).unwrap(), "2039-01-01 00:00:00");
        assert_eq!(ts.get(spine.height() - 1).unwrap(), "2039-01-31 23:00:00");

        // No duplicates, exact 1-hour spacing throughout.
        let mut prev: Option<NaiveDateTime> = None;
        let mut seen = HashSet::new();
        for i in 0..spine.height() {
            let raw = ts.get(i).unwrap();
            assert!(seen.insert(raw.to_string()), "duplicate hour {raw}");
            let dt = NaiveDateTime::parse_from_str(raw, TS_FORMAT).unwrap();
            if let Some(p) = prev {
                assert_eq!(dt - p, Duration::hours(1));
            }
            prev = Some(dt);
        }
    }

    #[test]
    fn default_horizon_has_expected_hour_count() {
        // 2039-2043 includes one leap year (2040): 1826 days.
        let spine = build_hour_spine(date(2039, 1, 1), date(2043, 12, 31), 1).unwrap();
        assert_eq!(spine.height(), 1826 * 24);
    }

    #[test]
    fn spine_rejects_inverted_horizon() {
        assert!(build_hour_spine(date(2039, 2, 1), date(2039, 1, 1), 1).is_err());
        assert!(build_hour_spine(date(2039, 1, 1), date(2039, 1, 2), 0).is_err());
    }

    // Shape fixture: Mondays in January, all 24 hour-endings for one hub.
    // 2039-01-03 is a Monday.
    fn monday_shape() -> DataFrame {
        let hour_ending: Vec<i32> = (1..=24).collect();
        let ratio: Vec<f64> = (1..=24).map(|he| if he <= 12 { 0.5 } else { 1.5 }).collect();
        df!(
            "month_num" => vec![1i32; 24],
            "dow" => vec![0i32; 24],
            "hour_ending" => hour_ending,
            "hub" => vec!["HubA"; 24],
            "hub_on_off" => (1..=24).map(|he| if he <= 12 { "HubA Off" } else { "HubA On" }).collect::<Vec<_>>(),
            "avg_ratio" => ratio,
        )
        .unwrap()
    }

    fn january_forecast() -> DataFrame {
        df!(
            "MonthD" => ["2039-01-01", "2039-01-01"],
            "hub_on_off" => ["HubA Off", "HubA On"],
            "forecast_price" => [40.0f64, 60.0],
            "month_start" => ["2039-01-01", "2039-01-01"],
        )
        .unwrap()
    }

    #[test]
    fn projection_scales_forecast_by_ratio() {
        let spine = build_hour_spine(date(2039, 1, 3), date(2039, 1, 3), 1).unwrap();
        let projected = project_prices(&spine, &monday_shape(), &january_forecast()).unwrap();
        assert_eq!(projected.height(), 24);

        let he = projected.column("hour_ending").unwrap().i32().unwrap();
        let raw = projected.column("raw_price").unwrap().f64().unwrap();
        for i in 0..projected.height() {
            let expected = if he.get(i).unwrap() <= 12 {
                40.0 * 0.5
            } else {
                60.0 * 1.5
            };
            assert!((raw.get(i).unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn missing_shape_slot_is_reported() {
        let spine = build_hour_spine(date(2039, 1, 3), date(2039, 1, 3), 1).unwrap();
        let shape = monday_shape()
            .lazy()
            .filter(col("hour_ending").neq(lit(7)))
            .collect()
            .unwrap();
        let err = project_prices(&spine, &shape, &january_forecast()).unwrap_err();
        assert!(err.to_string().contains("no shape ratio"));
        assert!(err.to_string().contains("2039-01-03 06:00:00"));
    }

    #[test]
    fn missing_forecast_month_is_reported() {
        let spine = build_hour_spine(date(2039, 1, 3), date(2039, 1, 3), 1).unwrap();
        let forecast = january_forecast()
            .lazy()
            .filter(col("hub_on_off").neq(lit("HubA On")))
            .collect()
            .unwrap();
        let err = project_prices(&spine, &monday_shape(), &forecast).unwrap_err();
        assert!(err.to_string().contains("no monthly forecast"));
        assert!(err.to_string().contains("HubA On 2039-01-01"));
    }
}
