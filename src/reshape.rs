//! Wide-to-long reshaping of the two CSV inputs.
//!
//! Both inputs arrive wide: one row per `MonthD` timestamp with one value
//! column per hub (hourly file) or per hub+peak label (monthly file). All
//! downstream joins want long form, one row per (timestamp, series, value).

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use polars::prelude::*;
use std::path::Path;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];

/// Reads a wide CSV with a header row.
pub fn read_wide_csv(path: &Path) -> Result<DataFrame> {
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .finish()
        .with_context(|| format!("cannot open input CSV {}", path.display()))?
        .collect()
        .with_context(|| format!("cannot read input CSV {}", path.display()))?;

    if df.height() == 0 {
        bail!("input CSV {} contains no data rows", path.display());
    }
    Ok(df)
}

/// Parses a `MonthD` cell, accepting the common US and ISO layouts.
///
/// Date-only values parse to midnight, which is what the monthly file carries.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(d.and_hms_opt(0, 0, 0).unwrap());
        }
    }
    bail!("cannot parse MonthD value '{raw}'")
}

/// First day of the timestamp's month as a plain `YYYY-MM-01` key.
pub fn month_start_key(dt: &NaiveDateTime) -> String {
    format!("{:04}-{:02}-01", dt.year(), dt.month())
}

/// Unpivots a wide frame to long form.
///
/// Every column except `id_col` and `skip` becomes a (`var_name`, `value_name`)
/// pair; values are carried as Float64 untouched. Column order of the input
/// decides the concatenation order.
pub fn unpivot(
    df: &DataFrame,
    id_col: &str,
    var_name: &str,
    value_name: &str,
    skip: &[&str],
) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    if !names.iter().any(|n| n == id_col) {
        bail!("input is missing the '{id_col}' column (found: {})", names.join(", "));
    }

    let series_cols: Vec<String> = names
        .into_iter()
        .filter(|n| n != id_col && !skip.contains(&n.as_str()))
        .collect();

    if series_cols.is_empty() {
        bail!("input has no value columns to unpivot besides '{id_col}'");
    }

    let mut parts = Vec::with_capacity(series_cols.len());
    for name in &series_cols {
        parts.push(df.clone().lazy().select([
            col(id_col),
            lit(name.as_str()).alias(var_name),
            col(name.as_str())
                .cast(DataType::Float64)
                .alias(value_name),
        ]));
    }

    let long = concat(parts, UnionArgs::default())?
        .collect()
        .context("unpivot concat failed")?;
    Ok(long)
}

/// Adds hour-ending, day-of-week, month-start, and month-number columns
/// derived from `MonthD`.
///
/// Hour-of-day 0-23 becomes hour-ending 1-24 so the classification and shape
/// joins share one hour convention.
pub fn with_hourly_time_fields(mut df: DataFrame) -> Result<DataFrame> {
    let (hour_ending, dow, month_start, month_num) = derive_time_fields(&df)?;

    df.with_column(Series::new("hour_ending".into(), hour_ending))?;
    df.with_column(Series::new("dow".into(), dow))?;
    df.with_column(Series::new("month_start".into(), month_start))?;
    df.with_column(Series::new("month_num".into(), month_num))?;
    Ok(df)
}

/// Adds the month-start key column derived from `MonthD`.
pub fn with_month_field(mut df: DataFrame) -> Result<DataFrame> {
    let (_, _, month_start, _) = derive_time_fields(&df)?;
    df.with_column(Series::new("month_start".into(), month_start))?;
    Ok(df)
}

fn derive_time_fields(df: &DataFrame) -> Result<(Vec<i32>, Vec<i32>, Vec<String>, Vec<i32>)> {
    let ts = df
        .column("MonthD")?
        .str()
        .context("MonthD column is not a string column")?;

    let mut hour_ending = Vec::with_capacity(df.height());
    let mut dow = Vec::with_capacity(df.height());
    let mut month_start = Vec::with_capacity(df.height());
    let mut month_num = Vec::with_capacity(df.height());

    for i in 0..df.height() {
        let raw = ts
            .get(i)
            .with_context(|| format!("MonthD is null at row {i}"))?;
        let dt = parse_timestamp(raw)?;
        hour_ending.push(dt.hour() as i32 + 1);
        dow.push(dt.weekday().num_days_from_monday() as i32);
        month_start.push(month_start_key(&dt));
        month_num.push(dt.month() as i32);
    }

    Ok((hour_ending, dow, month_start, month_num))
}

/// Loads and unpivots the hourly price file.
///
/// The redundant `Hour` column is dropped; hour and day-of-week derive strictly
/// from `MonthD`.
pub fn load_hourly_long(path: &Path) -> Result<DataFrame> {
    let wide = read_wide_csv(path)?;
    let long = unpivot(&wide, "MonthD", "hub", "price", &["Hour"])?;
    with_hourly_time_fields(long)
}

/// Loads and unpivots the monthly forecast file.
pub fn load_monthly_long(path: &Path) -> Result<DataFrame> {
    let wide = read_wide_csv(path)?;
    let long = unpivot(&wide, "MonthD", "hub_on_off", "forecast_price", &[])?;
    with_month_field(long)
}
