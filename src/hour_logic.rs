//! Hour classification lookup.
//!
//! The On/Off peak calendar lives in an external `ISO_Hour_Logic` reference
//! table, one row per (ISO, day-of-week, hour-ending). It is read once at
//! startup and never written.

use anyhow::{bail, Context, Result};
use polars::prelude::*;
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;

use crate::models::{HourClassRow, PeakLabel};

const SLOTS_PER_WEEK: usize = 7 * 24;

/// Maps the source `Hour_Type` code to a peak label.
///
/// Types 1 and 3 are the off-peak buckets; everything else counts as on-peak.
pub fn map_hour_type(hour_type: i64) -> PeakLabel {
    match hour_type {
        1 | 3 => PeakLabel::Off,
        _ => PeakLabel::On,
    }
}

/// Maps the source Sunday-first `Day_Of_Week` (1-7) to Monday-first 0-6.
///
/// Any value outside 1-7 is a data error in the reference table and is
/// surfaced rather than mapped to a sentinel that would silently fail to join.
pub fn map_day_of_week(day_of_week: i64) -> Result<i32> {
    match day_of_week {
        1 => Ok(6), // Sunday
        2..=7 => Ok(day_of_week as i32 - 2),
        other => bail!("ISO_Hour_Logic Day_Of_Week out of range 1-7: {other}"),
    }
}

/// Reads the hour classification rows for one ISO from the lookup database.
pub fn load_hour_logic(database: &Path, iso_name: &str) -> Result<Vec<HourClassRow>> {
    let conn = Connection::open(database)
        .with_context(|| format!("cannot open hour logic database {}", database.display()))?;
    query_hour_logic(&conn, iso_name)
}

/// Queries the `ISO_Hour_Logic` table on an open connection.
pub fn query_hour_logic(conn: &Connection, iso_name: &str) -> Result<Vec<HourClassRow>> {
    let mut stmt = conn
        .prepare("SELECT Hour_Type, Day_Of_Week, Hour_Ending FROM ISO_Hour_Logic WHERE ISO_Name = ?1")
        .context("cannot prepare ISO_Hour_Logic query")?;

    let mut rows = stmt
        .query([iso_name])
        .context("ISO_Hour_Logic query failed")?;

    let mut out = Vec::with_capacity(SLOTS_PER_WEEK);
    while let Some(row) = rows.next()? {
        let hour_type: i64 = row.get(0)?;
        let day_of_week: i64 = row.get(1)?;
        let hour_ending: i64 = row.get(2)?;

        if !(1..=24).contains(&hour_ending) {
            bail!("ISO_Hour_Logic Hour_Ending out of range 1-24: {hour_ending}");
        }

        out.push(HourClassRow {
            dow: map_day_of_week(day_of_week)?,
            hour_ending: hour_ending as i32,
            label: map_hour_type(hour_type),
        });
    }

    validate_hour_logic(&out, iso_name)?;
    Ok(out)
}

/// Rejects an empty or duplicated lookup before it can poison the joins.
fn validate_hour_logic(rows: &[HourClassRow], iso_name: &str) -> Result<()> {
    if rows.is_empty() {
        bail!("no ISO_Hour_Logic rows found for ISO '{iso_name}'");
    }

    let mut seen: HashSet<(i32, i32)> = HashSet::with_capacity(rows.len());
    for row in rows {
        if !seen.insert((row.dow, row.hour_ending)) {
            bail!(
                "duplicate ISO_Hour_Logic slot for ISO '{iso_name}': dow {} hour ending {}",
                row.dow,
                row.hour_ending
            );
        }
    }

    if rows.len() != SLOTS_PER_WEEK {
        log::warn!(
            "ISO_Hour_Logic for '{}' covers {} of {} week slots; unmatched hours will be reported downstream",
            iso_name,
            rows.len(),
            SLOTS_PER_WEEK
        );
    }

    Ok(())
}

/// Builds the lookup DataFrame joined against the long hourly table.
pub fn hour_class_frame(rows: &[HourClassRow]) -> Result<DataFrame> {
    let dow: Vec<i32> = rows.iter().map(|r| r.dow).collect();
    let hour_ending: Vec<i32> = rows.iter().map(|r| r.hour_ending).collect();
    let label: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();

    let df = DataFrame::new(vec![
        Series::new("dow".into(), dow),
        Series::new("hour_ending".into(), hour_ending),
        Series::new("peak_label".into(), label),
    ])?;
    Ok(df)
}
