//! Peak classification and canonical hour-shape calculation.
//!
//! The shape table is the modeling core: the mean hourly/monthly price ratio
//! per (month number, day-of-week, hour-ending, hub+peak label). It captures
//! how an hour departs from its month's average independent of price level,
//! which is what lets one historical year of hourly data extend many future
//! years of monthly forecasts.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use polars::prelude::*;

/// Inner joins long hourly rows to the hour classification and forms the
/// composite `hub_on_off` key (`"<hub> <On|Off>"`).
///
/// Rows whose (day-of-week, hour-ending) slot is absent from the lookup are
/// dropped by the inner join; the drop count is logged and an empty result is
/// an error.
pub fn classify_hours(hourly_long: &DataFrame, hour_class: &DataFrame) -> Result<DataFrame> {
    let before = hourly_long.height();

    let classified = hourly_long
        .clone()
        .lazy()
        .join(
            hour_class.clone().lazy(),
            [col("dow"), col("hour_ending")],
            [col("dow"), col("hour_ending")],
            JoinArgs::new(JoinType::Inner),
        )
        .with_column(
            concat_str([col("hub"), col("peak_label")], " ", true).alias("hub_on_off"),
        )
        .collect()
        .context("hour classification join failed")?;

    report_join("hour classification", before, classified.height())?;
    Ok(classified)
}

/// Rejects forecast rows that would poison the ratio or reconciliation math.
pub fn validate_forecasts(monthly_long: &DataFrame) -> Result<()> {
    let bad = monthly_long
        .clone()
        .lazy()
        .filter(
            col("forecast_price")
                .is_null()
                .or(col("forecast_price").eq(lit(0.0))),
        )
        .collect()
        .context("forecast validation scan failed")?;

    if bad.height() > 0 {
        let keys = bad.column("hub_on_off")?.str()?;
        let months = bad.column("month_start")?.str()?;
        let mut examples = Vec::new();
        for i in 0..bad.height().min(5) {
            examples.push(format!(
                "{} {}",
                keys.get(i).unwrap_or("?"),
                months.get(i).unwrap_or("?")
            ));
        }
        bail!(
            "{} monthly forecast value(s) are zero or missing (e.g. {}); refusing to divide by them",
            bad.height(),
            examples.join(", ")
        );
    }
    Ok(())
}

/// Joins classified hourly prices to the monthly forecast and averages the
/// hourly/monthly ratio into the canonical shape table.
///
/// Output columns: `month_num`, `dow`, `hour_ending`, `hub`, `hub_on_off`,
/// `avg_ratio`.
pub fn compute_shape(classified: &DataFrame, monthly_long: &DataFrame) -> Result<DataFrame> {
    validate_forecasts(monthly_long)?;

    let before = classified.height();

    // Narrow the monthly side to its keys and value so no column of the
    // hourly side gets shadowed or suffixed.
    let monthly_keyed = monthly_long
        .clone()
        .lazy()
        .select([col("hub_on_off"), col("month_start"), col("forecast_price")]);

    let ratios = classified
        .clone()
        .lazy()
        .join(
            monthly_keyed,
            [col("hub_on_off"), col("month_start")],
            [col("hub_on_off"), col("month_start")],
            JoinArgs::new(JoinType::Inner),
        )
        .with_column((col("price") / col("forecast_price")).alias("hourly_ratio"))
        .collect()
        .context("hourly/monthly ratio join failed")?;

    report_join("hourly/monthly ratio", before, ratios.height())?;

    let shape = ratios
        .lazy()
        .group_by([
            col("month_num"),
            col("dow"),
            col("hour_ending"),
            col("hub"),
            col("hub_on_off"),
        ])
        .agg([col("hourly_ratio").mean().alias("avg_ratio")])
        .collect()
        .context("shape aggregation failed")?;

    info!(
        "shape table holds {} (month, dow, hour, hub+label) slots",
        shape.height()
    );
    Ok(shape)
}

/// Logs how many rows an inner join dropped; zero surviving rows is an error.
pub fn report_join(stage: &str, before: usize, after: usize) -> Result<()> {
    if after == 0 {
        bail!("{stage} join produced zero rows from {before} inputs; the join keys do not line up");
    }
    if after < before {
        warn!("{stage} join dropped {} of {} rows", before - after, before);
    } else {
        info!("{stage} join kept all {before} rows");
    }
    Ok(())
}
