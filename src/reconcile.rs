//! Monthly reconciliation.
//!
//! The shape ratios reproduce the hourly profile but not the exact monthly
//! level, because a future month's mix of weekdays differs from the historical
//! month the ratios were averaged over. The shift ratio forces the monthly
//! mean of final prices back onto the input forecast exactly.

use anyhow::{bail, Context, Result};
use log::info;
use polars::prelude::*;

/// Relative tolerance for the monthly-mean invariant.
pub const RECONCILIATION_TOLERANCE: f64 = 1e-9;

/// Applies the per-(hub+label, month) shift ratio to the raw projected prices.
///
/// `shift_ratio = forecast / mean(raw_price)` over the month, and
/// `final_price = raw_price * shift_ratio`.
pub fn apply_shift_ratios(projected: &DataFrame) -> Result<DataFrame> {
    let stats = projected
        .clone()
        .lazy()
        .group_by([col("hub_on_off"), col("month_start")])
        .agg([
            col("raw_price").mean().alias("projected_mean"),
            col("forecast_price").first().alias("target_forecast"),
        ])
        .collect()
        .context("monthly mean aggregation failed")?;

    reject_zero_means(&stats)?;

    let shifts = stats
        .lazy()
        .with_column((col("target_forecast") / col("projected_mean")).alias("shift_ratio"))
        .select([col("hub_on_off"), col("month_start"), col("shift_ratio")]);

    let reconciled = projected
        .clone()
        .lazy()
        .join(
            shifts,
            [col("hub_on_off"), col("month_start")],
            [col("hub_on_off"), col("month_start")],
            JoinArgs::new(JoinType::Inner),
        )
        .with_column((col("raw_price") * col("shift_ratio")).alias("final_price"))
        .collect()
        .context("shift ratio join failed")?;

    // Joining a group-by result back onto its own source cannot drop rows.
    if reconciled.height() != projected.height() {
        bail!(
            "shift ratio join changed the row count from {} to {}",
            projected.height(),
            reconciled.height()
        );
    }
    Ok(reconciled)
}

fn reject_zero_means(stats: &DataFrame) -> Result<()> {
    let bad = stats
        .clone()
        .lazy()
        .filter(
            col("projected_mean")
                .is_null()
                .or(col("projected_mean").eq(lit(0.0))),
        )
        .collect()?;

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
            "{} month(s) have a zero projected mean (e.g. {}); shift ratio is undefined",
            bad.height(),
            examples.join(", ")
        );
    }
    Ok(())
}

/// Verifies that every (hub+label, month) mean of `final_price` equals the
/// input forecast within `tolerance` relative error.
///
/// Returns the largest relative deviation observed.
pub fn verify_reconciliation(reconciled: &DataFrame, tolerance: f64) -> Result<f64> {
    let check = reconciled
        .clone()
        .lazy()
        .group_by([col("hub_on_off"), col("month_start")])
        .agg([
            col("final_price").mean().alias("final_mean"),
            col("forecast_price").first().alias("target_forecast"),
        ])
        .collect()
        .context("reconciliation check aggregation failed")?;

    let final_mean = check.column("final_mean")?.f64()?;
    let target = check.column("target_forecast")?.f64()?;
    let keys = check.column("hub_on_off")?.str()?;
    let months = check.column("month_start")?.str()?;

    let mut max_err = 0.0f64;
    for i in 0..check.height() {
        let (mean, want) = match (final_mean.get(i), target.get(i)) {
            (Some(m), Some(w)) => (m, w),
            _ => bail!("reconciliation check hit a null monthly mean"),
        };
        let err = ((mean - want) / want).abs();
        if err > tolerance {
            bail!(
                "monthly mean for {} {} is {mean} but the forecast is {want} (relative error {err:e})",
                keys.get(i).unwrap_or("?"),
                months.get(i).unwrap_or("?")
            );
        }
        max_err = max_err.max(err);
    }

    info!(
        "reconciliation verified for {} (hub+label, month) group(s); max relative error {max_err:e}",
        check.height()
    );
    Ok(max_err)
}
