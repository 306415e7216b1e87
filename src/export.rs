//! Final CSV export.

use anyhow::{Context, Result};
use log::info;
use polars::prelude::*;
use std::path::Path;

/// Writes the final hourly series as (`Hourly_TS`, `hub_on_off`, `Final_Price`),
/// sorted by hub+label then timestamp. Returns the number of rows written.
pub fn write_output(reconciled: &DataFrame, path: &Path) -> Result<usize> {
    let mut out = reconciled
        .clone()
        .lazy()
        .select([
            col("ts").alias("Hourly_TS"),
            col("hub_on_off"),
            col("final_price").alias("Final_Price"),
        ])
        .sort(["hub_on_off", "Hourly_TS"], Default::default())
        .collect()
        .context("output selection failed")?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create output directory {}", parent.display()))?;
        }
    }

    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create output file {}", path.display()))?;
    CsvWriter::new(file)
        .finish(&mut out)
        .with_context(|| format!("cannot write output CSV {}", path.display()))?;

    info!("wrote {} rows to {}", out.height(), path.display());
    Ok(out.height())
}
