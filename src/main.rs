use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use hourly_price_extender::{hour_logic, ExtenderConfig, ExtensionPipeline};

#[derive(Parser)]
#[command(name = "hourly_price_extender")]
#[command(about = "Extend monthly price forecasts into a reconciled hourly series")]
struct Args {
    /// Path to the pipeline configuration TOML
    #[arg(short, long, default_value = "extender.toml")]
    config: PathBuf,

    /// Override the output CSV path from the configuration
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = ExtenderConfig::from_toml_file(&args.config)?;
    if let Some(output) = args.output {
        config.output.path = output;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        bail!("invalid configuration:\n{}", messages.join("\n"));
    }

    info!(
        "reading hour classification for '{}' from {}",
        config.hour_logic.iso_name,
        config.hour_logic.database.display()
    );
    let hour_class =
        hour_logic::load_hour_logic(&config.hour_logic.database, &config.hour_logic.iso_name)?;
    info!("loaded {} classification slots", hour_class.len());

    let summary = ExtensionPipeline::new(config).run(&hour_class)?;

    println!(
        "Wrote {} hourly prices ({} hub+label series over {} hours); max reconciliation error {:e}",
        summary.rows_written,
        summary.hub_on_off_count,
        summary.horizon_hours,
        summary.max_reconciliation_error
    );
    Ok(())
}
