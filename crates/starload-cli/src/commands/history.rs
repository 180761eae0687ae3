//! `starload history` — print recent audit rows.

use std::path::Path;

use anyhow::Result;
use starload_engine::config::parser;
use starload_warehouse::{SqliteWarehouse, Warehouse};

pub fn execute(config_path: &Path, limit: u32) -> Result<()> {
    let config = parser::parse_config(config_path)?;
    let warehouse = SqliteWarehouse::open(&config.warehouse.path)?;

    let runs = warehouse.recent_runs(limit)?;
    if runs.is_empty() {
        println!("no runs recorded");
        return Ok(());
    }

    println!(
        "{:<5} {:<10} {:<12} {:<8} {:>9} {:>9} {:>8} {:<20}",
        "id", "source", "mode", "status", "extracted", "loaded", "rejected", "started"
    );
    for run in runs {
        println!(
            "{:<5} {:<10} {:<12} {:<8} {:>9} {:>9} {:>8} {:<20}",
            run.id,
            run.source,
            run.mode,
            run.status,
            run.counts.extracted,
            run.counts.loaded,
            run.counts.rejected,
            run.started_at,
        );
        if let Some(err) = &run.error_message {
            println!("      error: {err}");
        }
    }
    Ok(())
}
