//! `starload init` — create the warehouse and backfill the date dimension.

use std::path::Path;

use anyhow::Result;
use starload_engine::config::parser;
use starload_engine::orchestrator::Pipeline;

pub fn execute(config_path: &Path) -> Result<()> {
    let config = parser::parse_config(config_path)?;
    // Opening the warehouse creates the schema.
    let pipeline = Pipeline::from_config(&config)?;
    let inserted = pipeline.init_dates()?;
    println!(
        "warehouse ready at {} ({inserted} date rows added)",
        config.warehouse.path.display()
    );
    Ok(())
}
