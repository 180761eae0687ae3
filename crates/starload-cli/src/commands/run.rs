//! `starload run` — execute one source flow or a full sweep.

use std::path::Path;

use anyhow::Result;
use starload_engine::config::parser;
use starload_engine::orchestrator::Pipeline;
use starload_engine::result::{FlowReport, RunSummary};
use starload_types::{ExtractMode, RunStatus, SourceName};

/// Exit is non-zero iff any flow finished `FAILED`.
pub async fn execute(config_path: &Path, source: &str, mode: &str) -> Result<()> {
    let config = parser::parse_config(config_path)?;
    let mode: ExtractMode = mode.parse().map_err(anyhow::Error::msg)?;
    let pipeline = Pipeline::from_config(&config)?;

    if source == "all" {
        let summary = pipeline.run_all(mode).await?;
        print_summary(&summary);
        if summary.status() == RunStatus::Failed {
            anyhow::bail!("pipeline sweep finished FAILED");
        }
    } else {
        let source: SourceName = source.parse().map_err(anyhow::Error::msg)?;
        let report = pipeline.run(source, mode).await?;
        print_flow(&report);
        if report.status == RunStatus::Failed {
            anyhow::bail!("source '{source}' finished FAILED");
        }
    }
    Ok(())
}

fn print_flow(flow: &FlowReport) {
    println!(
        "{:<10} {:<8} extracted={:<6} loaded={:<6} rejected={:<5} dupes={:<4} {:.2}s",
        flow.source.as_str(),
        flow.status.as_str(),
        flow.counts.extracted,
        flow.counts.loaded,
        flow.counts.rejected,
        flow.duplicates_removed,
        flow.duration_secs,
    );
    if let Some(err) = &flow.error {
        println!("  error: {err}");
    }
}

fn print_summary(summary: &RunSummary) {
    for flow in &summary.flows {
        print_flow(flow);
    }
    let totals = summary.totals();
    println!(
        "{:<10} {:<8} extracted={:<6} loaded={:<6} rejected={:<5} daily_sales_rows={} {:.2}s",
        "total",
        summary.status().as_str(),
        totals.extracted,
        totals.loaded,
        totals.rejected,
        summary.daily_sales_rows.unwrap_or(0),
        summary.duration_secs,
    );
}
