//! Pipeline execution result types.

use starload_types::{RunStatus, SourceName, StageCounts};

/// Outcome of one source-to-warehouse flow.
#[derive(Debug, Clone)]
pub struct FlowReport {
    pub source: SourceName,
    /// Audit row id in `etl_runs`.
    pub run_id: i64,
    pub status: RunStatus,
    pub counts: StageCounts,
    /// Duplicate records collapsed by the transformer. Not rejections:
    /// they survive as the single record carried forward.
    pub duplicates_removed: u64,
    pub duration_secs: f64,
    pub error: Option<String>,
}

/// Outcome of a whole pipeline sweep across all sources.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub flows: Vec<FlowReport>,
    /// Rows written by the daily-sales rebuild, if it ran.
    pub daily_sales_rows: Option<u64>,
    pub duration_secs: f64,
}

impl RunSummary {
    /// Aggregate status: the worst status among the per-source finals.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.flows
            .iter()
            .map(|f| f.status)
            .fold(RunStatus::Success, RunStatus::worst)
    }

    /// Totals folded across all flows.
    #[must_use]
    pub fn totals(&self) -> StageCounts {
        let mut total = StageCounts::default();
        for flow in &self.flows {
            total.absorb(flow.counts);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(source: SourceName, status: RunStatus, extracted: u64) -> FlowReport {
        FlowReport {
            source,
            run_id: 1,
            status,
            counts: StageCounts {
                extracted,
                transformed: extracted,
                loaded: extracted,
                rejected: 0,
            },
            duplicates_removed: 0,
            duration_secs: 0.1,
            error: None,
        }
    }

    #[test]
    fn summary_status_is_worst_of_flows() {
        let summary = RunSummary {
            flows: vec![
                flow(SourceName::Customers, RunStatus::Success, 10),
                flow(SourceName::Reviews, RunStatus::Partial, 5),
                flow(SourceName::Orders, RunStatus::Success, 20),
            ],
            daily_sales_rows: Some(3),
            duration_secs: 1.0,
        };
        assert_eq!(summary.status(), RunStatus::Partial);
    }

    #[test]
    fn summary_totals_fold_all_flows() {
        let summary = RunSummary {
            flows: vec![
                flow(SourceName::Customers, RunStatus::Success, 10),
                flow(SourceName::Orders, RunStatus::Success, 20),
            ],
            daily_sales_rows: None,
            duration_secs: 1.0,
        };
        assert_eq!(summary.totals().extracted, 30);
        assert_eq!(summary.totals().loaded, 30);
    }

    #[test]
    fn empty_summary_is_success() {
        let summary = RunSummary {
            flows: vec![],
            daily_sales_rows: None,
            duration_secs: 0.0,
        };
        assert_eq!(summary.status(), RunStatus::Success);
    }
}
