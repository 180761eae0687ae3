//! Per-run audit accounting.
//!
//! One audit row per (source, invocation) pair: created at run start,
//! finalized exactly once at run end, never mutated afterward. Counts
//! accumulate additively across chunks within the run.

use std::sync::Arc;

use starload_types::{ExtractMode, RunStatus, SourceName, StageCounts};
use starload_warehouse::Warehouse;

use crate::errors::Result;

/// Opens and finalizes audit rows, deciding terminal status from the
/// accumulated counts and the configured rejection threshold.
pub struct RunRecorder {
    warehouse: Arc<dyn Warehouse>,
    reject_threshold: u64,
}

/// An in-flight run's accumulator. Dropping a handle without finishing
/// leaves the audit row in its non-terminal state, which is itself
/// visible evidence of a crashed run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: i64,
    source: SourceName,
    counts: StageCounts,
}

impl RunHandle {
    #[must_use]
    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    #[must_use]
    pub fn source(&self) -> SourceName {
        self.source
    }

    #[must_use]
    pub fn counts(&self) -> StageCounts {
        self.counts
    }

    /// Fold one batch's counts into the run total.
    pub fn record(&mut self, batch: StageCounts) {
        self.counts.absorb(batch);
    }
}

impl RunRecorder {
    #[must_use]
    pub fn new(warehouse: Arc<dyn Warehouse>, reject_threshold: u64) -> Self {
        Self {
            warehouse,
            reject_threshold,
        }
    }

    /// Open the audit row for a new run.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`PipelineError`](crate::PipelineError) if the
    /// audit row cannot be created.
    pub fn start(&self, source: SourceName, mode: ExtractMode) -> Result<RunHandle> {
        let run_id = self.warehouse.start_run(source, mode)?;
        tracing::info!(run_id, source = %source, mode = %mode, "run started");
        Ok(RunHandle {
            run_id,
            source,
            counts: StageCounts::default(),
        })
    }

    /// Finalize the run: an uncaught error is `FAILED` with the message
    /// captured verbatim; otherwise `SUCCESS` when rejections are at or
    /// under the threshold, `PARTIAL` above it.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`PipelineError`](crate::PipelineError) if the
    /// audit row cannot be updated.
    pub fn finish(&self, handle: &RunHandle, error: Option<&str>) -> Result<RunStatus> {
        let status = match error {
            Some(_) => RunStatus::Failed,
            None if handle.counts.rejected <= self.reject_threshold => RunStatus::Success,
            None => RunStatus::Partial,
        };
        self.warehouse
            .finish_run(handle.run_id, status, &handle.counts, error)?;
        tracing::info!(
            run_id = handle.run_id,
            source = %handle.source,
            status = %status,
            extracted = handle.counts.extracted,
            loaded = handle.counts.loaded,
            rejected = handle.counts.rejected,
            "run finished"
        );
        Ok(status)
    }
}
