//! Pipeline coordination.
//!
//! Each source flows through its own state machine independently:
//! `Pending -> Extracting -> Transforming -> Loading -> Done(status)`.
//! Extractions run concurrently under a per-source hard timeout; loads run
//! dimensions-before-facts so the orders flow validates against a
//! dimension snapshot that already includes this sweep's upserts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use starload_types::{
    ConnectorError, DateDimRow, ExtractMode, RawRecord, RunStatus, SourceName, StageCounts,
};
use starload_warehouse::{SqliteWarehouse, Warehouse};
use tokio::task::JoinSet;

use crate::config::types::{Limits, PipelineConfig};
use crate::connectors::{
    self, CustomersConnector, OrdersConnector, ReviewsConnector, SourceConnector,
};
use crate::errors::{PipelineError, Result};
use crate::load::Loader;
use crate::recorder::{RunHandle, RunRecorder};
use crate::result::{FlowReport, RunSummary};
use crate::transform;

// ---------------------------------------------------------------------------
// Flow state machine
// ---------------------------------------------------------------------------

/// Per-source flow state. Transitions only through [`FlowState::advance`]
/// or [`FlowState::fail`], so the terminal status is always explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Pending,
    Extracting,
    Transforming,
    Loading,
    Done(RunStatus),
}

impl FlowState {
    /// The next stage in the happy path. `Done` is absorbing.
    #[must_use]
    pub fn advance(self) -> Self {
        match self {
            Self::Pending => Self::Extracting,
            Self::Extracting => Self::Transforming,
            Self::Transforming => Self::Loading,
            Self::Loading => Self::Done(RunStatus::Success),
            done @ Self::Done(_) => done,
        }
    }

    /// Jump straight to a failed terminal state from any stage.
    #[must_use]
    pub fn fail(self) -> Self {
        Self::Done(RunStatus::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::Transforming => "transforming",
            Self::Loading => "loading",
            Self::Done(_) => "done",
        }
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The ETL coordinator: owns the warehouse handle, one connector per
/// source, and the operational limits.
pub struct Pipeline {
    warehouse: Arc<dyn Warehouse>,
    connectors: HashMap<SourceName, Arc<dyn SourceConnector>>,
    limits: Limits,
}

impl Pipeline {
    /// Assemble a pipeline from explicit parts. Used directly by tests;
    /// production callers go through [`Pipeline::from_config`].
    #[must_use]
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        connectors: Vec<Arc<dyn SourceConnector>>,
        limits: Limits,
    ) -> Self {
        let connectors = connectors.into_iter().map(|c| (c.source(), c)).collect();
        Self {
            warehouse,
            connectors,
            limits,
        }
    }

    /// Open the warehouse and wire up the three store connectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the warehouse database cannot be opened.
    pub fn from_config(config: &PipelineConfig) -> anyhow::Result<Self> {
        let warehouse = Arc::new(SqliteWarehouse::open(&config.warehouse.path)?);
        let connectors: Vec<Arc<dyn SourceConnector>> = vec![
            Arc::new(CustomersConnector::new(config.sources.customers.url.clone())),
            Arc::new(ReviewsConnector::new(
                config.sources.reviews.uri.clone(),
                config.sources.reviews.database.clone(),
                config.sources.reviews.collection.clone(),
            )),
            Arc::new(OrdersConnector::new(config.sources.orders.url.clone())),
        ];
        Ok(Self::new(warehouse, connectors, config.limits.clone()))
    }

    /// Run one source's flow end to end.
    ///
    /// A connector failure yields a `FAILED` [`FlowReport`], not an `Err`:
    /// the audit row is always completed. `Err` is reserved for fatal
    /// accounting failures.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Fatal`] if the audit row cannot be
    /// written or the flow task panics.
    pub async fn run(&self, source: SourceName, mode: ExtractMode) -> Result<FlowReport> {
        let extraction = self.extract(source, mode).await;
        self.process(source, mode, extraction).await
    }

    /// Run every source: extractions concurrently, then loads in
    /// dimension-before-fact order, then the daily-sales rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Fatal`] if audit accounting or the
    /// aggregate rebuild fails.
    pub async fn run_all(&self, mode: ExtractMode) -> Result<RunSummary> {
        let started = Instant::now();

        let mut set = JoinSet::new();
        for source in SourceName::all() {
            let connector = self.connectors.get(&source).cloned();
            let watermark = self.watermark_for(source, mode)?;
            let timeout = Duration::from_secs(self.limits.extract_timeout_secs);
            set.spawn(async move {
                let result = match connector {
                    Some(c) => extract_with_timeout(&*c, source, mode, watermark, timeout).await,
                    None => Err(no_connector(source)),
                };
                (source, result)
            });
        }

        let mut extractions: HashMap<SourceName, _> = HashMap::new();
        while let Some(joined) = set.join_next().await {
            let (source, result) = joined
                .map_err(|e| PipelineError::Fatal(anyhow::anyhow!("extract task failed: {e}")))?;
            extractions.insert(source, result);
        }

        // SourceName::all() is dimension-before-fact, so the orders flow
        // sees the dimensions this sweep just upserted.
        let mut flows = Vec::with_capacity(extractions.len());
        for source in SourceName::all() {
            let extraction = extractions
                .remove(&source)
                .unwrap_or_else(|| Err(no_connector(source)));
            flows.push(self.process(source, mode, extraction).await?);
        }

        let loader = Loader::new(self.warehouse.clone(), self.limits.batch_size);
        let daily_sales_rows = loader.rebuild_daily_sales()?;

        let summary = RunSummary {
            flows,
            daily_sales_rows: Some(daily_sales_rows),
            duration_secs: started.elapsed().as_secs_f64(),
        };
        tracing::info!(
            status = %summary.status(),
            extracted = summary.totals().extracted,
            loaded = summary.totals().loaded,
            rejected = summary.totals().rejected,
            "pipeline sweep finished"
        );
        Ok(summary)
    }

    /// Pre-populate the date dimension going back
    /// `limits.date_backfill_days` from today. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Fatal`] if the warehouse write fails.
    pub fn init_dates(&self) -> Result<u64> {
        let today = Utc::now().date_naive();
        let days = i64::from(self.limits.date_backfill_days);
        let rows: Vec<DateDimRow> = (0..=days)
            .rev()
            .map(|offset| DateDimRow::for_date(today - chrono::Duration::days(offset)))
            .collect();
        let inserted = self.warehouse.populate_dates(&rows)?;
        tracing::info!(inserted, span_days = days, "date dimension initialized");
        Ok(inserted)
    }

    async fn extract(
        &self,
        source: SourceName,
        mode: ExtractMode,
    ) -> std::result::Result<Vec<RawRecord>, ConnectorError> {
        let connector = self
            .connectors
            .get(&source)
            .ok_or_else(|| no_connector(source))?;
        let watermark = self.watermark_for(source, mode).map_err(|e| {
            ConnectorError::unavailable(source, e)
        })?;
        let timeout = Duration::from_secs(self.limits.extract_timeout_secs);
        extract_with_timeout(&**connector, source, mode, watermark, timeout).await
    }

    fn watermark_for(
        &self,
        source: SourceName,
        mode: ExtractMode,
    ) -> Result<Option<chrono::NaiveDateTime>> {
        match mode {
            ExtractMode::Full => Ok(None),
            ExtractMode::Incremental => Ok(self.warehouse.get_watermark(source)?),
        }
    }

    async fn process(
        &self,
        source: SourceName,
        mode: ExtractMode,
        extraction: std::result::Result<Vec<RawRecord>, ConnectorError>,
    ) -> Result<FlowReport> {
        let warehouse = self.warehouse.clone();
        let limits = self.limits.clone();
        tokio::task::spawn_blocking(move || {
            process_blocking(&warehouse, &limits, source, mode, extraction)
        })
        .await
        .map_err(|e| PipelineError::Fatal(anyhow::anyhow!("flow task panicked: {e}")))?
    }
}

fn no_connector(source: SourceName) -> ConnectorError {
    ConnectorError::unavailable(source, "no connector registered")
}

async fn extract_with_timeout(
    connector: &dyn SourceConnector,
    source: SourceName,
    mode: ExtractMode,
    watermark: Option<chrono::NaiveDateTime>,
    timeout: Duration,
) -> std::result::Result<Vec<RawRecord>, ConnectorError> {
    match tokio::time::timeout(timeout, connector.extract(mode, watermark)).await {
        Ok(result) => result,
        Err(_) => Err(ConnectorError::Timeout {
            source_name: source,
            timeout_secs: timeout.as_secs(),
        }),
    }
}

/// One source's transform-and-load stages, run on the blocking pool.
fn process_blocking(
    warehouse: &Arc<dyn Warehouse>,
    limits: &Limits,
    source: SourceName,
    mode: ExtractMode,
    extraction: std::result::Result<Vec<RawRecord>, ConnectorError>,
) -> Result<FlowReport> {
    let started = Instant::now();
    let recorder = RunRecorder::new(warehouse.clone(), limits.reject_threshold);
    let mut handle = recorder.start(source, mode)?;
    let mut state = FlowState::Pending.advance();

    let records = match extraction {
        Ok(records) => records,
        Err(err) => {
            // Extraction failure skips straight to FAILED.
            state = state.fail();
            let msg = err.to_string();
            tracing::warn!(source = %source, state = %state, error = %msg, "extraction failed");
            let status = recorder.finish(&handle, Some(&msg))?;
            return Ok(FlowReport {
                source,
                run_id: handle.run_id(),
                status,
                counts: handle.counts(),
                duplicates_removed: 0,
                duration_secs: started.elapsed().as_secs_f64(),
                error: Some(msg),
            });
        }
    };

    state = state.advance();
    tracing::debug!(source = %source, state = %state, records = records.len(), "flow state");

    let loader = Loader::new(warehouse.clone(), limits.batch_size);
    let staged = run_stages(warehouse, &loader, source, &records, &mut handle, &mut state);

    let (report_error, duplicates_removed) = match staged {
        Ok(duplicates) => (None, duplicates),
        Err(err) => (Some(err.to_string()), 0),
    };

    let status = recorder.finish(&handle, report_error.as_deref())?;
    state = FlowState::Done(status);
    tracing::debug!(source = %source, state = %state, "flow state");

    // A non-failed run advances the watermark to the newest cursor seen,
    // so the next incremental pull starts past this batch.
    if status != RunStatus::Failed {
        if let Some(cursor) = connectors::max_cursor(source, &records) {
            warehouse.set_watermark(source, cursor)?;
        }
    }

    Ok(FlowReport {
        source,
        run_id: handle.run_id(),
        status,
        counts: handle.counts(),
        duplicates_removed,
        duration_secs: started.elapsed().as_secs_f64(),
        error: report_error,
    })
}

/// Transform-stage counts go into the handle before loading starts, so a
/// run that dies mid-load still reports what was extracted and rejected.
#[allow(clippy::cast_possible_truncation)]
fn run_stages(
    warehouse: &Arc<dyn Warehouse>,
    loader: &Loader,
    source: SourceName,
    records: &[RawRecord],
    handle: &mut RunHandle,
    state: &mut FlowState,
) -> Result<u64> {
    let extracted = records.len() as u64;
    let transform_counts = |transformed: u64, rejected: u64| StageCounts {
        extracted,
        transformed,
        loaded: 0,
        rejected,
    };
    let loaded_counts = |loaded: u64| StageCounts {
        loaded,
        ..StageCounts::default()
    };

    match source {
        SourceName::Customers => {
            let t = transform::customers::transform(records, Utc::now().naive_utc());
            handle.record(transform_counts(
                t.cleaned.len() as u64,
                t.rejections.len() as u64,
            ));
            *state = state.advance();
            let result = loader.load_customers(&t.cleaned)?;
            handle.record(loaded_counts(result.total()));
            Ok(t.duplicates_removed)
        }
        SourceName::Reviews => {
            let t = transform::reviews::transform(records);
            let rollup = transform::reviews::rollup(&t.cleaned);
            handle.record(transform_counts(
                t.cleaned.len() as u64,
                t.rejections.len() as u64,
            ));
            *state = state.advance();
            loader.load_products(&rollup)?;
            // Every cleaned review is folded into a product row.
            handle.record(loaded_counts(t.cleaned.len() as u64));
            Ok(t.duplicates_removed)
        }
        SourceName::Orders => {
            let refs = warehouse.reference_keys()?;
            let t = transform::orders::transform(records, &refs);
            handle.record(transform_counts(
                t.cleaned.len() as u64,
                t.rejections.len() as u64,
            ));
            *state = state.advance();
            let result = loader.load_orders(&t.cleaned)?;
            handle.record(loaded_counts(result.inserted + result.skipped));
            Ok(t.duplicates_removed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut state = FlowState::Pending;
        let mut seen = vec![state];
        for _ in 0..4 {
            state = state.advance();
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                FlowState::Pending,
                FlowState::Extracting,
                FlowState::Transforming,
                FlowState::Loading,
                FlowState::Done(RunStatus::Success),
            ]
        );
    }

    #[test]
    fn done_is_absorbing() {
        let done = FlowState::Done(RunStatus::Partial);
        assert_eq!(done.advance(), done);
    }

    #[test]
    fn fail_jumps_from_any_stage() {
        assert_eq!(
            FlowState::Extracting.fail(),
            FlowState::Done(RunStatus::Failed)
        );
        assert_eq!(
            FlowState::Loading.fail(),
            FlowState::Done(RunStatus::Failed)
        );
    }
}
