//! Chunked loading of clean batches into the warehouse.
//!
//! The warehouse contract is per-call atomic; the loader's job is to feed
//! it fixed-size chunks so peak memory stays bounded on large extracts,
//! and to fold the per-chunk results into one total.

use std::sync::Arc;

use starload_types::{CleanCustomer, CleanOrder, ProductRollup};
use starload_warehouse::{InsertResult, UpsertResult, Warehouse};

use crate::errors::Result;

pub struct Loader {
    warehouse: Arc<dyn Warehouse>,
    batch_size: usize,
}

impl Loader {
    #[must_use]
    pub fn new(warehouse: Arc<dyn Warehouse>, batch_size: usize) -> Self {
        Self {
            warehouse,
            batch_size: batch_size.max(1),
        }
    }

    /// Upsert customer dimension rows in chunks.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`PipelineError`](crate::PipelineError) if the
    /// warehouse rejects a chunk.
    pub fn load_customers(&self, rows: &[CleanCustomer]) -> Result<UpsertResult> {
        let mut total = UpsertResult::default();
        for chunk in rows.chunks(self.batch_size) {
            let result = self.warehouse.upsert_customers(chunk)?;
            tracing::debug!(
                inserted = result.inserted,
                updated = result.updated,
                "loaded customer chunk"
            );
            total.inserted += result.inserted;
            total.updated += result.updated;
        }
        Ok(total)
    }

    /// Upsert product dimension rows in chunks.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`PipelineError`](crate::PipelineError) if the
    /// warehouse rejects a chunk.
    pub fn load_products(&self, rows: &[ProductRollup]) -> Result<UpsertResult> {
        let mut total = UpsertResult::default();
        for chunk in rows.chunks(self.batch_size) {
            let result = self.warehouse.upsert_products(chunk)?;
            total.inserted += result.inserted;
            total.updated += result.updated;
        }
        Ok(total)
    }

    /// Append order facts in chunks with insert-if-absent semantics.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`PipelineError`](crate::PipelineError) if the
    /// warehouse rejects a chunk or a surrogate key fails to resolve.
    pub fn load_orders(&self, rows: &[CleanOrder]) -> Result<InsertResult> {
        let mut total = InsertResult::default();
        for chunk in rows.chunks(self.batch_size) {
            let result = self.warehouse.insert_order_facts(chunk)?;
            tracing::debug!(
                inserted = result.inserted,
                skipped = result.skipped,
                "loaded order chunk"
            );
            total.inserted += result.inserted;
            total.skipped += result.skipped;
        }
        Ok(total)
    }

    /// Recompute the daily sales aggregate from the loaded facts.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`PipelineError`](crate::PipelineError) if the
    /// rebuild fails.
    pub fn rebuild_daily_sales(&self) -> Result<u64> {
        let rows = self.warehouse.rebuild_daily_sales()?;
        tracing::info!(rows, "rebuilt daily sales aggregate");
        Ok(rows)
    }
}
