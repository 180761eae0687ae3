//! Warehouse trait definition.
//!
//! [`Warehouse`] defines the storage contract the loader reconciles
//! against: compare-by-key upserts for dimensions, insert-if-absent for
//! facts, run audit rows, and extraction watermarks. The contract is
//! expressed in terms of natural keys so it is implementable against any
//! relational or document store; surrogate-key assignment is internal.

use chrono::NaiveDateTime;
use starload_types::{
    CleanCustomer, CleanOrder, DateDimRow, ExtractMode, ProductRollup, ReferenceKeys, RunRecord,
    RunStatus, SourceName, StageCounts,
};

use crate::error;

/// Outcome of a dimension upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertResult {
    /// Rows that did not exist and were inserted with a fresh surrogate key.
    pub inserted: u64,
    /// Rows whose natural id existed; attributes replaced, key unchanged.
    pub updated: u64,
}

impl UpsertResult {
    #[must_use]
    pub fn total(self) -> u64 {
        self.inserted + self.updated
    }
}

/// Outcome of a fact insert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertResult {
    pub inserted: u64,
    /// Rows skipped because their natural id was already loaded. Not an
    /// error: facts are immutable, so a re-run simply skips.
    pub skipped: u64,
}

/// Storage contract for the analytical warehouse.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn Warehouse>`.
/// Every mutating method is atomic per call, which is the only mutual
/// exclusion the loader relies on.
pub trait Warehouse: Send + Sync {
    /// Upsert customer dimension rows keyed by `customer_id`.
    ///
    /// Idempotent: re-running with identical input yields the same
    /// surrogate keys and zero additional inserts.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn upsert_customers(&self, rows: &[CleanCustomer]) -> error::Result<UpsertResult>;

    /// Upsert product dimension rows keyed by `product_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn upsert_products(&self, rows: &[ProductRollup]) -> error::Result<UpsertResult>;

    /// Insert date dimension rows, skipping dates already present.
    /// Returns the count actually inserted.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn populate_dates(&self, rows: &[DateDimRow]) -> error::Result<u64>;

    /// Insert order facts with insert-if-absent semantics on `order_id`.
    ///
    /// Resolves each fact's surrogate keys from the current dimension
    /// state and synthesizes any missing date dimension rows. A fact whose
    /// customer or product cannot be resolved fails the whole batch with
    /// [`WarehouseError::UnresolvedKey`](crate::WarehouseError::UnresolvedKey):
    /// no orphan fact is ever persisted.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure
    /// or an unresolved dimension reference.
    fn insert_order_facts(&self, rows: &[CleanOrder]) -> error::Result<InsertResult>;

    /// Recompute `fact_daily_sales` from `fact_orders`, grouping by
    /// (date, product) and folding revenue, order count, cancellations,
    /// and refunds. Returns the number of aggregate rows written.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn rebuild_daily_sales(&self) -> error::Result<u64>;

    /// Snapshot of all known dimension natural keys, for the transformer's
    /// referential-integrity gate.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn reference_keys(&self) -> error::Result<ReferenceKeys>;

    /// Create the audit row for a new run, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn start_run(&self, source: SourceName, mode: ExtractMode) -> error::Result<i64>;

    /// Finalize a run's audit row with terminal status and stage counts.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        counts: &StageCounts,
        error: Option<&str>,
    ) -> error::Result<()>;

    /// Most recent audit rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn recent_runs(&self, limit: u32) -> error::Result<Vec<RunRecord>>;

    /// Read the extraction watermark for a source, if one has been set.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn get_watermark(&self, source: SourceName) -> error::Result<Option<NaiveDateTime>>;

    /// Upsert the extraction watermark for a source.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn set_watermark(&self, source: SourceName, value: NaiveDateTime) -> error::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (can be used as `dyn Warehouse`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn Warehouse) {}
    }

    #[test]
    fn upsert_result_total() {
        let r = UpsertResult {
            inserted: 3,
            updated: 4,
        };
        assert_eq!(r.total(), 7);
    }
}
