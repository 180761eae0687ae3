//! `SQLite`-backed implementation of [`Warehouse`].
//!
//! Uses a single `Mutex<Connection>` for thread safety; every mutating
//! method runs inside one transaction, which is the only mutual exclusion
//! the loader depends on. Dimension upserts are explicit compare-by-key
//! reconciliation (select, then update or insert) so inserted and updated
//! rows can be counted separately.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension};
use starload_types::{
    CleanCustomer, CleanOrder, DateDimRow, ExtractMode, ProductRollup, ReferenceKeys, RunRecord,
    RunStatus, SourceName, StageCounts,
};

use crate::backend::{InsertResult, UpsertResult, Warehouse};
use crate::error::{self, WarehouseError};
use crate::schema::CREATE_TABLES;

/// Watermark and timestamp storage format (UTC, no timezone suffix).
const DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

/// Non-terminal status stored while a run is in flight.
const STATUS_RUNNING: &str = "RUNNING";

/// `SQLite`-backed star-schema warehouse.
///
/// Create with [`SqliteWarehouse::open`] for file-backed persistence or
/// [`SqliteWarehouse::in_memory`] for tests.
pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

impl SqliteWarehouse {
    /// Open or create a warehouse database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Io`] if the directory can't be created,
    /// or [`WarehouseError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        tracing::debug!(path = %path.display(), "opened warehouse");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory warehouse (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlite`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| WarehouseError::LockPoisoned)
    }

    // -----------------------------------------------------------------------
    // Read surface (quality checks and tests)
    // -----------------------------------------------------------------------

    /// Total rows in `fact_orders`.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlite`] on query failure.
    pub fn count_order_facts(&self) -> error::Result<u64> {
        let conn = self.lock_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM fact_orders", [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    /// Sum of `total_amount` over order facts for one (date, product) pair.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlite`] on query failure.
    pub fn sum_order_amount(&self, date_key: i64, product_key: i64) -> error::Result<f64> {
        let conn = self.lock_conn()?;
        let sum: f64 = conn.query_row(
            "SELECT COALESCE(SUM(total_amount), 0.0) FROM fact_orders \
             WHERE date_key = ?1 AND product_key = ?2",
            [date_key, product_key],
            |row| row.get(0),
        )?;
        Ok(sum)
    }

    /// Revenue and order count from `fact_daily_sales` for one
    /// (date, product) pair, if aggregated.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlite`] on query failure.
    pub fn daily_sales_totals(
        &self,
        date_key: i64,
        product_key: i64,
    ) -> error::Result<Option<(f64, i64)>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT total_revenue, total_orders FROM fact_daily_sales \
                 WHERE date_key = ?1 AND product_key = ?2",
                [date_key, product_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    /// Surrogate key for a customer natural id, if present.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlite`] on query failure.
    pub fn customer_surrogate_key(&self, customer_id: &str) -> error::Result<Option<i64>> {
        let conn = self.lock_conn()?;
        let key = conn
            .query_row(
                "SELECT customer_key FROM dim_customers WHERE customer_id = ?1",
                [customer_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(key)
    }

    /// Current `lifetime_value` attribute for a customer, if present.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Sqlite`] on query failure.
    pub fn customer_lifetime_value(&self, customer_id: &str) -> error::Result<Option<f64>> {
        let conn = self.lock_conn()?;
        let ltv = conn
            .query_row(
                "SELECT lifetime_value FROM dim_customers WHERE customer_id = ?1",
                [customer_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ltv)
    }
}

impl Warehouse for SqliteWarehouse {
    fn upsert_customers(&self, rows: &[CleanCustomer]) -> error::Result<UpsertResult> {
        if rows.is_empty() {
            return Ok(UpsertResult::default());
        }
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut result = UpsertResult::default();
        {
            let mut select = tx.prepare(
                "SELECT customer_key FROM dim_customers WHERE customer_id = ?1",
            )?;
            let mut update = tx.prepare(
                "UPDATE dim_customers SET first_name = ?2, last_name = ?3, email = ?4, \
                 phone = ?5, city = ?6, state = ?7, country = ?8, customer_tier = ?9, \
                 lifetime_value = ?10, is_active = ?11, account_age_days = ?12, \
                 updated_at = datetime('now') \
                 WHERE customer_id = ?1",
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO dim_customers \
                 (customer_id, first_name, last_name, email, phone, city, state, country, \
                  customer_tier, lifetime_value, is_active, account_age_days) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;

            for row in rows {
                let params = rusqlite::params![
                    row.customer_id,
                    row.first_name,
                    row.last_name,
                    row.email,
                    row.phone,
                    row.city,
                    row.state,
                    row.country,
                    row.customer_tier,
                    row.lifetime_value,
                    row.is_active,
                    row.account_age_days,
                ];
                let existing: Option<i64> = select
                    .query_row([&row.customer_id], |r| r.get(0))
                    .optional()?;
                if existing.is_some() {
                    update.execute(params)?;
                    result.updated += 1;
                } else {
                    insert.execute(params)?;
                    result.inserted += 1;
                }
            }
        }
        tx.commit()?;
        Ok(result)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn upsert_products(&self, rows: &[ProductRollup]) -> error::Result<UpsertResult> {
        if rows.is_empty() {
            return Ok(UpsertResult::default());
        }
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut result = UpsertResult::default();
        {
            let mut select =
                tx.prepare("SELECT product_key FROM dim_products WHERE product_id = ?1")?;
            let mut update = tx.prepare(
                "UPDATE dim_products SET product_category = ?2, avg_rating = ?3, \
                 total_reviews = ?4, updated_at = datetime('now') \
                 WHERE product_id = ?1",
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO dim_products (product_id, product_category, avg_rating, total_reviews) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for row in rows {
                let params = rusqlite::params![
                    row.product_id,
                    row.product_category,
                    row.avg_rating,
                    row.total_reviews as i64,
                ];
                let existing: Option<i64> = select
                    .query_row([&row.product_id], |r| r.get(0))
                    .optional()?;
                if existing.is_some() {
                    update.execute(params)?;
                    result.updated += 1;
                } else {
                    insert.execute(params)?;
                    result.inserted += 1;
                }
            }
        }
        tx.commit()?;
        Ok(result)
    }

    fn populate_dates(&self, rows: &[DateDimRow]) -> error::Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut inserted = 0u64;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO dim_date \
                 (date_key, full_date, day_of_week, day_name, month, month_name, \
                  quarter, year, is_weekend) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for row in rows {
                let changed = stmt.execute(rusqlite::params![
                    row.date_key,
                    row.full_date.format(DATE_FMT).to_string(),
                    row.day_of_week,
                    row.day_name,
                    row.month,
                    row.month_name,
                    row.quarter,
                    row.year,
                    row.is_weekend,
                ])?;
                inserted += changed as u64;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn insert_order_facts(&self, rows: &[CleanOrder]) -> error::Result<InsertResult> {
        if rows.is_empty() {
            return Ok(InsertResult::default());
        }
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut result = InsertResult::default();
        {
            let mut customer_key =
                tx.prepare("SELECT customer_key FROM dim_customers WHERE customer_id = ?1")?;
            let mut product_key =
                tx.prepare("SELECT product_key FROM dim_products WHERE product_id = ?1")?;
            let mut date_insert = tx.prepare(
                "INSERT OR IGNORE INTO dim_date \
                 (date_key, full_date, day_of_week, day_name, month, month_name, \
                  quarter, year, is_weekend) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            let mut fact_insert = tx.prepare(
                "INSERT OR IGNORE INTO fact_orders \
                 (order_id, customer_key, product_key, date_key, quantity, unit_price, \
                  total_amount, status, payment_method) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for order in rows {
                let ckey: Option<i64> = customer_key
                    .query_row([&order.customer_id], |r| r.get(0))
                    .optional()?;
                let Some(ckey) = ckey else {
                    return Err(WarehouseError::UnresolvedKey {
                        dimension: "dim_customers",
                        natural_id: order.customer_id.clone(),
                        fact_id: order.order_id.clone(),
                    });
                };
                let pkey: Option<i64> = product_key
                    .query_row([&order.product_id], |r| r.get(0))
                    .optional()?;
                let Some(pkey) = pkey else {
                    return Err(WarehouseError::UnresolvedKey {
                        dimension: "dim_products",
                        natural_id: order.product_id.clone(),
                        fact_id: order.order_id.clone(),
                    });
                };

                // Same calendar date always encodes to the same key, so the
                // dimension row can be synthesized without a lookup.
                let dim = DateDimRow::for_date(order.order_date.date());
                date_insert.execute(rusqlite::params![
                    dim.date_key,
                    dim.full_date.format(DATE_FMT).to_string(),
                    dim.day_of_week,
                    dim.day_name,
                    dim.month,
                    dim.month_name,
                    dim.quarter,
                    dim.year,
                    dim.is_weekend,
                ])?;

                let changed = fact_insert.execute(rusqlite::params![
                    order.order_id,
                    ckey,
                    pkey,
                    dim.date_key,
                    order.quantity,
                    order.unit_price,
                    order.total_amount,
                    order.status,
                    order.payment_method,
                ])?;
                if changed > 0 {
                    result.inserted += 1;
                } else {
                    result.skipped += 1;
                }
            }
        }
        tx.commit()?;
        Ok(result)
    }

    fn rebuild_daily_sales(&self) -> error::Result<u64> {
        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM fact_daily_sales", [])?;
        let written = tx.execute(
            "INSERT INTO fact_daily_sales \
             (date_key, product_key, total_revenue, total_orders, avg_order_value, \
              cancelled_orders, refunded_amount) \
             SELECT date_key, product_key, SUM(total_amount), COUNT(*), AVG(total_amount), \
                    SUM(CASE WHEN status = 'CANCELLED' THEN 1 ELSE 0 END), \
                    SUM(CASE WHEN status = 'REFUNDED' THEN total_amount ELSE 0.0 END) \
             FROM fact_orders \
             GROUP BY date_key, product_key",
            [],
        )?;
        tx.commit()?;
        Ok(written as u64)
    }

    fn reference_keys(&self) -> error::Result<ReferenceKeys> {
        let conn = self.lock_conn()?;
        let mut customers = HashSet::new();
        let mut stmt = conn.prepare("SELECT customer_id FROM dim_customers")?;
        let ids = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for id in ids {
            customers.insert(id?);
        }
        let mut products = HashSet::new();
        let mut stmt = conn.prepare("SELECT product_id FROM dim_products")?;
        let ids = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for id in ids {
            products.insert(id?);
        }
        Ok(ReferenceKeys {
            customers,
            products,
        })
    }

    fn start_run(&self, source: SourceName, mode: ExtractMode) -> error::Result<i64> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO etl_runs (source, mode, status) VALUES (?1, ?2, ?3)",
            rusqlite::params![source.as_str(), mode.as_str(), STATUS_RUNNING],
        )?;
        Ok(conn.last_insert_rowid())
    }

    #[allow(clippy::cast_possible_wrap)]
    fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        counts: &StageCounts,
        error: Option<&str>,
    ) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE etl_runs SET status = ?1, finished_at = datetime('now'), \
             records_extracted = ?2, records_transformed = ?3, records_loaded = ?4, \
             records_rejected = ?5, error_message = ?6 \
             WHERE id = ?7",
            rusqlite::params![
                status.as_str(),
                counts.extracted as i64,
                counts.transformed as i64,
                counts.loaded as i64,
                counts.rejected as i64,
                error,
                run_id,
            ],
        )?;
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    fn recent_runs(&self, limit: u32) -> error::Result<Vec<RunRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, source, mode, status, records_extracted, records_transformed, \
                    records_loaded, records_rejected, started_at, finished_at, error_message \
             FROM etl_runs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok(RunRecord {
                id: row.get(0)?,
                source: row.get(1)?,
                mode: row.get(2)?,
                status: row.get(3)?,
                counts: StageCounts {
                    extracted: row.get::<_, i64>(4)? as u64,
                    transformed: row.get::<_, i64>(5)? as u64,
                    loaded: row.get::<_, i64>(6)? as u64,
                    rejected: row.get::<_, i64>(7)? as u64,
                },
                started_at: row.get(8)?,
                finished_at: row.get(9)?,
                error_message: row.get(10)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn get_watermark(&self, source: SourceName) -> error::Result<Option<NaiveDateTime>> {
        let conn = self.lock_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT watermark FROM watermarks WHERE source = ?1",
                [source.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FMT).ok()))
    }

    fn set_watermark(&self, source: SourceName, value: NaiveDateTime) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO watermarks (source, watermark, updated_at) \
             VALUES (?1, ?2, datetime('now')) \
             ON CONFLICT(source) \
             DO UPDATE SET watermark = ?2, updated_at = datetime('now')",
            rusqlite::params![source.as_str(), value.format(DATETIME_FMT).to_string()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn customer(id: &str, ltv: f64) -> CleanCustomer {
        CleanCustomer {
            customer_id: id.to_string(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "N/A".into(),
            city: "London".into(),
            state: "LDN".into(),
            country: "UK".into(),
            signup_date: datetime(2023, 6, 1),
            customer_tier: "GOLD".into(),
            lifetime_value: ltv,
            is_active: true,
            account_age_days: 300,
        }
    }

    fn product(id: &str) -> ProductRollup {
        ProductRollup {
            product_id: id.to_string(),
            product_category: "Electronics".into(),
            avg_rating: 4.2,
            total_reviews: 17,
        }
    }

    fn order(id: &str, customer: &str, prod: &str, amount: f64, status: &str) -> CleanOrder {
        CleanOrder {
            order_id: id.to_string(),
            customer_id: customer.to_string(),
            product_id: prod.to_string(),
            order_date: datetime(2024, 3, 1),
            quantity: 2,
            unit_price: amount / 2.0,
            total_amount: amount,
            status: status.to_string(),
            payment_method: "CREDIT_CARD".into(),
            shipping_address: None,
        }
    }

    fn datetime(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn customer_upsert_is_idempotent() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        let rows = vec![customer("C1", 100.0), customer("C2", 200.0)];

        let first = wh.upsert_customers(&rows).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.updated, 0);
        let key_before = wh.customer_surrogate_key("C1").unwrap().unwrap();

        let second = wh.upsert_customers(&rows).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 2);
        let key_after = wh.customer_surrogate_key("C1").unwrap().unwrap();
        assert_eq!(key_before, key_after);
    }

    #[test]
    fn customer_update_replaces_attributes_keeps_key() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.upsert_customers(&[customer("C100", 100.0)]).unwrap();
        let key = wh.customer_surrogate_key("C100").unwrap().unwrap();

        let result = wh.upsert_customers(&[customer("C100", 999.0)]).unwrap();
        assert_eq!(result.inserted, 0);
        assert_eq!(result.updated, 1);
        assert_eq!(wh.customer_surrogate_key("C100").unwrap().unwrap(), key);
        assert_eq!(wh.customer_lifetime_value("C100").unwrap(), Some(999.0));
    }

    #[test]
    fn product_upsert_counts() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        let first = wh.upsert_products(&[product("P1"), product("P2")]).unwrap();
        assert_eq!(first.inserted, 2);
        let second = wh.upsert_products(&[product("P1")]).unwrap();
        assert_eq!(second.updated, 1);
        assert_eq!(second.inserted, 0);
    }

    #[test]
    fn empty_batches_are_noops() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        assert_eq!(wh.upsert_customers(&[]).unwrap(), UpsertResult::default());
        assert_eq!(wh.insert_order_facts(&[]).unwrap(), InsertResult::default());
        assert_eq!(wh.populate_dates(&[]).unwrap(), 0);
    }

    #[test]
    fn populate_dates_skips_existing() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        let rows: Vec<DateDimRow> = (1..=3)
            .map(|d| DateDimRow::for_date(NaiveDate::from_ymd_opt(2024, 3, d).unwrap()))
            .collect();
        assert_eq!(wh.populate_dates(&rows).unwrap(), 3);
        assert_eq!(wh.populate_dates(&rows).unwrap(), 0);
    }

    #[test]
    fn fact_insert_is_insert_if_absent() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.upsert_customers(&[customer("C1", 10.0)]).unwrap();
        wh.upsert_products(&[product("P1")]).unwrap();

        let orders = vec![
            order("O1", "C1", "P1", 50.0, "COMPLETED"),
            order("O2", "C1", "P1", 30.0, "COMPLETED"),
        ];
        let first = wh.insert_order_facts(&orders).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.skipped, 0);

        let second = wh.insert_order_facts(&orders).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(wh.count_order_facts().unwrap(), 2);
    }

    #[test]
    fn fact_insert_synthesizes_date_dimension() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.upsert_customers(&[customer("C1", 10.0)]).unwrap();
        wh.upsert_products(&[product("P1")]).unwrap();
        wh.insert_order_facts(&[order("O1", "C1", "P1", 50.0, "COMPLETED")])
            .unwrap();

        // Re-populating the same date should find it already present.
        let row = DateDimRow::for_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(wh.populate_dates(&[row]).unwrap(), 0);
    }

    #[test]
    fn orphan_fact_fails_whole_batch() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.upsert_customers(&[customer("C1", 10.0)]).unwrap();
        wh.upsert_products(&[product("P1")]).unwrap();

        let batch = vec![
            order("O1", "C1", "P1", 50.0, "COMPLETED"),
            order("O2", "C1", "P999", 30.0, "COMPLETED"),
        ];
        let err = wh.insert_order_facts(&batch).unwrap_err();
        assert!(matches!(err, WarehouseError::UnresolvedKey { .. }));
        // Rolled back: nothing persisted from the failed batch.
        assert_eq!(wh.count_order_facts().unwrap(), 0);
    }

    #[test]
    fn daily_sales_reconciles_with_order_facts() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.upsert_customers(&[customer("C1", 10.0)]).unwrap();
        wh.upsert_products(&[product("P1")]).unwrap();
        wh.insert_order_facts(&[
            order("O1", "C1", "P1", 50.0, "COMPLETED"),
            order("O2", "C1", "P1", 30.0, "CANCELLED"),
            order("O3", "C1", "P1", 20.0, "REFUNDED"),
        ])
        .unwrap();

        let written = wh.rebuild_daily_sales().unwrap();
        assert_eq!(written, 1);

        let pkey = 1;
        let (revenue, orders) = wh.daily_sales_totals(20_240_301, pkey).unwrap().unwrap();
        assert_eq!(orders, 3);
        let underlying = wh.sum_order_amount(20_240_301, pkey).unwrap();
        assert!((revenue - underlying).abs() < f64::EPSILON);
        assert!((revenue - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn daily_sales_rebuild_is_a_recompute() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.upsert_customers(&[customer("C1", 10.0)]).unwrap();
        wh.upsert_products(&[product("P1")]).unwrap();
        wh.insert_order_facts(&[order("O1", "C1", "P1", 50.0, "COMPLETED")])
            .unwrap();
        wh.rebuild_daily_sales().unwrap();

        wh.insert_order_facts(&[order("O2", "C1", "P1", 25.0, "COMPLETED")])
            .unwrap();
        wh.rebuild_daily_sales().unwrap();

        let (revenue, orders) = wh.daily_sales_totals(20_240_301, 1).unwrap().unwrap();
        assert_eq!(orders, 2);
        assert!((revenue - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reference_keys_snapshot() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.upsert_customers(&[customer("C1", 10.0)]).unwrap();
        wh.upsert_products(&[product("P1")]).unwrap();

        let keys = wh.reference_keys().unwrap();
        assert!(keys.has_customer("C1"));
        assert!(keys.has_product("P1"));
        assert!(!keys.has_product("P999"));
    }

    #[test]
    fn run_lifecycle() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        let run_id = wh
            .start_run(SourceName::Orders, ExtractMode::Full)
            .unwrap();
        assert!(run_id > 0);

        wh.finish_run(
            run_id,
            RunStatus::Partial,
            &StageCounts {
                extracted: 100,
                transformed: 97,
                loaded: 97,
                rejected: 3,
            },
            None,
        )
        .unwrap();

        let runs = wh.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].source, "orders");
        assert_eq!(runs[0].status, "PARTIAL");
        assert_eq!(runs[0].counts.rejected, 3);
        assert!(runs[0].finished_at.is_some());
    }

    #[test]
    fn failed_run_captures_error_verbatim() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        let run_id = wh
            .start_run(SourceName::Reviews, ExtractMode::Incremental)
            .unwrap();
        wh.finish_run(
            run_id,
            RunStatus::Failed,
            &StageCounts::default(),
            Some("source 'reviews' unavailable: connection refused"),
        )
        .unwrap();

        let runs = wh.recent_runs(1).unwrap();
        assert_eq!(runs[0].status, "FAILED");
        assert_eq!(
            runs[0].error_message.as_deref(),
            Some("source 'reviews' unavailable: connection refused")
        );
    }

    #[test]
    fn recent_runs_newest_first() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        let r1 = wh
            .start_run(SourceName::Orders, ExtractMode::Full)
            .unwrap();
        let r2 = wh
            .start_run(SourceName::Customers, ExtractMode::Full)
            .unwrap();
        assert!(r2 > r1);
        let runs = wh.recent_runs(10).unwrap();
        assert_eq!(runs[0].id, r2);
        assert_eq!(runs[1].id, r1);
    }

    #[test]
    fn watermark_roundtrip_and_upsert() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        assert!(wh.get_watermark(SourceName::Orders).unwrap().is_none());

        wh.set_watermark(SourceName::Orders, datetime(2024, 3, 1))
            .unwrap();
        assert_eq!(
            wh.get_watermark(SourceName::Orders).unwrap(),
            Some(datetime(2024, 3, 1))
        );

        wh.set_watermark(SourceName::Orders, datetime(2024, 4, 2))
            .unwrap();
        assert_eq!(
            wh.get_watermark(SourceName::Orders).unwrap(),
            Some(datetime(2024, 4, 2))
        );

        // Sources are independent.
        assert!(wh.get_watermark(SourceName::Reviews).unwrap().is_none());
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/warehouse.db");
        let wh = SqliteWarehouse::open(&path).unwrap();
        wh.start_run(SourceName::Orders, ExtractMode::Full).unwrap();
        assert!(path.exists());
    }
}
