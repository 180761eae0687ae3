//! Star-schema DDL.
//!
//! Dimensions carry a natural id (unique) plus an auto-assigned surrogate
//! key; facts reference dimensions by surrogate key only and are
//! unique-constrained on their own natural id. All statements are
//! idempotent so opening a warehouse is always safe.

/// Idempotent DDL for all warehouse tables.
pub const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS dim_customers (
    customer_key     INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_id      TEXT NOT NULL UNIQUE,
    first_name       TEXT NOT NULL,
    last_name        TEXT NOT NULL,
    email            TEXT NOT NULL,
    phone            TEXT NOT NULL,
    city             TEXT NOT NULL,
    state            TEXT NOT NULL,
    country          TEXT NOT NULL,
    customer_tier    TEXT NOT NULL,
    lifetime_value   REAL NOT NULL,
    is_active        INTEGER NOT NULL,
    account_age_days INTEGER NOT NULL,
    updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS dim_products (
    product_key      INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id       TEXT NOT NULL UNIQUE,
    product_category TEXT NOT NULL,
    avg_rating       REAL NOT NULL,
    total_reviews    INTEGER NOT NULL,
    updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS dim_date (
    date_key    INTEGER PRIMARY KEY,
    full_date   TEXT NOT NULL,
    day_of_week INTEGER NOT NULL,
    day_name    TEXT NOT NULL,
    month       INTEGER NOT NULL,
    month_name  TEXT NOT NULL,
    quarter     INTEGER NOT NULL,
    year        INTEGER NOT NULL,
    is_weekend  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS fact_orders (
    order_key      INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id       TEXT NOT NULL UNIQUE,
    customer_key   INTEGER NOT NULL REFERENCES dim_customers(customer_key),
    product_key    INTEGER NOT NULL REFERENCES dim_products(product_key),
    date_key       INTEGER NOT NULL REFERENCES dim_date(date_key),
    quantity       INTEGER NOT NULL,
    unit_price     REAL NOT NULL,
    total_amount   REAL NOT NULL,
    status         TEXT NOT NULL,
    payment_method TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fact_orders_date_product
    ON fact_orders (date_key, product_key);

CREATE TABLE IF NOT EXISTS fact_daily_sales (
    date_key         INTEGER NOT NULL REFERENCES dim_date(date_key),
    product_key      INTEGER NOT NULL REFERENCES dim_products(product_key),
    total_revenue    REAL NOT NULL,
    total_orders     INTEGER NOT NULL,
    avg_order_value  REAL NOT NULL,
    cancelled_orders INTEGER NOT NULL,
    refunded_amount  REAL NOT NULL,
    PRIMARY KEY (date_key, product_key)
);

CREATE TABLE IF NOT EXISTS etl_runs (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    source              TEXT NOT NULL,
    mode                TEXT NOT NULL,
    status              TEXT NOT NULL,
    records_extracted   INTEGER NOT NULL DEFAULT 0,
    records_transformed INTEGER NOT NULL DEFAULT 0,
    records_loaded      INTEGER NOT NULL DEFAULT 0,
    records_rejected    INTEGER NOT NULL DEFAULT 0,
    started_at          TEXT NOT NULL DEFAULT (datetime('now')),
    finished_at         TEXT,
    error_message       TEXT
);

CREATE TABLE IF NOT EXISTS watermarks (
    source     TEXT PRIMARY KEY,
    watermark  TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";
