//! Warehouse persistence for the starload ETL engine.
//!
//! Provides the [`Warehouse`] trait and a [`SqliteWarehouse`]
//! implementation holding the star schema: dimension tables keyed by
//! natural id with auto-assigned surrogate keys, append-only fact tables,
//! the per-run audit table, and per-source extraction watermarks.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod schema;
pub mod sqlite;

pub use backend::{InsertResult, UpsertResult, Warehouse};
pub use error::WarehouseError;
pub use sqlite::SqliteWarehouse;
