//! Shared data model for the starload ETL engine.
//!
//! Pure data types used by the engine, warehouse, and CLI crates. Kept in
//! a leaf crate so storage and orchestration can share them without
//! circular dependencies.

#![warn(clippy::pedantic)]

pub mod datekey;
pub mod error;
pub mod record;
pub mod run;

pub use datekey::{date_key, DateDimRow};
pub use error::ConnectorError;
pub use record::{
    CleanCustomer, CleanOrder, CleanReview, ProductRollup, RawRecord, ReferenceKeys,
    RejectReason, Rejection, Sentiment,
};
pub use run::{ExtractMode, RunRecord, RunStatus, SourceName, StageCounts};
