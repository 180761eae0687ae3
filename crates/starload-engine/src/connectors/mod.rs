//! Source connectors for the three operational stores.
//!
//! Each connector fetches one store's records either in full or
//! incrementally past a watermark. Connectors are independent: a failure
//! from one must not block the other two, so every failure is a typed
//! [`ConnectorError`] naming its source.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use starload_types::{ConnectorError, ExtractMode, RawRecord, SourceName};

pub mod customers;
pub mod memory;
pub mod orders;
pub mod reviews;

pub use customers::CustomersConnector;
pub use memory::MemorySource;
pub use orders::OrdersConnector;
pub use reviews::ReviewsConnector;

/// Fetches raw records from one operational store.
///
/// Output ordering is not guaranteed; downstream stages are
/// order-independent.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Which store this connector reads.
    fn source(&self) -> SourceName;

    /// Fetch records. In incremental mode only records whose cursor field
    /// exceeds `watermark` are returned; a `None` watermark means no prior
    /// run recorded one and the fetch falls back to a full read.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError`] if the store is unreachable or the
    /// requested mode is unsupported.
    async fn extract(
        &self,
        mode: ExtractMode,
        watermark: Option<NaiveDateTime>,
    ) -> Result<Vec<RawRecord>, ConnectorError>;
}

/// The monotonically increasing modification-timestamp field each source
/// exposes for incremental extraction.
#[must_use]
pub fn cursor_field(source: SourceName) -> &'static str {
    match source {
        SourceName::Orders => "order_date",
        SourceName::Customers => "signup_date",
        SourceName::Reviews => "review_date",
    }
}

/// Highest cursor value observed in a batch, used to advance the
/// watermark after a successful run.
#[must_use]
pub fn max_cursor(source: SourceName, records: &[RawRecord]) -> Option<NaiveDateTime> {
    let field = cursor_field(source);
    records
        .iter()
        .filter_map(|r| r.datetime_field(field))
        .max()
}
