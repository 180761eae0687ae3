//! In-memory source connector for tests and offline runs.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use starload_types::{ConnectorError, ExtractMode, RawRecord, SourceName};

use super::cursor_field;

/// Serves a fixed batch of records from memory. Honors incremental
/// filtering against the source's cursor field and can simulate an
/// unreachable, slow, or cursor-less source.
pub struct MemorySource {
    source: SourceName,
    records: Vec<RawRecord>,
    supports_incremental: bool,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl MemorySource {
    #[must_use]
    pub fn new(source: SourceName, records: Vec<RawRecord>) -> Self {
        Self {
            source,
            records,
            supports_incremental: true,
            failure: None,
            delay: None,
        }
    }

    /// A source that fails every extraction with `Unavailable`.
    #[must_use]
    pub fn failing(source: SourceName, reason: impl Into<String>) -> Self {
        Self {
            source,
            records: Vec::new(),
            supports_incremental: true,
            failure: Some(reason.into()),
            delay: None,
        }
    }

    /// Simulate a source with no modification-timestamp column.
    #[must_use]
    pub fn without_incremental(mut self) -> Self {
        self.supports_incremental = false;
        self
    }

    /// Simulate a slow store by sleeping before the batch is returned.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl super::SourceConnector for MemorySource {
    fn source(&self) -> SourceName {
        self.source
    }

    async fn extract(
        &self,
        mode: ExtractMode,
        watermark: Option<NaiveDateTime>,
    ) -> Result<Vec<RawRecord>, ConnectorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.failure {
            return Err(ConnectorError::Unavailable {
                source_name: self.source,
                reason: reason.clone(),
            });
        }
        if mode == ExtractMode::Incremental && !self.supports_incremental {
            return Err(ConnectorError::UnsupportedMode {
                source_name: self.source,
            });
        }

        let records = match (mode, watermark) {
            (ExtractMode::Incremental, Some(wm)) => {
                let field = cursor_field(self.source);
                self.records
                    .iter()
                    .filter(|r| r.datetime_field(field).is_some_and(|ts| ts > wm))
                    .cloned()
                    .collect()
            }
            _ => self.records.clone(),
        };
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::SourceConnector;
    use chrono::NaiveDate;
    use serde_json::json;

    fn order(id: &str, date: &str) -> RawRecord {
        let mut r = RawRecord::new();
        r.set("order_id", json!(id));
        r.set("order_date", json!(date));
        r
    }

    #[tokio::test]
    async fn full_mode_returns_everything() {
        let src = MemorySource::new(
            SourceName::Orders,
            vec![order("O1", "2024-03-01T10:00:00"), order("O2", "2024-03-05T10:00:00")],
        );
        let out = src.extract(ExtractMode::Full, None).await.unwrap();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn incremental_filters_past_watermark() {
        let src = MemorySource::new(
            SourceName::Orders,
            vec![order("O1", "2024-03-01T10:00:00"), order("O2", "2024-03-05T10:00:00")],
        );
        let wm = NaiveDate::from_ymd_opt(2024, 3, 3)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let out = src
            .extract(ExtractMode::Incremental, Some(wm))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].str_field("order_id"), Some("O2"));
    }

    #[tokio::test]
    async fn incremental_without_watermark_is_full_read() {
        let src = MemorySource::new(
            SourceName::Orders,
            vec![order("O1", "2024-03-01T10:00:00")],
        );
        let out = src.extract(ExtractMode::Incremental, None).await.unwrap();
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn cursorless_source_rejects_incremental() {
        let src = MemorySource::new(SourceName::Reviews, vec![]).without_incremental();
        let err = src
            .extract(ExtractMode::Incremental, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::UnsupportedMode { .. }));
        // Full mode still works.
        assert!(src.extract(ExtractMode::Full, None).await.is_ok());
    }

    #[tokio::test]
    async fn failing_source_is_unavailable() {
        let src = MemorySource::failing(SourceName::Customers, "connection refused");
        let err = src.extract(ExtractMode::Full, None).await.unwrap_err();
        assert_eq!(err.source(), SourceName::Customers);
        assert!(err.to_string().contains("connection refused"));
    }
}
