//! MongoDB connector for the product review store.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Client;
use serde_json::Value;
use starload_types::{ConnectorError, ExtractMode, RawRecord, SourceName};

/// Review documents store `review_date` as an ISO-8601 string, so the
/// incremental filter is a lexicographic comparison.
const CURSOR_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// Reads reviews from MongoDB. The driver is async-native, so no
/// blocking-pool hop is needed.
pub struct ReviewsConnector {
    uri: String,
    database: String,
    collection: String,
}

impl ReviewsConnector {
    #[must_use]
    pub fn new(
        uri: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl super::SourceConnector for ReviewsConnector {
    fn source(&self) -> SourceName {
        SourceName::Reviews
    }

    async fn extract(
        &self,
        mode: ExtractMode,
        watermark: Option<NaiveDateTime>,
    ) -> Result<Vec<RawRecord>, ConnectorError> {
        let unavailable = |e: mongodb::error::Error| {
            ConnectorError::unavailable(SourceName::Reviews, e)
        };

        let client = Client::with_uri_str(&self.uri).await.map_err(unavailable)?;
        let coll = client
            .database(&self.database)
            .collection::<Document>(&self.collection);

        let filter = match (mode, watermark) {
            (ExtractMode::Incremental, Some(wm)) => {
                doc! { "review_date": { "$gt": wm.format(CURSOR_FMT).to_string() } }
            }
            _ => Document::new(),
        };

        let cursor = coll.find(filter, None).await.map_err(unavailable)?;
        let docs: Vec<Document> = cursor.try_collect().await.map_err(unavailable)?;

        tracing::debug!(rows = docs.len(), mode = %mode, "fetched reviews");

        Ok(docs.iter().map(document_to_record).collect())
    }
}

fn document_to_record(doc: &Document) -> RawRecord {
    let mut rec = RawRecord::new();
    for (key, value) in doc {
        if key == "_id" {
            continue;
        }
        if let Some(v) = bson_to_value(value) {
            rec.set(key, v);
        }
    }
    rec
}

/// Lossy mapping of scalar BSON values; unsupported shapes (nested
/// documents, arrays, binary) are dropped and surface downstream as
/// absent fields.
fn bson_to_value(bson: &Bson) -> Option<Value> {
    match bson {
        Bson::String(s) => Some(Value::String(s.clone())),
        Bson::Int32(i) => Some(Value::from(i64::from(*i))),
        Bson::Int64(i) => Some(Value::from(*i)),
        Bson::Double(f) => Some(Value::from(*f)),
        Bson::Boolean(b) => Some(Value::from(*b)),
        Bson::DateTime(dt) => dt.try_to_rfc3339_string().ok().map(Value::String),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_maps_scalars_and_skips_id() {
        let doc = doc! {
            "_id": mongodb::bson::oid::ObjectId::new(),
            "review_id": "R1",
            "rating": 4_i32,
            "helpful_votes": 12_i64,
            "verified_purchase": true,
            "score": 0.5,
            "nested": { "ignored": true },
        };
        let rec = document_to_record(&doc);
        assert_eq!(rec.str_field("review_id"), Some("R1"));
        assert_eq!(rec.i64_field("rating"), Some(4));
        assert_eq!(rec.i64_field("helpful_votes"), Some(12));
        assert_eq!(rec.bool_field("verified_purchase"), Some(true));
        assert_eq!(rec.f64_field("score"), Some(0.5));
        assert!(rec.str_field("_id").is_none());
        assert!(rec.str_field("nested").is_none());
    }

    #[test]
    fn bson_datetime_becomes_parseable_string() {
        let dt = mongodb::bson::DateTime::from_millis(1_709_290_800_000);
        let value = bson_to_value(&Bson::DateTime(dt)).unwrap();
        let s = value.as_str().unwrap();
        assert!(starload_types::record::parse_datetime(s).is_some(), "got: {s}");
    }
}
