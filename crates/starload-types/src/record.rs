//! Record types flowing through the pipeline.
//!
//! A [`RawRecord`] is an untyped map of source-native fields, owned by the
//! connector that produced it until handed to the transformer. The clean
//! record structs are the typed, validated output of the transformer and
//! are consumed exactly once by the loader.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// RawRecord
// ---------------------------------------------------------------------------

/// Untyped mapping of source-native fields for one order, customer, or
/// review. Field access is lenient: a missing key and an explicit JSON
/// null are both "absent".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub serde_json::Map<String, Value>);

impl RawRecord {
    #[must_use]
    pub fn new() -> Self {
        Self(serde_json::Map::new())
    }

    /// Insert a field, replacing any existing value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Whether the field is present with a non-null value. Distinguishes
    /// "absent, apply the default" from "present but malformed".
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// String field, trimmed. Empty-after-trim counts as absent.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Numeric field as f64. Accepts JSON numbers and numeric strings.
    #[must_use]
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Integer field as i64. Accepts JSON numbers and numeric strings.
    #[must_use]
    pub fn i64_field(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean field. Accepts JSON booleans and 0/1 integers.
    #[must_use]
    pub fn bool_field(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|i| i != 0),
            _ => None,
        }
    }

    /// Timestamp field. Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`,
    /// `YYYY-MM-DD HH:MM:SS`, and bare `YYYY-MM-DD` strings.
    #[must_use]
    pub fn datetime_field(&self, key: &str) -> Option<NaiveDateTime> {
        let raw = self.str_field(key)?;
        parse_datetime(raw)
    }
}

/// Coerce a source-native timestamp string to a naive UTC datetime.
#[must_use]
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ndt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ---------------------------------------------------------------------------
// Clean records
// ---------------------------------------------------------------------------

/// A validated, normalized order bound for `fact_orders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanOrder {
    pub order_id: String,
    pub customer_id: String,
    pub product_id: String,
    pub order_date: NaiveDateTime,
    pub quantity: i64,
    pub unit_price: f64,
    pub total_amount: f64,
    /// Uppercased (`COMPLETED`, `PENDING`, `CANCELLED`, `REFUNDED`).
    pub status: String,
    pub payment_method: String,
    pub shipping_address: Option<String>,
}

/// A validated, normalized customer bound for `dim_customers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanCustomer {
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    /// Lowercased and trimmed.
    pub email: String,
    /// `"N/A"` when the source had no phone on file.
    pub phone: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub signup_date: NaiveDateTime,
    /// One of `BRONZE`, `SILVER`, `GOLD`, `PLATINUM`.
    pub customer_tier: String,
    pub lifetime_value: f64,
    pub is_active: bool,
    /// Derived: days between signup and the transform run.
    pub account_age_days: i64,
}

/// A validated, normalized product review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanReview {
    pub review_id: String,
    pub product_id: String,
    pub customer_id: String,
    /// Clamped to 1..=5.
    pub rating: i64,
    pub review_text: String,
    pub review_date: NaiveDateTime,
    pub verified_purchase: bool,
    pub helpful_votes: i64,
    pub product_category: String,
    /// Derived from the clamped rating.
    pub sentiment: Sentiment,
}

/// Sentiment bucket derived from a 1-5 rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    /// Bucket a clamped rating: <=2 negative, 3 neutral, >=4 positive.
    #[must_use]
    pub fn from_rating(rating: i64) -> Self {
        match rating {
            i64::MIN..=2 => Self::Negative,
            3 => Self::Neutral,
            _ => Self::Positive,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Positive => "positive",
        }
    }
}

/// Per-product aggregate of cleaned reviews, bound for `dim_products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRollup {
    pub product_id: String,
    pub product_category: String,
    pub avg_rating: f64,
    pub total_reviews: u64,
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why a record was dropped by the transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// A required field with no safe default was absent.
    MissingField,
    /// A field failed coercion or violated a value rule.
    MalformedField,
    /// A referenced natural identifier was not in the reference snapshot.
    OrphanReference,
}

impl RejectReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingField => "MISSING_FIELD",
            Self::MalformedField => "MALFORMED_FIELD",
            Self::OrphanReference => "ORPHAN_REFERENCE",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dropped record, counted in the run's rejected total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Natural identifier of the offending record, if it had one.
    pub natural_id: Option<String>,
    pub reason: RejectReason,
    pub detail: String,
}

impl Rejection {
    #[must_use]
    pub fn new(natural_id: Option<String>, reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            natural_id,
            reason,
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reference snapshot
// ---------------------------------------------------------------------------

/// Immutable snapshot of known dimension natural keys, taken by the caller
/// before transforming fact-bound records. Passing it explicitly (rather
/// than reading shared state) keeps validation deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceKeys {
    pub customers: HashSet<String>,
    pub products: HashSet<String>,
}

impl ReferenceKeys {
    #[must_use]
    pub fn has_customer(&self, id: &str) -> bool {
        self.customers.contains(id)
    }

    #[must_use]
    pub fn has_product(&self, id: &str) -> bool {
        self.products.contains(id)
    }
}
