//! Batch transformation: dedupe, null handling, normalization, and
//! referential integrity.
//!
//! Each source has its own transform function producing typed clean
//! records plus a rejection list. Checks run per record and short-circuit
//! on the first failure for that record only; one record's rejection never
//! affects its siblings.

use std::collections::HashMap;

use starload_types::{RawRecord, Rejection};

pub mod customers;
pub mod orders;
pub mod reviews;

/// Output of one transform pass over an extracted batch.
///
/// Invariant: `input_len == cleaned.len() + rejections.len() +
/// duplicates_removed`, so every extracted record is accounted for.
#[derive(Debug, Clone)]
pub struct Transformed<T> {
    pub cleaned: Vec<T>,
    pub rejections: Vec<Rejection>,
    /// Records collapsed into a surviving sibling during dedupe.
    pub duplicates_removed: u64,
}

impl<T> Default for Transformed<T> {
    fn default() -> Self {
        Self {
            cleaned: Vec::new(),
            rejections: Vec::new(),
            duplicates_removed: 0,
        }
    }
}

/// Collapse records sharing a natural identifier to the most recently
/// modified one; ties (including both-missing timestamps) break toward
/// the later arrival. Records without an identifier pass through
/// untouched and are left for the null-handling check to reject.
pub(crate) fn dedupe_latest(
    records: &[RawRecord],
    id_field: &str,
    ts_field: &str,
) -> (Vec<RawRecord>, u64) {
    let mut kept: Vec<RawRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut removed = 0u64;

    for rec in records {
        let Some(id) = rec.str_field(id_field).map(str::to_owned) else {
            kept.push(rec.clone());
            continue;
        };
        match index.get(&id) {
            Some(&slot) => {
                removed += 1;
                // Option ordering puts a missing timestamp earliest, and
                // >= keeps the later arrival on exact ties.
                if rec.datetime_field(ts_field) >= kept[slot].datetime_field(ts_field) {
                    kept[slot] = rec.clone();
                }
            }
            None => {
                index.insert(id, kept.len());
                kept.push(rec.clone());
            }
        }
    }
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: Option<&str>, ts: Option<&str>, value: f64) -> RawRecord {
        let mut r = RawRecord::new();
        if let Some(id) = id {
            r.set("customer_id", json!(id));
        }
        if let Some(ts) = ts {
            r.set("signup_date", json!(ts));
        }
        r.set("lifetime_value", json!(value));
        r
    }

    #[test]
    fn later_timestamp_wins() {
        let batch = vec![
            rec(Some("C100"), Some("2024-03-02T00:00:00"), 2.0),
            rec(Some("C100"), Some("2024-03-01T00:00:00"), 1.0),
        ];
        let (kept, removed) = dedupe_latest(&batch, "customer_id", "signup_date");
        assert_eq!(kept.len(), 1);
        assert_eq!(removed, 1);
        assert_eq!(kept[0].f64_field("lifetime_value"), Some(2.0));
    }

    #[test]
    fn tie_breaks_toward_last_arrival() {
        let batch = vec![
            rec(Some("C100"), Some("2024-03-01T00:00:00"), 1.0),
            rec(Some("C100"), Some("2024-03-01T00:00:00"), 2.0),
        ];
        let (kept, _) = dedupe_latest(&batch, "customer_id", "signup_date");
        assert_eq!(kept[0].f64_field("lifetime_value"), Some(2.0));
    }

    #[test]
    fn missing_timestamp_sorts_earliest() {
        let batch = vec![
            rec(Some("C100"), Some("2024-03-01T00:00:00"), 1.0),
            rec(Some("C100"), None, 2.0),
        ];
        let (kept, _) = dedupe_latest(&batch, "customer_id", "signup_date");
        assert_eq!(kept[0].f64_field("lifetime_value"), Some(1.0));
    }

    #[test]
    fn records_without_id_pass_through() {
        let batch = vec![
            rec(None, None, 1.0),
            rec(None, None, 2.0),
            rec(Some("C1"), None, 3.0),
        ];
        let (kept, removed) = dedupe_latest(&batch, "customer_id", "signup_date");
        assert_eq!(kept.len(), 3);
        assert_eq!(removed, 0);
    }

    #[test]
    fn distinct_ids_untouched_in_order() {
        let batch = vec![
            rec(Some("C1"), None, 1.0),
            rec(Some("C2"), None, 2.0),
        ];
        let (kept, removed) = dedupe_latest(&batch, "customer_id", "signup_date");
        assert_eq!(removed, 0);
        assert_eq!(kept[0].str_field("customer_id"), Some("C1"));
        assert_eq!(kept[1].str_field("customer_id"), Some("C2"));
    }
}
