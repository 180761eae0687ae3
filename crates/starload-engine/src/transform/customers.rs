//! Customer batch transformation.

use chrono::NaiveDateTime;
use starload_types::{CleanCustomer, RawRecord, RejectReason, Rejection};

use super::{dedupe_latest, Transformed};

const VALID_TIERS: [&str; 4] = ["BRONZE", "SILVER", "GOLD", "PLATINUM"];
const DEFAULT_TIER: &str = "BRONZE";
const PHONE_SENTINEL: &str = "N/A";

/// Clean a batch of raw customer records.
///
/// Defaults: missing phone becomes `"N/A"`, missing name/address parts
/// become empty strings, an unrecognized tier falls back to `BRONZE`,
/// missing `lifetime_value` is zero, missing `is_active` is true.
/// `customer_id` and a parseable `signup_date` have no safe default.
/// `now` anchors the `account_age_days` derivation.
#[must_use]
pub fn transform(records: &[RawRecord], now: NaiveDateTime) -> Transformed<CleanCustomer> {
    let (deduped, duplicates_removed) = dedupe_latest(records, "customer_id", "signup_date");

    let mut out = Transformed {
        duplicates_removed,
        ..Transformed::default()
    };

    for rec in &deduped {
        match clean_one(rec, now) {
            Ok(customer) => out.cleaned.push(customer),
            Err(rejection) => {
                tracing::debug!(
                    reason = %rejection.reason,
                    detail = %rejection.detail,
                    "rejected customer record"
                );
                out.rejections.push(rejection);
            }
        }
    }
    out
}

fn clean_one(rec: &RawRecord, now: NaiveDateTime) -> Result<CleanCustomer, Rejection> {
    let Some(customer_id) = rec.str_field("customer_id") else {
        return Err(Rejection::new(
            None,
            RejectReason::MissingField,
            "customer record without customer_id",
        ));
    };
    let customer_id = customer_id.to_string();

    let signup_date = match rec.str_field("signup_date") {
        None => {
            return Err(Rejection::new(
                Some(customer_id),
                RejectReason::MissingField,
                "customer without signup_date",
            ))
        }
        Some(raw) => starload_types::record::parse_datetime(raw).ok_or_else(|| {
            Rejection::new(
                Some(customer_id.clone()),
                RejectReason::MalformedField,
                format!("unparseable signup_date '{raw}'"),
            )
        })?,
    };

    let tier = rec
        .str_field("customer_tier")
        .map(str::to_uppercase)
        .filter(|t| VALID_TIERS.contains(&t.as_str()))
        .unwrap_or_else(|| DEFAULT_TIER.to_string());

    let account_age_days = (now.date() - signup_date.date()).num_days().max(0);

    Ok(CleanCustomer {
        first_name: text_or_empty(rec, "first_name"),
        last_name: text_or_empty(rec, "last_name"),
        email: text_or_empty(rec, "email").to_lowercase(),
        phone: rec
            .str_field("phone")
            .unwrap_or(PHONE_SENTINEL)
            .to_string(),
        city: text_or_empty(rec, "city"),
        state: text_or_empty(rec, "state"),
        country: text_or_empty(rec, "country"),
        signup_date,
        customer_tier: tier,
        lifetime_value: rec.f64_field("lifetime_value").unwrap_or(0.0),
        is_active: rec.bool_field("is_active").unwrap_or(true),
        account_age_days,
        customer_id,
    })
}

fn text_or_empty(rec: &RawRecord, key: &str) -> String {
    rec.str_field(key).unwrap_or_default().to_string()
}
