//! Review batch transformation and the per-product rollup.

use std::collections::BTreeMap;

use starload_types::{CleanReview, ProductRollup, RawRecord, RejectReason, Rejection, Sentiment};

use super::{dedupe_latest, Transformed};

const DEFAULT_RATING: i64 = 3;
const DEFAULT_CATEGORY: &str = "UNCLASSIFIED";

/// Clean a batch of raw review records.
///
/// Ratings are clamped to 1..=5 (a missing rating takes the neutral
/// midpoint). Missing review text becomes the empty string. `review_id`,
/// `product_id`, and a parseable `review_date` have no safe default.
#[must_use]
pub fn transform(records: &[RawRecord]) -> Transformed<CleanReview> {
    let (deduped, duplicates_removed) = dedupe_latest(records, "review_id", "review_date");

    let mut out = Transformed {
        duplicates_removed,
        ..Transformed::default()
    };

    for rec in &deduped {
        match clean_one(rec) {
            Ok(review) => out.cleaned.push(review),
            Err(rejection) => {
                tracing::debug!(
                    reason = %rejection.reason,
                    detail = %rejection.detail,
                    "rejected review record"
                );
                out.rejections.push(rejection);
            }
        }
    }
    out
}

fn clean_one(rec: &RawRecord) -> Result<CleanReview, Rejection> {
    let Some(review_id) = rec.str_field("review_id") else {
        return Err(Rejection::new(
            None,
            RejectReason::MissingField,
            "review record without review_id",
        ));
    };
    let review_id = review_id.to_string();
    let reject = |reason, detail: String| Rejection::new(Some(review_id.clone()), reason, detail);

    let product_id = rec
        .str_field("product_id")
        .ok_or_else(|| {
            reject(
                RejectReason::MissingField,
                "review without product_id".into(),
            )
        })?
        .to_string();

    let review_date = match rec.str_field("review_date") {
        None => {
            return Err(reject(
                RejectReason::MissingField,
                "review without review_date".into(),
            ))
        }
        Some(raw) => starload_types::record::parse_datetime(raw).ok_or_else(|| {
            reject(
                RejectReason::MalformedField,
                format!("unparseable review_date '{raw}'"),
            )
        })?,
    };

    let rating = match (rec.has("rating"), rec.i64_field("rating")) {
        (true, None) => {
            return Err(reject(
                RejectReason::MalformedField,
                "uncoercible rating".into(),
            ))
        }
        (_, r) => r.unwrap_or(DEFAULT_RATING).clamp(1, 5),
    };

    Ok(CleanReview {
        product_id,
        customer_id: rec.str_field("customer_id").unwrap_or_default().to_string(),
        rating,
        review_text: rec.str_field("review_text").unwrap_or_default().to_string(),
        review_date,
        verified_purchase: rec.bool_field("verified_purchase").unwrap_or(false),
        helpful_votes: rec.i64_field("helpful_votes").unwrap_or(0).max(0),
        product_category: rec
            .str_field("product_category")
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string(),
        sentiment: Sentiment::from_rating(rating),
        review_id,
    })
}

/// Fold cleaned reviews into one dimension row per product: average
/// rating, review count, and the category observed last. Output is sorted
/// by product id so loads are deterministic.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rollup(reviews: &[CleanReview]) -> Vec<ProductRollup> {
    struct Acc {
        rating_sum: i64,
        count: u64,
        category: String,
    }

    let mut by_product: BTreeMap<&str, Acc> = BTreeMap::new();
    for review in reviews {
        by_product
            .entry(&review.product_id)
            .and_modify(|acc| {
                acc.rating_sum += review.rating;
                acc.count += 1;
                acc.category.clone_from(&review.product_category);
            })
            .or_insert(Acc {
                rating_sum: review.rating,
                count: 1,
                category: review.product_category.clone(),
            });
    }

    by_product
        .into_iter()
        .map(|(product_id, acc)| ProductRollup {
            product_id: product_id.to_string(),
            product_category: acc.category,
            avg_rating: acc.rating_sum as f64 / acc.count as f64,
            total_reviews: acc.count,
        })
        .collect()
}
