//! Order batch transformation.

use starload_types::{CleanOrder, RawRecord, ReferenceKeys, RejectReason, Rejection};

use super::{dedupe_latest, Transformed};

const DEFAULT_QUANTITY: i64 = 1;
const DEFAULT_STATUS: &str = "UNKNOWN";

/// Clean a batch of raw order records against a dimension snapshot.
///
/// Orders are fact-bound, so beyond the field checks every record's
/// `customer_id` and `product_id` must resolve in `refs`; unresolved
/// references reject with `ORPHAN_REFERENCE`.
#[must_use]
pub fn transform(records: &[RawRecord], refs: &ReferenceKeys) -> Transformed<CleanOrder> {
    let (deduped, duplicates_removed) = dedupe_latest(records, "order_id", "order_date");

    let mut out = Transformed {
        duplicates_removed,
        ..Transformed::default()
    };

    for rec in &deduped {
        match clean_one(rec, refs) {
            Ok(order) => out.cleaned.push(order),
            Err(rejection) => {
                tracing::debug!(
                    reason = %rejection.reason,
                    detail = %rejection.detail,
                    "rejected order record"
                );
                out.rejections.push(rejection);
            }
        }
    }
    out
}

#[allow(clippy::too_many_lines)]
fn clean_one(rec: &RawRecord, refs: &ReferenceKeys) -> Result<CleanOrder, Rejection> {
    let Some(order_id) = rec.str_field("order_id") else {
        return Err(Rejection::new(
            None,
            RejectReason::MissingField,
            "order record without order_id",
        ));
    };
    let order_id = order_id.to_string();
    let reject = |reason, detail: String| Rejection::new(Some(order_id.clone()), reason, detail);

    let customer_id = rec
        .str_field("customer_id")
        .ok_or_else(|| {
            reject(
                RejectReason::MissingField,
                "order without customer_id".into(),
            )
        })?
        .to_string();
    let product_id = rec
        .str_field("product_id")
        .ok_or_else(|| {
            reject(
                RejectReason::MissingField,
                "order without product_id".into(),
            )
        })?
        .to_string();

    let order_date = match rec.str_field("order_date") {
        None => {
            return Err(reject(
                RejectReason::MissingField,
                "order without order_date".into(),
            ))
        }
        Some(raw) => starload_types::record::parse_datetime(raw).ok_or_else(|| {
            reject(
                RejectReason::MalformedField,
                format!("unparseable order_date '{raw}'"),
            )
        })?,
    };

    // Present-but-uncoercible numerics are malformed; absent ones take
    // documented defaults. A present quantity must be positive, otherwise
    // quantity, unit_price and total_amount could not agree.
    let quantity = match (rec.has("quantity"), rec.i64_field("quantity")) {
        (true, None) => {
            return Err(reject(
                RejectReason::MalformedField,
                "uncoercible quantity".into(),
            ))
        }
        (true, Some(qty)) if qty <= 0 => {
            return Err(reject(
                RejectReason::MalformedField,
                format!("non-positive quantity {qty}"),
            ))
        }
        (_, qty) => qty.unwrap_or(DEFAULT_QUANTITY),
    };

    let unit_price = match (rec.has("unit_price"), rec.f64_field("unit_price")) {
        (true, None) => {
            return Err(reject(
                RejectReason::MalformedField,
                "uncoercible unit_price".into(),
            ))
        }
        (_, price) => price,
    };

    let total_amount = match (rec.has("total_amount"), rec.f64_field("total_amount")) {
        (true, None) => {
            return Err(reject(
                RejectReason::MalformedField,
                "uncoercible total_amount".into(),
            ))
        }
        (_, amount) => amount,
    };

    // Either side can be derived from the other; both absent is unfixable.
    #[allow(clippy::cast_precision_loss)]
    let (unit_price, total_amount) = match (unit_price, total_amount) {
        (Some(p), Some(t)) => (p, t),
        (Some(p), None) => (p, p * quantity as f64),
        (None, Some(t)) => (t / quantity as f64, t),
        (None, None) => {
            return Err(reject(
                RejectReason::MissingField,
                "order without unit_price or total_amount".into(),
            ))
        }
    };

    if total_amount < 0.0 {
        return Err(reject(
            RejectReason::MalformedField,
            format!("negative total_amount {total_amount}"),
        ));
    }

    if !refs.has_customer(&customer_id) {
        return Err(reject(
            RejectReason::OrphanReference,
            format!("unknown customer '{customer_id}'"),
        ));
    }
    if !refs.has_product(&product_id) {
        return Err(reject(
            RejectReason::OrphanReference,
            format!("unknown product '{product_id}'"),
        ));
    }

    Ok(CleanOrder {
        customer_id,
        product_id,
        order_date,
        quantity,
        unit_price,
        total_amount,
        status: rec
            .str_field("status")
            .unwrap_or(DEFAULT_STATUS)
            .to_uppercase(),
        payment_method: rec
            .str_field("payment_method")
            .unwrap_or(DEFAULT_STATUS)
            .to_uppercase(),
        shipping_address: rec.str_field("shipping_address").map(str::to_string),
        order_id,
    })
}
