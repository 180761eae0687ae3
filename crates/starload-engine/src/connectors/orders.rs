//! PostgreSQL connector for the transactional orders store.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use postgres::{Client, NoTls};
use starload_types::{ConnectorError, ExtractMode, RawRecord, SourceName};

/// Monetary columns are `NUMERIC` at the source; cast in SQL so the
/// driver hands back plain `f64`.
const SELECT_ORDERS: &str = "SELECT order_id, customer_id, product_id, order_date, quantity, \
     unit_price::float8 AS unit_price, total_amount::float8 AS total_amount, \
     status, payment_method, shipping_address \
     FROM orders";

/// Reads orders from PostgreSQL. The driver is synchronous, so each fetch
/// runs on the blocking thread pool.
pub struct OrdersConnector {
    url: String,
}

impl OrdersConnector {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl super::SourceConnector for OrdersConnector {
    fn source(&self) -> SourceName {
        SourceName::Orders
    }

    async fn extract(
        &self,
        mode: ExtractMode,
        watermark: Option<NaiveDateTime>,
    ) -> Result<Vec<RawRecord>, ConnectorError> {
        let url = self.url.clone();
        tokio::task::spawn_blocking(move || fetch_orders(&url, mode, watermark))
            .await
            .map_err(|e| ConnectorError::unavailable(SourceName::Orders, e))?
    }
}

fn fetch_orders(
    url: &str,
    mode: ExtractMode,
    watermark: Option<NaiveDateTime>,
) -> Result<Vec<RawRecord>, ConnectorError> {
    let unavailable = |e: postgres::Error| ConnectorError::unavailable(SourceName::Orders, e);

    let mut client = Client::connect(url, NoTls).map_err(unavailable)?;
    let rows = match (mode, watermark) {
        (ExtractMode::Incremental, Some(wm)) => {
            let sql = format!("{SELECT_ORDERS} WHERE order_date > $1");
            client.query(&sql, &[&wm]).map_err(unavailable)?
        }
        _ => client.query(SELECT_ORDERS, &[]).map_err(unavailable)?,
    };

    tracing::debug!(rows = rows.len(), mode = %mode, "fetched orders");

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let mut rec = RawRecord::new();
        set_text(&mut rec, "order_id", row.get(0));
        set_text(&mut rec, "customer_id", row.get(1));
        set_text(&mut rec, "product_id", row.get(2));
        if let Some(dt) = row.get::<_, Option<NaiveDateTime>>(3) {
            rec.set("order_date", dt.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
        if let Some(qty) = row.get::<_, Option<i32>>(4) {
            rec.set("quantity", i64::from(qty));
        }
        if let Some(price) = row.get::<_, Option<f64>>(5) {
            rec.set("unit_price", price);
        }
        if let Some(amount) = row.get::<_, Option<f64>>(6) {
            rec.set("total_amount", amount);
        }
        set_text(&mut rec, "status", row.get(7));
        set_text(&mut rec, "payment_method", row.get(8));
        set_text(&mut rec, "shipping_address", row.get(9));
        records.push(rec);
    }
    Ok(records)
}

fn set_text(rec: &mut RawRecord, key: &str, value: Option<String>) {
    if let Some(v) = value {
        rec.set(key, v);
    }
}
