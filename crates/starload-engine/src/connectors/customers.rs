//! MySQL connector for the customer profile store.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use mysql::prelude::Queryable;
use mysql::{Opts, Pool, Row};
use starload_types::{ConnectorError, ExtractMode, RawRecord, SourceName};

/// Datetimes are formatted and decimals cast in SQL so every column comes
/// back as a plain string or double, independent of driver type mapping.
const SELECT_CUSTOMERS: &str = "SELECT customer_id, first_name, last_name, email, phone, city, state, country, \
     DATE_FORMAT(signup_date, '%Y-%m-%dT%H:%i:%S') AS signup_date, customer_tier, \
     CAST(lifetime_value AS DOUBLE) AS lifetime_value, is_active \
     FROM customers";

const CURSOR_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Reads customers from MySQL on the blocking thread pool.
pub struct CustomersConnector {
    url: String,
}

impl CustomersConnector {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl super::SourceConnector for CustomersConnector {
    fn source(&self) -> SourceName {
        SourceName::Customers
    }

    async fn extract(
        &self,
        mode: ExtractMode,
        watermark: Option<NaiveDateTime>,
    ) -> Result<Vec<RawRecord>, ConnectorError> {
        let url = self.url.clone();
        tokio::task::spawn_blocking(move || fetch_customers(&url, mode, watermark))
            .await
            .map_err(|e| ConnectorError::unavailable(SourceName::Customers, e))?
    }
}

fn fetch_customers(
    url: &str,
    mode: ExtractMode,
    watermark: Option<NaiveDateTime>,
) -> Result<Vec<RawRecord>, ConnectorError> {
    let unavailable = |e: mysql::Error| ConnectorError::unavailable(SourceName::Customers, e);

    let opts = Opts::from_url(url)
        .map_err(|e| ConnectorError::unavailable(SourceName::Customers, e))?;
    let pool = Pool::new(opts).map_err(unavailable)?;
    let mut conn = pool.get_conn().map_err(unavailable)?;

    let rows: Vec<Row> = match (mode, watermark) {
        (ExtractMode::Incremental, Some(wm)) => {
            let sql = format!("{SELECT_CUSTOMERS} WHERE signup_date > ?");
            conn.exec(sql, (wm.format(CURSOR_FMT).to_string(),))
                .map_err(unavailable)?
        }
        _ => conn.query(SELECT_CUSTOMERS).map_err(unavailable)?,
    };

    tracing::debug!(rows = rows.len(), mode = %mode, "fetched customers");

    let mut records = Vec::with_capacity(rows.len());
    for mut row in rows {
        let mut rec = RawRecord::new();
        for key in [
            "customer_id",
            "first_name",
            "last_name",
            "email",
            "phone",
            "city",
            "state",
            "country",
            "signup_date",
            "customer_tier",
        ] {
            if let Some(v) = row.take::<Option<String>, _>(key).flatten() {
                rec.set(key, v);
            }
        }
        if let Some(ltv) = row.take::<Option<f64>, _>("lifetime_value").flatten() {
            rec.set("lifetime_value", ltv);
        }
        if let Some(active) = row.take::<Option<i64>, _>("is_active").flatten() {
            rec.set("is_active", active);
        }
        records.push(rec);
    }
    Ok(records)
}
