//! # Source Reader
//!
//! Read-only access to the point-of-sale operational store.
//!
//! ## Eligibility
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  pos_invoices                                                           │
//! │                                                                         │
//! │  code │ payment_channel │ printed │                                     │
//! │  ─────┼─────────────────┼─────────┼──                                   │
//! │    1  │ QR              │ S       │  ✓ eligible                         │
//! │    2  │ CASH            │ S       │  ✗ wrong channel                    │
//! │    3  │ QR              │ N       │  ✗ not printed yet                  │
//! │    4  │ QR              │ S       │  ✓ eligible                         │
//! │                                                                         │
//! │  eligible_since(checkpoint = 1) → [4]                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store is never written by the synchronizer. [`install_schema`] exists
//! for the `seed-source` development binary and for tests.

use async_trait::async_trait;
use facturapid_core::{InvoiceHeader, InvoiceLine, InvoiceSummary, TaxBreakdown, TaxSlot, TAX_SLOTS};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::checkpoint::Checkpoint;
use crate::config::SourceSettings;
use crate::error::{SyncError, SyncResult};
use crate::mapping::{self, FieldReader};

// =============================================================================
// Source Trait
// =============================================================================

/// Anything the poller can read invoices from.
///
/// Every method fails with [`SyncError::SourceUnavailable`] when the store
/// cannot be queried.
#[async_trait]
pub trait InvoiceSource: Send + Sync {
    /// Eligible invoices with a code above the checkpoint, ascending,
    /// at most `limit` of them.
    async fn eligible_since(&self, checkpoint: Checkpoint, limit: u32) -> SyncResult<Vec<InvoiceSummary>>;

    /// Full header, `None` if the code no longer exists.
    async fn header(&self, code: i64) -> SyncResult<Option<InvoiceHeader>>;

    /// All lines of an invoice, possibly none.
    async fn lines(&self, code: i64) -> SyncResult<Vec<InvoiceLine>>;
}

// =============================================================================
// Column Layout
// =============================================================================

/// Header columns read as text, in addition to `code`.
const HEADER_TEXT_COLUMNS: &[&str] = &[
    "account",
    "sale_date",
    "sale_time",
    "total",
    "payment_method",
    "seller",
    "tax_total",
    "amount_paid",
    "terminal",
    "transferred",
    "price_list",
    "series",
    "customer_name",
    "customer_address",
    "customer_tax_id",
    "customer_email",
    "reviewable",
    "printed",
    "mixed_payment_amount",
    "mixed_cash_amount",
    "mixed_payment_method",
    "mixed_payment_method_2",
    "mixed_payment_amount_2",
    "diners",
    "invoice_number",
    "invoiced_date",
    "invoiced_time",
];

const LINE_TEXT_COLUMNS: &[&str] = &[
    "invoice_code",
    "legacy_units",
    "subtotal",
    "product_code",
    "product",
    "tax_rate",
    "line_number",
    "quantity",
    "combined_with",
    "continues_next",
    "series",
];

fn tax_columns() -> Vec<String> {
    (1..=TAX_SLOTS)
        .flat_map(|i| [format!("base_{i}"), format!("rate_{i}"), format!("tax_amount_{i}")])
        .collect()
}

fn as_text<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| format!("CAST({0} AS TEXT) AS {0}", c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// SQLite Source
// =============================================================================

/// [`InvoiceSource`] over a SQLite operational store.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    pool: SqlitePool,
    payment_channel: String,
    printed_flag: String,
    eligible_sql: String,
    header_sql: String,
    lines_sql: String,
}

impl SqliteSource {
    /// Opens the configured store read only.
    pub async fn connect(settings: &SourceSettings) -> SyncResult<Self> {
        info!(path = %settings.database_path.display(), "Opening source store (read only)");

        let options = SqliteConnectOptions::new()
            .filename(&settings.database_path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool, settings))
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: SqlitePool, settings: &SourceSettings) -> Self {
        let headers = &settings.header_table;
        let lines = &settings.line_table;

        let eligible_sql = format!(
            "SELECT code, CAST(sale_date AS TEXT) AS sale_date, CAST(total AS TEXT) AS total \
             FROM {headers} \
             WHERE code > ? AND TRIM(payment_channel) = ? AND TRIM(printed) = ? \
             ORDER BY code ASC LIMIT ?"
        );
        let header_sql = format!(
            "SELECT code, {}, {} FROM {headers} WHERE code = ? LIMIT 1",
            as_text(HEADER_TEXT_COLUMNS),
            as_text(&tax_columns()),
        );
        let lines_sql = format!(
            "SELECT {} FROM {lines} WHERE invoice_code = ? \
             ORDER BY CAST(line_number AS INTEGER) ASC",
            as_text(LINE_TEXT_COLUMNS),
        );

        SqliteSource {
            pool,
            payment_channel: settings.payment_channel.clone(),
            printed_flag: settings.printed_flag.to_string(),
            eligible_sql,
            header_sql,
            lines_sql,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl InvoiceSource for SqliteSource {
    async fn eligible_since(&self, checkpoint: Checkpoint, limit: u32) -> SyncResult<Vec<InvoiceSummary>> {
        let rows = sqlx::query(&self.eligible_sql)
            .bind(checkpoint.value())
            .bind(&self.payment_channel)
            .bind(&self.printed_flag)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let mut summaries = rows
            .iter()
            .map(summary_from_row)
            .collect::<SyncResult<Vec<_>>>()?;
        summaries.dedup_by_key(|s| s.code);

        debug!(checkpoint = checkpoint.value(), found = summaries.len(), "Listed eligible invoices");
        Ok(summaries)
    }

    async fn header(&self, code: i64) -> SyncResult<Option<InvoiceHeader>> {
        let row = sqlx::query(&self.header_sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(header_from_row).transpose()
    }

    async fn lines(&self, code: i64) -> SyncResult<Vec<InvoiceLine>> {
        let rows = sqlx::query(&self.lines_sql)
            .bind(code)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| line_from_row(code, row)).collect()
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

fn col(row: &SqliteRow, name: &str) -> SyncResult<Option<String>> {
    Ok(row.try_get::<Option<String>, _>(name)?)
}

fn summary_from_row(row: &SqliteRow) -> SyncResult<InvoiceSummary> {
    let code: i64 = row.try_get("code")?;
    let r = FieldReader::new(code);
    Ok(InvoiceSummary {
        code,
        sale_date: r.date("sale_date", col(row, "sale_date")?),
        total: r.money("total", col(row, "total")?),
    })
}

fn header_from_row(row: &SqliteRow) -> SyncResult<InvoiceHeader> {
    let code: i64 = row.try_get("code")?;
    let r = FieldReader::new(code);

    let series = r
        .flag(col(row, "series")?)
        .ok_or_else(|| SyncError::HydrationFailed {
            code,
            reason: "series is missing".to_string(),
        })?;
    let price_list = mapping::text(col(row, "price_list")?).unwrap_or_default();

    let mut header = InvoiceHeader::new(code, price_list, series);
    header.account = mapping::text(col(row, "account")?);
    header.sale_date = r.date("sale_date", col(row, "sale_date")?);
    header.sale_time = r.time("sale_time", col(row, "sale_time")?);
    header.total = r.money("total", col(row, "total")?);
    header.payment_method = mapping::text(col(row, "payment_method")?);
    header.seller = mapping::text(col(row, "seller")?);
    header.tax_total = r.money("tax_total", col(row, "tax_total")?);
    header.amount_paid = r.money("amount_paid", col(row, "amount_paid")?);
    header.terminal = mapping::text(col(row, "terminal")?);
    header.transferred = r.flag(col(row, "transferred")?);
    header.taxes = taxes_from_row(&r, row)?;
    header.customer_name = mapping::text(col(row, "customer_name")?);
    header.customer_address = mapping::text(col(row, "customer_address")?);
    header.customer_tax_id = mapping::text(col(row, "customer_tax_id")?);
    header.customer_email = mapping::text(col(row, "customer_email")?);
    header.reviewable = r.flag(col(row, "reviewable")?);
    header.printed = r.flag(col(row, "printed")?);
    header.mixed_payment_amount = r.money("mixed_payment_amount", col(row, "mixed_payment_amount")?);
    header.mixed_cash_amount = r.money("mixed_cash_amount", col(row, "mixed_cash_amount")?);
    header.mixed_payment_method = mapping::text(col(row, "mixed_payment_method")?);
    header.mixed_payment_method_2 = mapping::text(col(row, "mixed_payment_method_2")?);
    header.mixed_payment_amount_2 = r.money("mixed_payment_amount_2", col(row, "mixed_payment_amount_2")?);
    header.diners = r.small_integer("diners", col(row, "diners")?);
    header.invoice_number = r.integer("invoice_number", col(row, "invoice_number")?);
    header.invoiced_date = r.date("invoiced_date", col(row, "invoiced_date")?);
    header.invoiced_time = r.time("invoiced_time", col(row, "invoiced_time")?);

    Ok(header)
}

fn taxes_from_row(r: &FieldReader, row: &SqliteRow) -> SyncResult<TaxBreakdown> {
    let mut taxes = TaxBreakdown::new();
    for i in 0..TAX_SLOTS {
        let n = i + 1;
        let base = format!("base_{n}");
        let rate = format!("rate_{n}");
        let amount = format!("tax_amount_{n}");
        taxes.set(
            i,
            TaxSlot {
                base: r.money(&base, col(row, &base)?),
                rate: r.rate(&rate, col(row, &rate)?),
                amount: r.money(&amount, col(row, &amount)?),
            },
        );
    }
    Ok(taxes)
}

fn line_from_row(code: i64, row: &SqliteRow) -> SyncResult<InvoiceLine> {
    let r = FieldReader::new(code);

    // Zero and empty fail validation in the hydrator, with the line in context
    let line_number = r.small_integer("line_number", col(row, "line_number")?).unwrap_or(0);
    let product = mapping::text(col(row, "product")?).unwrap_or_default();
    let invoice_code = r.integer("invoice_code", col(row, "invoice_code")?).unwrap_or(code);

    let mut line = InvoiceLine::new(invoice_code, line_number, product);
    line.legacy_units = r.small_integer("legacy_units", col(row, "legacy_units")?);
    line.subtotal = r.money("subtotal", col(row, "subtotal")?);
    line.product_code = mapping::text(col(row, "product_code")?);
    line.tax_rate = r.rate("tax_rate", col(row, "tax_rate")?);
    line.quantity = r.quantity("quantity", col(row, "quantity")?);
    line.combined_with = mapping::text(col(row, "combined_with")?).unwrap_or_default();
    line.continues_next = r.flag(col(row, "continues_next")?);
    line.series = r.flag(col(row, "series")?);

    Ok(line)
}

// =============================================================================
// Schema (development and tests)
// =============================================================================

/// Creates the operational tables if they don't exist.
///
/// Mirrors the loose typing of the till: decimals are REAL and
/// dates/times are free text.
pub async fn install_schema(pool: &SqlitePool, settings: &SourceSettings) -> SyncResult<()> {
    let taxes = (1..=TAX_SLOTS)
        .map(|i| format!("base_{i} REAL, rate_{i} REAL, tax_amount_{i} REAL"))
        .collect::<Vec<_>>()
        .join(",\n    ");

    let headers = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
    code INTEGER NOT NULL,
    account TEXT, sale_date TEXT, sale_time TEXT, total REAL,
    payment_method TEXT, seller TEXT, tax_total REAL, amount_paid REAL,
    terminal TEXT, transferred TEXT, price_list TEXT, series TEXT,
    {taxes},
    customer_name TEXT, customer_address TEXT, customer_tax_id TEXT, customer_email TEXT,
    reviewable TEXT, printed TEXT, payment_channel TEXT,
    mixed_payment_amount REAL, mixed_cash_amount REAL,
    mixed_payment_method TEXT, mixed_payment_method_2 TEXT, mixed_payment_amount_2 REAL,
    diners INTEGER, invoice_number INTEGER, invoiced_date TEXT, invoiced_time TEXT
)",
        table = settings.header_table,
    );

    let lines = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
    invoice_code INTEGER NOT NULL,
    legacy_units INTEGER, subtotal REAL, product_code TEXT, product TEXT,
    tax_rate REAL, line_number INTEGER, quantity REAL,
    combined_with TEXT, continues_next TEXT, series TEXT
)",
        table = settings.line_table,
    );

    sqlx::query(&headers).execute(pool).await?;
    sqlx::query(&lines).execute(pool).await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use facturapid_core::{Flag, Money, TaxRate};

    async fn source() -> SqliteSource {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let settings = SourceSettings::default();
        install_schema(&pool, &settings).await.unwrap();
        SqliteSource::from_pool(pool, &settings)
    }

    async fn insert_header(src: &SqliteSource, code: i64, channel: &str, printed: &str) {
        sqlx::query(
            "INSERT INTO pos_invoices (code, sale_date, sale_time, total, price_list, series, \
             base_1, rate_1, tax_amount_1, payment_method, payment_channel, printed) \
             VALUES (?, '2023-01-15', '1899-12-30 10:00:00', 121.0, '1', 'A', 100.0, 21.0, 21.0, \
             'Efectivo', ?, ?)",
        )
        .bind(code)
        .bind(channel)
        .bind(printed)
        .execute(src.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_eligible_filter_and_order() {
        let src = source().await;
        insert_header(&src, 5, "QR", "S").await;
        insert_header(&src, 1, "QR", "S").await;
        insert_header(&src, 2, "CASH", "S").await;
        insert_header(&src, 3, "QR", "N").await;
        insert_header(&src, 4, " QR ", "S").await;

        let all = src.eligible_since(Checkpoint::new(0), 100).await.unwrap();
        let codes: Vec<i64> = all.iter().map(|s| s.code).collect();
        assert_eq!(codes, vec![1, 4, 5]);
        assert_eq!(all[0].total, Some(Money::from_units(121)));
        assert_eq!(all[0].sale_date, NaiveDate::from_ymd_opt(2023, 1, 15));

        let after = src.eligible_since(Checkpoint::new(1), 100).await.unwrap();
        assert_eq!(after.iter().map(|s| s.code).collect::<Vec<_>>(), vec![4, 5]);

        let limited = src.eligible_since(Checkpoint::new(0), 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_codes_listed_once() {
        let src = source().await;
        insert_header(&src, 7, "QR", "S").await;
        insert_header(&src, 7, "QR", "S").await;

        let found = src.eligible_since(Checkpoint::new(0), 100).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_header_mapping() {
        let src = source().await;
        insert_header(&src, 1, "QR", "S").await;

        let header = src.header(1).await.unwrap().unwrap();
        assert_eq!(header.code, 1);
        assert_eq!(header.series, Flag::new('A'));
        assert_eq!(header.price_list, "1");
        assert_eq!(header.sale_time, NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(header.payment_method.as_deref(), Some("Efectivo"));
        assert_eq!(header.printed, Some(Flag::YES));

        let slot = header.taxes.slot(0).unwrap();
        assert_eq!(slot.base, Some(Money::from_units(100)));
        assert_eq!(slot.rate, Some(TaxRate::from_bps(2100)));
        assert_eq!(slot.amount, Some(Money::from_units(21)));
        assert!(header.taxes.slot(1).is_none());

        assert!(src.header(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_header_without_series_fails() {
        let src = source().await;
        sqlx::query("INSERT INTO pos_invoices (code, price_list, series) VALUES (8, '1', '')")
            .execute(src.pool())
            .await
            .unwrap();

        let err = src.header(8).await.unwrap_err();
        assert!(matches!(err, SyncError::HydrationFailed { code: 8, .. }));
    }

    #[tokio::test]
    async fn test_lines_sorted_by_number() {
        let src = source().await;
        for (n, product) in [(2, "Product B"), (10, "Product J"), (1, "Product A")] {
            sqlx::query(
                "INSERT INTO pos_invoice_lines (invoice_code, line_number, product, product_code, quantity, subtotal, tax_rate) \
                 VALUES (1, ?, ?, 'PROD', 2.0, 50.0, 21.0)",
            )
            .bind(n)
            .bind(product)
            .execute(src.pool())
            .await
            .unwrap();
        }

        let lines = src.lines(1).await.unwrap();
        let numbers: Vec<i32> = lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
        assert_eq!(lines[0].subtotal, Some(Money::from_units(50)));
        assert_eq!(lines[0].combined_with, "");

        assert!(src.lines(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_table_is_source_unavailable() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let src = SqliteSource::from_pool(pool, &SourceSettings::default());

        let err = src.eligible_since(Checkpoint::new(0), 10).await.unwrap_err();
        assert!(matches!(err, SyncError::SourceUnavailable(_)));
    }
}
