//! # Invoice Repository
//!
//! Idempotent, transactional storage of forwarded invoices.
//!
//! ## Create Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    create_full_invoice(invoice)                         │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  INSERT header ... ON CONFLICT (code) DO NOTHING                        │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  INSERT line₁..lineₙ ... ON CONFLICT (invoice_code, product,           │
//! │    │                                  line_number) DO NOTHING           │
//! │    ▼                                                                    │
//! │  COMMIT ──────────────► Ok(CreateOutcome)                               │
//! │                                                                         │
//! │  any other failure ──► ROLLBACK ──► Err(DbError)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Replaying an invoice that is already stored commits nothing new and
//! succeeds. A CHECK/NOT NULL/FK failure on any row leaves no trace of the
//! call.

use chrono::{NaiveDate, NaiveTime};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use facturapid_core::validation::validate_fiscal_data;
use facturapid_core::{
    FiscalData, Flag, FullInvoice, InvoiceHeader, InvoiceLine, Money, Quantity, TaxBreakdown,
    TaxRate, TaxSlot,
};

// =============================================================================
// SQL
// =============================================================================

const INSERT_HEADER: &str = r#"
    INSERT INTO invoices (
        code, account, sale_date, sale_time, total, payment_method, seller,
        tax_total, amount_paid, terminal, transferred, price_list, series,
        customer_name, customer_address, customer_tax_id, customer_email,
        reviewable, printed,
        mixed_payment_amount, mixed_cash_amount, mixed_payment_method,
        mixed_payment_method_2, mixed_payment_amount_2,
        diners, invoice_number, invoiced_date, invoiced_time,
        base_1, rate_1, tax_amount_1,
        base_2, rate_2, tax_amount_2,
        base_3, rate_3, tax_amount_3,
        base_4, rate_4, tax_amount_4,
        base_5, rate_5, tax_amount_5,
        base_6, rate_6, tax_amount_6
    ) VALUES (
        ?, ?, ?, ?, ?, ?, ?,
        ?, ?, ?, ?, ?, ?,
        ?, ?, ?, ?,
        ?, ?,
        ?, ?, ?,
        ?, ?,
        ?, ?, ?, ?,
        ?, ?, ?,
        ?, ?, ?,
        ?, ?, ?,
        ?, ?, ?,
        ?, ?, ?,
        ?, ?, ?
    )
    ON CONFLICT (code) DO NOTHING
"#;

const SELECT_HEADER: &str = r#"
    SELECT
        code, account, sale_date, sale_time, total, payment_method, seller,
        tax_total, amount_paid, terminal, transferred, price_list, series,
        customer_name, customer_address, customer_tax_id, customer_email,
        reviewable, printed,
        mixed_payment_amount, mixed_cash_amount, mixed_payment_method,
        mixed_payment_method_2, mixed_payment_amount_2,
        diners, invoice_number, invoiced_date, invoiced_time,
        base_1, rate_1, tax_amount_1,
        base_2, rate_2, tax_amount_2,
        base_3, rate_3, tax_amount_3,
        base_4, rate_4, tax_amount_4,
        base_5, rate_5, tax_amount_5,
        base_6, rate_6, tax_amount_6
    FROM invoices
    WHERE code = ?
"#;

const INSERT_LINE: &str = r#"
    INSERT INTO invoice_lines (
        invoice_code, legacy_units, subtotal, product_code, product, tax_rate,
        line_number, quantity, combined_with, continues_next, series
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (invoice_code, product, line_number) DO NOTHING
"#;

const SELECT_LINES: &str = r#"
    SELECT
        invoice_code, legacy_units, subtotal, product_code, product, tax_rate,
        line_number, quantity, combined_with, continues_next, series
    FROM invoice_lines
    WHERE invoice_code = ?
    ORDER BY line_number ASC, product ASC
"#;

// =============================================================================
// Outcome
// =============================================================================

/// What a committed `create_full_invoice` call actually wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOutcome {
    /// False when the header was already stored.
    pub header_inserted: bool,
    /// Line rows that did not exist before.
    pub lines_inserted: u64,
}

impl CreateOutcome {
    /// True when the call wrote nothing (a full replay).
    pub fn is_replay(&self) -> bool {
        !self.header_inserted && self.lines_inserted == 0
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Stores a header and its lines as one unit.
    ///
    /// Every line is stored under the header's code. Existing rows are left
    /// untouched. Any failure other than a key conflict rolls the whole call
    /// back; the write only counts once the commit succeeds.
    pub async fn create_full_invoice(&self, invoice: &FullInvoice) -> DbResult<CreateOutcome> {
        let code = invoice.code();
        debug!(code, lines = invoice.lines.len(), "Creating invoice");

        let mut tx = self.pool.begin().await?;

        match Self::insert_all(&mut *tx, invoice).await {
            Ok(outcome) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

                if outcome.is_replay() {
                    debug!(code, "Invoice already stored, nothing written");
                } else {
                    info!(
                        code,
                        header_inserted = outcome.header_inserted,
                        lines_inserted = outcome.lines_inserted,
                        "Invoice stored"
                    );
                }
                Ok(outcome)
            }
            Err(err) => {
                warn!(code, error = %err, "Invoice creation failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(code, error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn insert_all(conn: &mut SqliteConnection, invoice: &FullInvoice) -> DbResult<CreateOutcome> {
        let header_inserted = insert_header(conn, &invoice.header).await?;

        let mut lines_inserted = 0;
        for line in &invoice.lines {
            lines_inserted += insert_line(conn, invoice.code(), line).await?;
        }

        Ok(CreateOutcome {
            header_inserted,
            lines_inserted,
        })
    }

    /// Loads a header and its lines ordered by line number.
    ///
    /// ## Errors
    /// `DbError::NotFound` when no header has this code.
    pub async fn get_full_invoice(&self, code: i64) -> DbResult<FullInvoice> {
        let row: Option<InvoiceRow> = sqlx::query_as(SELECT_HEADER)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(DbError::not_found("Invoice", code.to_string()));
        };

        let line_rows: Vec<LineRow> = sqlx::query_as(SELECT_LINES)
            .bind(code)
            .fetch_all(&self.pool)
            .await?;

        let header = row.into_header()?;
        let lines = line_rows.into_iter().map(LineRow::into_line).collect();

        Ok(FullInvoice::new(header, lines))
    }

    /// Overwrites the four customer fields of a stored invoice.
    ///
    /// Absent values are written as NULL.
    ///
    /// ## Errors
    /// `DbError::Invalid` for a field over 30 characters or a malformed
    /// email, `DbError::NotFound` when no header has this code.
    pub async fn update_fiscal_data(&self, code: i64, fiscal: &FiscalData) -> DbResult<()> {
        debug!(code, "Updating fiscal data");
        validate_fiscal_data(fiscal)?;

        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                customer_name = ?1,
                customer_address = ?2,
                customer_tax_id = ?3,
                customer_email = ?4
            WHERE code = ?5
            "#,
        )
        .bind(&fiscal.customer_name)
        .bind(&fiscal.customer_address)
        .bind(&fiscal.customer_tax_id)
        .bind(&fiscal.customer_email)
        .bind(code)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", code.to_string()));
        }

        Ok(())
    }

    /// Checks whether a header with this code is stored.
    pub async fn exists(&self, code: i64) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT code FROM invoices WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Number of stored headers.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Number of stored lines for one invoice.
    pub async fn count_lines(&self, code: i64) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM invoice_lines WHERE invoice_code = ?")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Highest stored invoice code, if any.
    pub async fn max_code(&self) -> DbResult<Option<i64>> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(code) FROM invoices")
            .fetch_one(&self.pool)
            .await?;
        Ok(max)
    }
}

// =============================================================================
// Row Writers
// =============================================================================

fn flag_text(flag: Option<Flag>) -> Option<String> {
    flag.map(|f| f.to_string())
}

/// Returns true when the header row was new.
async fn insert_header(conn: &mut SqliteConnection, header: &InvoiceHeader) -> DbResult<bool> {
    let mut query = sqlx::query(INSERT_HEADER)
        .bind(header.code)
        .bind(&header.account)
        .bind(header.sale_date)
        .bind(header.sale_time)
        .bind(header.total)
        .bind(&header.payment_method)
        .bind(&header.seller)
        .bind(header.tax_total)
        .bind(header.amount_paid)
        .bind(&header.terminal)
        .bind(flag_text(header.transferred))
        .bind(&header.price_list)
        .bind(header.series.to_string())
        .bind(&header.customer_name)
        .bind(&header.customer_address)
        .bind(&header.customer_tax_id)
        .bind(&header.customer_email)
        .bind(flag_text(header.reviewable))
        .bind(flag_text(header.printed))
        .bind(header.mixed_payment_amount)
        .bind(header.mixed_cash_amount)
        .bind(&header.mixed_payment_method)
        .bind(&header.mixed_payment_method_2)
        .bind(header.mixed_payment_amount_2)
        .bind(header.diners)
        .bind(header.invoice_number)
        .bind(header.invoiced_date)
        .bind(header.invoiced_time);

    for slot in header.taxes.positions() {
        query = query.bind(slot.base).bind(slot.rate).bind(slot.amount);
    }

    let result = query.execute(&mut *conn).await?;
    Ok(result.rows_affected() == 1)
}

/// Returns the number of rows written (0 on replay).
async fn insert_line(conn: &mut SqliteConnection, invoice_code: i64, line: &InvoiceLine) -> DbResult<u64> {
    let result = sqlx::query(INSERT_LINE)
        .bind(invoice_code)
        .bind(line.legacy_units)
        .bind(line.subtotal)
        .bind(&line.product_code)
        .bind(&line.product)
        .bind(line.tax_rate)
        .bind(line.line_number)
        .bind(line.quantity)
        .bind(&line.combined_with)
        .bind(flag_text(line.continues_next))
        .bind(flag_text(line.series))
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Row Readers
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    code: i64,
    account: Option<String>,
    sale_date: Option<NaiveDate>,
    sale_time: Option<NaiveTime>,
    total: Option<Money>,
    payment_method: Option<String>,
    seller: Option<String>,
    tax_total: Option<Money>,
    amount_paid: Option<Money>,
    terminal: Option<String>,
    transferred: Option<String>,
    price_list: String,
    series: String,
    customer_name: Option<String>,
    customer_address: Option<String>,
    customer_tax_id: Option<String>,
    customer_email: Option<String>,
    reviewable: Option<String>,
    printed: Option<String>,
    mixed_payment_amount: Option<Money>,
    mixed_cash_amount: Option<Money>,
    mixed_payment_method: Option<String>,
    mixed_payment_method_2: Option<String>,
    mixed_payment_amount_2: Option<Money>,
    diners: Option<i32>,
    invoice_number: Option<i64>,
    invoiced_date: Option<NaiveDate>,
    invoiced_time: Option<NaiveTime>,
    base_1: Option<Money>,
    rate_1: Option<TaxRate>,
    tax_amount_1: Option<Money>,
    base_2: Option<Money>,
    rate_2: Option<TaxRate>,
    tax_amount_2: Option<Money>,
    base_3: Option<Money>,
    rate_3: Option<TaxRate>,
    tax_amount_3: Option<Money>,
    base_4: Option<Money>,
    rate_4: Option<TaxRate>,
    tax_amount_4: Option<Money>,
    base_5: Option<Money>,
    rate_5: Option<TaxRate>,
    tax_amount_5: Option<Money>,
    base_6: Option<Money>,
    rate_6: Option<TaxRate>,
    tax_amount_6: Option<Money>,
}

fn flag_of(text: Option<String>) -> Option<Flag> {
    text.as_deref().and_then(Flag::from_text)
}

impl InvoiceRow {
    fn into_header(self) -> DbResult<InvoiceHeader> {
        let series = Flag::from_text(&self.series).ok_or_else(|| {
            DbError::InvalidData(format!("invoice {} has an empty series", self.code))
        })?;

        let slot = |base, rate, amount| TaxSlot { base, rate, amount };
        let taxes = TaxBreakdown::from_slots([
            slot(self.base_1, self.rate_1, self.tax_amount_1),
            slot(self.base_2, self.rate_2, self.tax_amount_2),
            slot(self.base_3, self.rate_3, self.tax_amount_3),
            slot(self.base_4, self.rate_4, self.tax_amount_4),
            slot(self.base_5, self.rate_5, self.tax_amount_5),
            slot(self.base_6, self.rate_6, self.tax_amount_6),
        ]);

        Ok(InvoiceHeader {
            code: self.code,
            account: self.account,
            sale_date: self.sale_date,
            sale_time: self.sale_time,
            total: self.total,
            payment_method: self.payment_method,
            seller: self.seller,
            tax_total: self.tax_total,
            amount_paid: self.amount_paid,
            terminal: self.terminal,
            transferred: flag_of(self.transferred),
            price_list: self.price_list,
            taxes,
            series,
            customer_name: self.customer_name,
            customer_address: self.customer_address,
            customer_tax_id: self.customer_tax_id,
            customer_email: self.customer_email,
            reviewable: flag_of(self.reviewable),
            printed: flag_of(self.printed),
            mixed_payment_amount: self.mixed_payment_amount,
            mixed_cash_amount: self.mixed_cash_amount,
            mixed_payment_method: self.mixed_payment_method,
            mixed_payment_method_2: self.mixed_payment_method_2,
            mixed_payment_amount_2: self.mixed_payment_amount_2,
            diners: self.diners,
            invoice_number: self.invoice_number,
            invoiced_date: self.invoiced_date,
            invoiced_time: self.invoiced_time,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    invoice_code: i64,
    legacy_units: Option<i32>,
    subtotal: Option<Money>,
    product_code: Option<String>,
    product: String,
    tax_rate: Option<TaxRate>,
    line_number: i32,
    quantity: Option<Quantity>,
    combined_with: String,
    continues_next: Option<String>,
    series: Option<String>,
}

impl LineRow {
    fn into_line(self) -> InvoiceLine {
        InvoiceLine {
            invoice_code: self.invoice_code,
            legacy_units: self.legacy_units,
            subtotal: self.subtotal,
            product_code: self.product_code,
            product: self.product,
            tax_rate: self.tax_rate,
            line_number: self.line_number,
            quantity: self.quantity,
            combined_with: self.combined_with,
            continues_next: flag_of(self.continues_next),
            series: flag_of(self.series),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn line(code: i64, number: i32, product: &str, qty: i64, unit: i64) -> InvoiceLine {
        let mut line = InvoiceLine::new(code, number, product);
        line.product_code = Some(format!("PROD{number:03}"));
        line.quantity = Some(Quantity::from_units(qty));
        line.legacy_units = Some(qty as i32);
        line.subtotal = Some(Money::from_units(qty * unit));
        line.tax_rate = Some(TaxRate::from_bps(2100));
        line
    }

    fn sample_invoice(code: i64) -> FullInvoice {
        let mut header = InvoiceHeader::new(code, "1", Flag::new('A'));
        header.account = Some("1".to_string());
        header.sale_date = NaiveDate::from_ymd_opt(2023, 1, 15);
        header.sale_time = NaiveTime::from_hms_opt(10, 0, 0);
        header.total = Some(Money::from_units(121));
        header.payment_method = Some("Efectivo".to_string());
        header.tax_total = Some(Money::from_units(21));
        header.printed = Some(Flag::YES);
        header.customer_name = Some("QR".to_string());
        header.taxes.set(
            0,
            TaxSlot::new(Money::from_units(100), TaxRate::from_bps(2100), Money::from_units(21)),
        );

        FullInvoice::new(
            header,
            vec![line(code, 1, "Product A", 2, 25), line(code, 2, "Product B", 1, 50)],
        )
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let db = setup().await;
        let invoice = sample_invoice(1);

        let outcome = db.invoices().create_full_invoice(&invoice).await.unwrap();
        assert!(outcome.header_inserted);
        assert_eq!(outcome.lines_inserted, 2);

        let stored = db.invoices().get_full_invoice(1).await.unwrap();
        assert_eq!(stored, invoice);
        assert_eq!(stored.header.taxes.slot(0).and_then(|s| s.amount), Some(Money::from_units(21)));
        assert!(stored.header.taxes.slot(1).is_none());
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let db = setup().await;
        let repo = db.invoices();
        let invoice = sample_invoice(1);

        repo.create_full_invoice(&invoice).await.unwrap();
        let second = repo.create_full_invoice(&invoice).await.unwrap();

        assert!(second.is_replay());
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.count_lines(1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replay_does_not_overwrite_header() {
        let db = setup().await;
        let repo = db.invoices();
        let invoice = sample_invoice(4);
        repo.create_full_invoice(&invoice).await.unwrap();

        let mut changed = invoice.clone();
        changed.header.total = Some(Money::from_units(999));
        changed.lines.push(line(4, 3, "Product C", 1, 10));

        let outcome = repo.create_full_invoice(&changed).await.unwrap();
        assert!(!outcome.header_inserted);
        assert_eq!(outcome.lines_inserted, 1);

        let stored = repo.get_full_invoice(4).await.unwrap();
        assert_eq!(stored.header.total, Some(Money::from_units(121)));
        assert_eq!(stored.lines.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_everything() {
        let db = setup().await;
        let repo = db.invoices();
        let mut invoice = sample_invoice(5);
        // line_number must be positive
        invoice.lines.push(InvoiceLine::new(5, 0, "Broken"));

        let err = repo.create_full_invoice(&invoice).await.unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));

        assert!(!repo.exists(5).await.unwrap());
        assert_eq!(repo.count_lines(5).await.unwrap(), 0);
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lines_come_back_ordered() {
        let db = setup().await;
        let mut invoice = sample_invoice(9);
        invoice.lines = vec![
            line(9, 3, "Third", 1, 1),
            line(9, 1, "First", 1, 1),
            line(9, 2, "Second", 1, 1),
        ];
        db.invoices().create_full_invoice(&invoice).await.unwrap();

        let stored = db.invoices().get_full_invoice(9).await.unwrap();
        let numbers: Vec<i32> = stored.lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_header_without_lines() {
        let db = setup().await;
        let mut invoice = sample_invoice(2);
        invoice.lines.clear();

        db.invoices().create_full_invoice(&invoice).await.unwrap();
        let stored = db.invoices().get_full_invoice(2).await.unwrap();
        assert!(stored.lines.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let db = setup().await;
        let err = db.invoices().get_full_invoice(42).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_create_stores_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("invoices.db")))
            .await
            .unwrap();
        let first = db.invoices();
        let second = db.invoices();
        let invoice = sample_invoice(5);

        let (a, b) = tokio::join!(
            first.create_full_invoice(&invoice),
            second.create_full_invoice(&invoice)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        // Exactly one writer got the header in
        assert!(a.header_inserted ^ b.header_inserted);
        assert_eq!(a.lines_inserted + b.lines_inserted, 2);
        assert_eq!(db.invoices().count().await.unwrap(), 1);
        assert_eq!(db.invoices().count_lines(5).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_fiscal_data_writes_nulls() {
        let db = setup().await;
        let repo = db.invoices();
        repo.create_full_invoice(&sample_invoice(1)).await.unwrap();

        let fiscal = FiscalData {
            customer_name: Some("ACME SL".to_string()),
            customer_address: None,
            customer_tax_id: Some("B12345678".to_string()),
            customer_email: Some("billing@acme.test".to_string()),
        };
        repo.update_fiscal_data(1, &fiscal).await.unwrap();
        assert_eq!(repo.get_full_invoice(1).await.unwrap().header.fiscal_data(), fiscal);

        repo.update_fiscal_data(1, &FiscalData::default()).await.unwrap();
        let cleared = repo.get_full_invoice(1).await.unwrap().header;
        assert_eq!(cleared.customer_name, None);
        assert_eq!(cleared.customer_email, None);
        // everything else untouched
        assert_eq!(cleared.total, Some(Money::from_units(121)));
    }

    #[tokio::test]
    async fn test_update_fiscal_data_rejects_invalid_fields() {
        let db = setup().await;
        let repo = db.invoices();
        repo.create_full_invoice(&sample_invoice(1)).await.unwrap();

        let long_name = FiscalData {
            customer_name: Some("N".repeat(31)),
            ..FiscalData::default()
        };
        let err = repo.update_fiscal_data(1, &long_name).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
        assert!(err.is_constraint());

        let bad_email = FiscalData {
            customer_email: Some("not-an-email".to_string()),
            ..FiscalData::default()
        };
        let err = repo.update_fiscal_data(1, &bad_email).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));

        let header = repo.get_full_invoice(1).await.unwrap().header;
        assert_eq!(header.customer_name.as_deref(), Some("QR"));
    }

    #[tokio::test]
    async fn test_update_fiscal_data_missing_is_not_found() {
        let db = setup().await;
        let repo = db.invoices();
        repo.create_full_invoice(&sample_invoice(1)).await.unwrap();

        let err = repo
            .update_fiscal_data(77, &FiscalData::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(
            repo.get_full_invoice(1).await.unwrap().header.customer_name.as_deref(),
            Some("QR")
        );
    }

    #[tokio::test]
    async fn test_deleting_header_cascades_to_lines() {
        let db = setup().await;
        let repo = db.invoices();
        repo.create_full_invoice(&sample_invoice(3)).await.unwrap();
        assert_eq!(repo.count_lines(3).await.unwrap(), 2);

        sqlx::query("DELETE FROM invoices WHERE code = ?")
            .bind(3_i64)
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(repo.count_lines(3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_max_code() {
        let db = setup().await;
        let repo = db.invoices();
        assert_eq!(repo.max_code().await.unwrap(), None);

        repo.create_full_invoice(&sample_invoice(1)).await.unwrap();
        repo.create_full_invoice(&sample_invoice(5)).await.unwrap();
        assert_eq!(repo.max_code().await.unwrap(), Some(5));
    }
}
