//! # POS Store Seeder
//!
//! Creates a development point-of-sale store with a handful of invoices.
//!
//! ## Usage
//! ```bash
//! # ./pos_dev.db (default)
//! cargo run -p facturapid-synchronizer --bin seed-source
//!
//! # Specify database path
//! cargo run -p facturapid-synchronizer --bin seed-source -- --db ./data/pos.db
//! ```
//!
//! ## Seeded Invoices
//! ```text
//! code │ channel │ printed │ total  │ lines
//! ─────┼─────────┼─────────┼────────┼─────────────────────────────
//!   1  │ QR      │ S       │ 121.00 │ Product A ×2, Product B ×1
//!   2  │ CASH    │ S       │  30.25 │ Product C ×1      (not synced)
//!   3  │ QR      │ N       │  60.50 │ Product E ×1      (not synced)
//!   4  │ QR      │ S       │ 242.00 │ Product D ×4
//!   5  │ QR      │ S       │  60.50 │ Product E ×1
//! ```

use anyhow::Context;
use facturapid_sync::config::SourceSettings;
use facturapid_sync::source::install_schema;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;

/// (code, sale time, total, base, tax, payment method, channel, printed)
const HEADERS: &[(i64, &str, f64, f64, f64, &str, &str, &str)] = &[
    (1, "10:00", 121.00, 100.00, 21.00, "Efectivo", "QR", "S"),
    (2, "10:05", 30.25, 25.00, 5.25, "Efectivo", "CASH", "S"),
    (3, "10:10", 60.50, 50.00, 10.50, "Tarjeta", "QR", "N"),
    (4, "10:15", 242.00, 200.00, 42.00, "Tarjeta", "QR", "S"),
    (5, "10:20", 60.50, 50.00, 10.50, "Efectivo", "QR", "S"),
];

/// (invoice, line number, product code, description, units, subtotal)
const LINES: &[(i64, i64, &str, &str, f64, f64)] = &[
    (1, 1, "PROD001", "Product A", 2.0, 50.00),
    (1, 2, "PROD002", "Product B", 1.0, 50.00),
    (2, 1, "PROD003", "Product C", 1.0, 25.00),
    (3, 1, "PROD005", "Product E", 1.0, 50.00),
    (4, 1, "PROD004", "Product D", 4.0, 200.00),
    (5, 1, "PROD005", "Product E", 1.0, 50.00),
];

const SALE_DATE: &str = "2023-01-15";
const VAT_RATE: f64 = 21.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = "./pos_dev.db".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Facturapid POS Store Seeder");
                println!();
                println!("Usage: seed-source [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./pos_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Facturapid POS Store Seeder");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("opening {}", db_path))?;

    let settings = SourceSettings::default();
    install_schema(&pool, &settings).await?;
    println!("✓ Tables ready ({}, {})", settings.header_table, settings.line_table);

    let existing: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", settings.header_table))
        .fetch_one(&pool)
        .await?;
    if existing > 0 {
        println!("⚠ Store already has {} invoices", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    let insert_header = format!(
        "INSERT INTO {} (code, sale_date, sale_time, total, tax_total, amount_paid, \
         payment_method, price_list, series, base_1, rate_1, tax_amount_1, \
         payment_channel, printed, reviewable, terminal) \
         VALUES (?, ?, ?, ?, ?, ?, ?, '1', 'A', ?, ?, ?, ?, ?, 'N', '01')",
        settings.header_table
    );
    for &(code, time, total, base, tax, method, channel, printed) in HEADERS {
        sqlx::query(&insert_header)
            .bind(code)
            .bind(SALE_DATE)
            // Legacy time-only encoding
            .bind(format!("1899-12-30 {}:00", time))
            .bind(total)
            .bind(tax)
            .bind(total)
            .bind(method)
            .bind(base)
            .bind(VAT_RATE)
            .bind(tax)
            .bind(channel)
            .bind(printed)
            .execute(&mut *tx)
            .await?;
    }
    println!("✓ {} invoice headers", HEADERS.len());

    let insert_line = format!(
        "INSERT INTO {} (invoice_code, line_number, product_code, product, quantity, \
         legacy_units, subtotal, tax_rate, combined_with, continues_next, series) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, '', 'N', 'A')",
        settings.line_table
    );
    for &(code, number, product_code, product, units, subtotal) in LINES {
        sqlx::query(&insert_line)
            .bind(code)
            .bind(number)
            .bind(product_code)
            .bind(product)
            .bind(units)
            .bind(units as i64)
            .bind(subtotal)
            .bind(VAT_RATE)
            .execute(&mut *tx)
            .await?;
    }
    println!("✓ {} invoice lines", LINES.len());

    tx.commit().await?;

    println!();
    println!("✓ Seed complete! Eligible for sync: 1, 4, 5");

    Ok(())
}
