//! # facturapid-db: Receiving Store for Facturapid
//!
//! Persists forwarded invoices in SQLite with sqlx.
//!
//! ```text
//!   Forwarder / receiving API
//!        │  create_full_invoice · get_full_invoice · update_fiscal_data
//!        ▼
//!   InvoiceRepository ──► one transaction per invoice
//!        │
//!        ▼
//!   SQLite: invoices ◄──FK, ON DELETE CASCADE── invoice_lines
//! ```
//!
//! - [`pool`] - opening the store ([`Database`], [`DbConfig`])
//! - [`migrations`] - embedded schema
//! - [`repository`] - invoice reads and writes
//! - [`error`] - [`DbError`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use facturapid_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("invoices.db")).await?;
//! db.invoices().create_full_invoice(&invoice).await?;
//! let stored = db.invoices().get_full_invoice(invoice.code()).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig, StoreLocation};
pub use repository::invoice::{CreateOutcome, InvoiceRepository};
