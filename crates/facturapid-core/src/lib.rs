//! # facturapid-core: Invoice Domain for Facturapid
//!
//! Pure types and rules shared by the sync engine and the receiving store.
//! Zero I/O.
//!
//! ```text
//!   POS store ──► facturapid-sync ──JSON──► receiving side ──► facturapid-db
//!                        │                                          │
//!                        └──────────── facturapid-core ─────────────┘
//!                          types · money · decimal · validation
//! ```
//!
//! - [`types`] - header, lines, tax breakdown, fiscal data, wire document
//! - [`money`] / [`decimal`] - fixed-scale decimals, text on the wire
//! - [`validation`] - rules checked before an invoice leaves the source side
//! - [`error`] - decimal and validation errors
//!
//! ## Example Usage
//!
//! ```rust
//! use facturapid_core::{Flag, FullInvoice, InvoiceHeader, InvoiceLine, Money};
//! use facturapid_core::validation::validate_full_invoice;
//!
//! let mut header = InvoiceHeader::new(1, "1", Flag::new('A'));
//! header.total = Some("121.00".parse::<Money>().unwrap());
//!
//! let invoice = FullInvoice::new(header, vec![InvoiceLine::new(1, 1, "Product A")]);
//! assert!(validate_full_invoice(&invoice).is_ok());
//! ```

pub mod decimal;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

pub use error::{CoreError, DecimalError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Column Widths
// =============================================================================

/// Number of base/rate/amount tax components on a header.
pub const TAX_SLOTS: usize = 6;

/// Column width of each customer/fiscal field.
pub const MAX_FISCAL_FIELD_LEN: usize = 30;

/// Column width of a line's product description.
pub const MAX_PRODUCT_LEN: usize = 200;

/// Column width of product codes (`product_code`, `combined_with`).
pub const MAX_PRODUCT_CODE_LEN: usize = 15;
