//! Repositories over the receiving store.
//!
//! One today: [`invoice::InvoiceRepository`], which owns the `invoices` and
//! `invoice_lines` tables.

pub mod invoice;
