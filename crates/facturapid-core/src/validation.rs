//! # Validation Module
//!
//! Invoice rules checked before an invoice leaves the sync engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Detail hydrator (sync engine)                                │
//! │  └── THIS MODULE: codes, line ownership, tax slots, field lengths      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Receiving store (SQLite)                                     │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── PRIMARY KEY (absorbed by ON CONFLICT DO NOTHING)                  │
//! │  └── FOREIGN KEY lines → invoices                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use facturapid_core::validation::{validate_email, validate_invoice_code};
//!
//! assert!(validate_invoice_code(5).is_ok());
//! assert!(validate_invoice_code(0).is_err());
//! assert!(validate_email("billing@acme.test").is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::{FiscalData, FullInvoice, InvoiceLine};
use crate::{MAX_FISCAL_FIELD_LEN, MAX_PRODUCT_CODE_LEN, MAX_PRODUCT_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Scalar Validators
// =============================================================================

/// Invoice codes are positive integers.
pub fn validate_invoice_code(code: i64) -> ValidationResult<()> {
    if code <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "code".to_string(),
        });
    }
    Ok(())
}

fn validate_max_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a contact email.
///
/// ## Rules
/// - Exactly one `@`
/// - Non-empty local part
/// - Domain contains a dot that is neither first nor last
/// - No whitespace
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "customer_email".to_string(),
        reason: reason.to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("missing '@'"))?;

    if local.is_empty() || domain.contains('@') {
        return Err(invalid("must be name@domain"));
    }

    match domain.rfind('.') {
        Some(dot) if dot > 0 && dot < domain.len() - 1 => Ok(()),
        _ => Err(invalid("domain must contain a dot")),
    }
}

fn validate_fiscal_lengths(fiscal: &FiscalData) -> ValidationResult<()> {
    let fields = [
        ("customer_name", &fiscal.customer_name),
        ("customer_address", &fiscal.customer_address),
        ("customer_tax_id", &fiscal.customer_tax_id),
        ("customer_email", &fiscal.customer_email),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            validate_max_len(field, value, MAX_FISCAL_FIELD_LEN)?;
        }
    }
    Ok(())
}

// =============================================================================
// Aggregate Validators
// =============================================================================

/// Validates the four customer fields.
///
/// ## Rules
/// - Each field at most 30 characters
/// - Email, when present and non-empty, must look like an address
pub fn validate_fiscal_data(fiscal: &FiscalData) -> ValidationResult<()> {
    validate_fiscal_lengths(fiscal)?;

    match fiscal.customer_email.as_deref() {
        Some(email) if !email.is_empty() => validate_email(email),
        _ => Ok(()),
    }
}

/// Validates one line against the header it claims to belong to.
pub fn validate_line(line: &InvoiceLine, header_code: i64) -> ValidationResult<()> {
    if line.invoice_code != header_code {
        return Err(ValidationError::Inconsistent {
            field: "invoice_code".to_string(),
            reason: format!(
                "line {} belongs to invoice {}, not {}",
                line.line_number, line.invoice_code, header_code
            ),
        });
    }

    if line.line_number <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "line_number".to_string(),
        });
    }

    if line.product.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "product".to_string(),
        });
    }
    validate_max_len("product", &line.product, MAX_PRODUCT_LEN)?;

    if let Some(code) = &line.product_code {
        validate_max_len("product_code", code, MAX_PRODUCT_CODE_LEN)?;
    }
    validate_max_len("combined_with", &line.combined_with, MAX_PRODUCT_CODE_LEN)
}

/// Validates a hydrated invoice before it is forwarded.
///
/// Fiscal fields are checked for length only: the till's free-text email
/// column is not reliable enough to reject a whole invoice over it.
pub fn validate_full_invoice(invoice: &FullInvoice) -> ValidationResult<()> {
    let header = &invoice.header;
    validate_invoice_code(header.code)?;

    if header.price_list.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "price_list".to_string(),
        });
    }

    header.taxes.validate()?;

    validate_fiscal_lengths(&header.fiscal_data())?;

    invoice
        .lines
        .iter()
        .try_for_each(|line| validate_line(line, header.code))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::{Flag, InvoiceHeader, TaxSlot};

    fn invoice(code: i64) -> FullInvoice {
        FullInvoice::new(
            InvoiceHeader::new(code, "1", Flag::new('A')),
            vec![InvoiceLine::new(code, 1, "Product A")],
        )
    }

    #[test]
    fn test_validate_invoice_code() {
        assert!(validate_invoice_code(1).is_ok());
        assert!(validate_invoice_code(0).is_err());
        assert!(validate_invoice_code(-3).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("billing@acme.test").is_ok());
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@acme.test").is_err());
        assert!(validate_email("a@@acme.test").is_err());
        assert!(validate_email("a@acme").is_err());
        assert!(validate_email("a@acme.").is_err());
        assert!(validate_email("a b@acme.test").is_err());
    }

    #[test]
    fn test_validate_fiscal_data() {
        assert!(validate_fiscal_data(&FiscalData::default()).is_ok());

        let too_long = FiscalData {
            customer_name: Some("N".repeat(31)),
            ..FiscalData::default()
        };
        assert!(matches!(
            validate_fiscal_data(&too_long),
            Err(ValidationError::TooLong { max: 30, .. })
        ));

        let bad_email = FiscalData {
            customer_email: Some("not-an-email".to_string()),
            ..FiscalData::default()
        };
        assert!(validate_fiscal_data(&bad_email).is_err());

        let cleared_email = FiscalData {
            customer_email: Some(String::new()),
            ..FiscalData::default()
        };
        assert!(validate_fiscal_data(&cleared_email).is_ok());
    }

    #[test]
    fn test_validate_full_invoice() {
        assert!(validate_full_invoice(&invoice(1)).is_ok());

        let mut empty = invoice(2);
        empty.lines.clear();
        assert!(validate_full_invoice(&empty).is_ok());
    }

    #[test]
    fn test_line_must_belong_to_header() {
        let mut inv = invoice(1);
        inv.lines.push(InvoiceLine::new(99, 2, "Stray"));
        assert!(matches!(
            validate_full_invoice(&inv),
            Err(ValidationError::Inconsistent { .. })
        ));
    }

    #[test]
    fn test_line_rules() {
        assert!(validate_line(&InvoiceLine::new(1, 0, "A"), 1).is_err());
        assert!(validate_line(&InvoiceLine::new(1, 1, "  "), 1).is_err());
        assert!(validate_line(&InvoiceLine::new(1, 1, "P".repeat(201)), 1).is_err());

        let mut line = InvoiceLine::new(1, 1, "A");
        line.product_code = Some("X".repeat(16));
        assert!(validate_line(&line, 1).is_err());
    }

    #[test]
    fn test_tax_slots_checked() {
        let mut inv = invoice(1);
        inv.header.taxes.set(
            0,
            TaxSlot {
                base: None,
                rate: None,
                amount: Some(Money::from_units(21)),
            },
        );
        assert!(validate_full_invoice(&inv).is_err());
    }
}
