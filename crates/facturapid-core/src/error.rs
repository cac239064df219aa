//! # Domain Errors
//!
//! Errors raised while parsing and checking invoices, before any I/O.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Facturapid Error Types                             │
//! │                                                                         │
//! │  facturapid-core errors (this file)                                    │
//! │  ├── CoreError        - Either of the two below                        │
//! │  ├── DecimalError     - Fixed-scale decimal parsing failures           │
//! │  └── ValidationError  - Invoice rule violations                        │
//! │                                                                         │
//! │  facturapid-db errors (separate crate)                                 │
//! │  └── DbError          - Receiving store failures                       │
//! │                                                                         │
//! │  facturapid-sync errors (separate crate)                               │
//! │  └── SyncError        - Source, forward and artifact failures          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Any failure raised by this crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A decimal value could not be parsed.
    #[error("Invalid decimal: {0}")]
    Decimal(#[from] DecimalError),

    #[error("Invalid invoice: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Decimal Error
// =============================================================================

/// Failures when turning text into a fixed-scale decimal.
///
/// ## When This Occurs
/// - Source columns holding garbage (`"12,5"`, `"N/A"`)
/// - JSON payloads with more decimal places than the column scale
/// - Values that do not fit in an `i64` once scaled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecimalError {
    /// Input was empty or whitespace.
    #[error("empty decimal value")]
    Empty,

    /// Input is not a plain decimal number.
    #[error("'{0}' is not a decimal number")]
    Malformed(String),

    /// Input carries more significant fractional digits than the scale allows.
    #[error("'{input}' has more than {scale} decimal places")]
    TooPrecise { input: String, scale: u32 },

    /// Scaled value does not fit.
    #[error("'{0}' is out of range")]
    Overflow(String),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Invoice rule violations, checked after hydration and before forwarding.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Missing or blank.
    #[error("{field} is required")]
    Required { field: String },

    /// Longer than its column allows.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invoice codes and line numbers start at 1.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Wrong shape, such as a series longer than one character.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Related fields disagree with each other.
    #[error("{field} is inconsistent: {reason}")]
    Inconsistent { field: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_error_messages() {
        let err = DecimalError::TooPrecise {
            input: "1.23456".to_string(),
            scale: 4,
        };
        assert_eq!(err.to_string(), "'1.23456' has more than 4 decimal places");
        assert_eq!(DecimalError::Empty.to_string(), "empty decimal value");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::TooLong {
            field: "customer_name".to_string(),
            max: 30,
        };
        assert_eq!(err.to_string(), "customer_name must be at most 30 characters");
    }

    #[test]
    fn test_errors_convert_to_core_error() {
        let core_err: CoreError = ValidationError::Required {
            field: "product".to_string(),
        }
        .into();
        assert!(matches!(core_err, CoreError::Validation(_)));

        let core_err: CoreError = DecimalError::Empty.into();
        assert!(matches!(core_err, CoreError::Decimal(_)));
    }
}
