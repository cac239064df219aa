//! # Money Module
//!
//! Invoice amounts are NUMERIC(12,4) in the point-of-sale store and travel
//! as decimal text, so they are held as an i64 count of ten-thousandths:
//!
//! ```text
//!   "121.00"  ──►  1_210_000  ──►  "121.0000"
//!   60.5      ──►    605_000  ──►  "60.5000"
//! ```
//!
//! ## Usage
//! ```rust
//! use facturapid_core::money::Money;
//!
//! let total: Money = "121.00".parse().unwrap();
//! assert_eq!(total, Money::from_units(121));
//! assert_eq!(total.to_string(), "121.0000");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::decimal::{format_scaled, parse_scaled, ScaledVisitor};
use crate::error::DecimalError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in ten-thousandths of the currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds and credit notes are negative
/// - **Scale 4**: matches the NUMERIC(12,4) columns of the source store
/// - **String on the wire**: `"121.0000"`, never a JSON float
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Number of fractional digits.
    pub const SCALE: u32 = 4;

    const FACTOR: i64 = 10_000;

    /// Creates Money from its raw scaled representation.
    ///
    /// ## Example
    /// ```rust
    /// use facturapid_core::money::Money;
    ///
    /// let amount = Money::from_scaled(105_000); // 10.5000
    /// assert_eq!(amount.to_string(), "10.5000");
    /// ```
    #[inline]
    pub const fn from_scaled(scaled: i64) -> Self {
        Money(scaled)
    }

    /// Creates Money from whole currency units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units * Self::FACTOR)
    }

    /// Returns the raw scaled value (ten-thousandths).
    #[inline]
    pub const fn scaled(&self) -> i64 {
        self.0
    }
}

// =============================================================================
// Parsing and Formatting
// =============================================================================

impl FromStr for Money {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_scaled(s, Self::SCALE).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_scaled(self.0, Self::SCALE))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(ScaledVisitor::new(Self::SCALE, "a decimal amount"))
            .map(Money)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
