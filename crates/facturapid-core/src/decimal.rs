//! # Fixed-Scale Decimal Helpers
//!
//! Shared parsing and formatting for [`Money`](crate::money::Money),
//! [`TaxRate`](crate::types::TaxRate) and [`Quantity`](crate::types::Quantity).
//!
//! Every decimal in the system is an `i64` holding the value multiplied by
//! `10^scale`. Text is the only way in: there are no float constructors.
//!
//! ```text
//!   "121.00"  ──parse_scaled(_, 4)──►  1_210_000  ──format_scaled(_, 4)──►  "121.0000"
//!   "-0.5"    ──parse_scaled(_, 2)──►        -50  ──format_scaled(_, 2)──►  "-0.50"
//! ```

use std::fmt;

use serde::de::{self, Visitor};

use crate::error::DecimalError;

/// Parses a plain decimal string (`[+-]digits[.digits]`) into a scaled integer.
///
/// Extra fractional digits are accepted only when they are zeros, so
/// `"1.50000"` parses at scale 4 but `"1.23456"` does not.
pub fn parse_scaled(input: &str, scale: u32) -> Result<i64, DecimalError> {
    parse(input, scale, false)
}

/// Like [`parse_scaled`], but rounds extra fractional digits half away
/// from zero instead of rejecting them.
///
/// For reading REAL columns of the operational store, which hold values
/// such as `12.34567` that the NUMERIC(12,4) schema would have rounded.
pub fn parse_scaled_rounded(input: &str, scale: u32) -> Result<i64, DecimalError> {
    parse(input, scale, true)
}

fn parse(input: &str, scale: u32, round: bool) -> Result<i64, DecimalError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DecimalError::Empty);
    }

    let (negative, unsigned) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part) {
        return Err(DecimalError::Malformed(trimmed.to_string()));
    }

    let scale_len = scale as usize;
    let (kept, dropped) = if frac_part.len() > scale_len {
        frac_part.split_at(scale_len)
    } else {
        (frac_part, "")
    };
    if !round && dropped.bytes().any(|b| b != b'0') {
        return Err(DecimalError::TooPrecise {
            input: trimmed.to_string(),
            scale,
        });
    }
    let round_up = round && dropped.bytes().next().is_some_and(|b| b >= b'5');

    let overflow = || DecimalError::Overflow(trimmed.to_string());

    let mut whole: i64 = 0;
    for digit in int_part.bytes() {
        whole = whole
            .checked_mul(10)
            .and_then(|v| v.checked_add(i64::from(digit - b'0')))
            .ok_or_else(overflow)?;
    }

    let mut fraction: i64 = 0;
    for digit in kept.bytes() {
        fraction = fraction * 10 + i64::from(digit - b'0');
    }
    fraction *= 10_i64.pow(scale - kept.len() as u32);

    let value = whole
        .checked_mul(10_i64.pow(scale))
        .and_then(|v| v.checked_add(fraction))
        .and_then(|v| v.checked_add(i64::from(round_up)))
        .ok_or_else(overflow)?;

    Ok(if negative { -value } else { value })
}

/// Formats a scaled integer with exactly `scale` fractional digits.
pub fn format_scaled(value: i64, scale: u32) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    if scale == 0 {
        return format!("{sign}{abs}");
    }
    let factor = 10_u64.pow(scale);
    format!(
        "{sign}{}.{:0width$}",
        abs / factor,
        abs % factor,
        width = scale as usize
    )
}

// =============================================================================
// Serde Support
// =============================================================================

/// Deserializes a scaled decimal from a JSON string or number.
///
/// Strings are the canonical wire form. Numbers are accepted for lenient
/// clients; floats go through their shortest round-trip text form so no
/// binary floating-point arithmetic touches the value.
pub(crate) struct ScaledVisitor {
    scale: u32,
    expecting: &'static str,
}

impl ScaledVisitor {
    pub(crate) const fn new(scale: u32, expecting: &'static str) -> Self {
        Self { scale, expecting }
    }
}

impl<'de> Visitor<'de> for ScaledVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expecting)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        parse_scaled(v, self.scale).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        v.checked_mul(10_i64.pow(self.scale))
            .ok_or_else(|| E::custom(DecimalError::Overflow(v.to_string())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        let signed =
            i64::try_from(v).map_err(|_| E::custom(DecimalError::Overflow(v.to_string())))?;
        self.visit_i64(signed)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
        if !v.is_finite() {
            return Err(E::custom(DecimalError::Malformed(v.to_string())));
        }
        parse_scaled(&v.to_string(), self.scale).map_err(E::custom)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
