//! # Source Column Mapping
//!
//! Turns the text the operational store hands back into domain values.
//!
//! The till writes whatever its forms produced: padded strings, empty
//! strings for "nothing", REAL columns for money, and times stored as
//! full datetimes on the `1899-12-30` epoch. Every column is read as
//! `CAST(col AS TEXT)` and goes through one of the readers below.
//!
//! ```text
//! NULL / "" / "   "          → None
//! "121" "121.0" "121.0000"   → Money 121.0000
//! "12.34567" (REAL)          → Money 12.3457 (rounded to the column scale)
//! "2023-01-15"               → date 2023-01-15
//! "2023-01-15 10:00:00"      → date 2023-01-15, time 10:00:00
//! "1899-12-30 10:15:00"      → no date, time 10:15:00
//! "10:20"                    → time 10:20:00
//! anything else              → None + warn!
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use facturapid_core::decimal::{parse_scaled, parse_scaled_rounded};
use facturapid_core::{Flag, Money, Quantity, TaxRate};
use tracing::warn;

/// Date the legacy store uses for time-only values.
const TIME_ONLY_EPOCH: (i32, u32, u32) = (1899, 12, 30);

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];
const TIME_FORMATS: [&str; 3] = ["%H:%M:%S", "%H:%M", "%H:%M:%S%.f"];

/// Trims and drops empty text.
pub fn text(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses a date, or the date part of a datetime.
///
/// Values on the time-only epoch carry no date.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    let date = NaiveDate::parse_from_str(input, DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(input).map(|dt| dt.date()))?;

    if is_time_only_epoch(date) {
        None
    } else {
        Some(date)
    }
}

/// Parses a time, or the time part of a datetime.
pub fn parse_time(input: &str) -> Option<NaiveTime> {
    let input = input.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(input, fmt).ok())
        .or_else(|| parse_datetime(input).map(|dt| dt.time()))
}

fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
}

fn is_time_only_epoch(date: NaiveDate) -> bool {
    let (y, m, d) = TIME_ONLY_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d) == Some(date)
}

// =============================================================================
// Field Reader
// =============================================================================

/// Lenient per-invoice field reader.
///
/// Unparseable values become `None` and are logged with the invoice code
/// and column name, so one bad cell never drops a whole invoice.
#[derive(Debug, Clone, Copy)]
pub struct FieldReader {
    code: i64,
}

impl FieldReader {
    pub fn new(code: i64) -> Self {
        FieldReader { code }
    }

    fn reject<T>(&self, field: &str, raw: &str, reason: impl std::fmt::Display) -> Option<T> {
        warn!(code = self.code, field, raw, %reason, "Unreadable source value, treating as absent");
        None
    }

    /// Decimal column rounded to `scale`, as the NUMERIC column would be.
    fn decimal(&self, field: &str, value: Option<String>, scale: u32) -> Option<i64> {
        let raw = text(value)?;
        match parse_scaled_rounded(&raw, scale) {
            Ok(scaled) => Some(scaled),
            Err(e) => self.reject(field, &raw, e),
        }
    }

    pub fn money(&self, field: &str, value: Option<String>) -> Option<Money> {
        self.decimal(field, value, Money::SCALE).map(Money::from_scaled)
    }

    pub fn rate(&self, field: &str, value: Option<String>) -> Option<TaxRate> {
        let scaled = self.decimal(field, value, TaxRate::SCALE)?;
        match u32::try_from(scaled) {
            Ok(bps) => Some(TaxRate::from_bps(bps)),
            Err(e) => self.reject(field, &scaled.to_string(), e),
        }
    }

    pub fn quantity(&self, field: &str, value: Option<String>) -> Option<Quantity> {
        self.decimal(field, value, Quantity::SCALE).map(Quantity::from_scaled)
    }

    /// Integer column, tolerating REAL storage (`"2.0"`).
    pub fn integer(&self, field: &str, value: Option<String>) -> Option<i64> {
        let raw = text(value)?;
        match parse_scaled(&raw, 0) {
            Ok(n) => Some(n),
            Err(e) => self.reject(field, &raw, e),
        }
    }

    pub fn small_integer(&self, field: &str, value: Option<String>) -> Option<i32> {
        let n = self.integer(field, value)?;
        match i32::try_from(n) {
            Ok(n) => Some(n),
            Err(e) => self.reject(field, &n.to_string(), e),
        }
    }

    pub fn flag(&self, value: Option<String>) -> Option<Flag> {
        text(value).and_then(|t| Flag::from_text(&t))
    }

    pub fn date(&self, field: &str, value: Option<String>) -> Option<NaiveDate> {
        let raw = text(value)?;
        match parse_date(&raw) {
            Some(date) => Some(date),
            // A bare time or the epoch placeholder is "no date", not an error
            None if parse_time(&raw).is_some() => None,
            None => self.reject(field, &raw, "not a date"),
        }
    }

    pub fn time(&self, field: &str, value: Option<String>) -> Option<NaiveTime> {
        let raw = text(value)?;
        match parse_time(&raw) {
            Some(time) => Some(time),
            None if NaiveDate::parse_from_str(&raw, DATE_FORMAT).is_ok() => None,
            None => self.reject(field, &raw, "not a time"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_text() {
        assert_eq!(text(None), None);
        assert_eq!(text(s("")), None);
        assert_eq!(text(s("   ")), None);
        assert_eq!(text(s(" Efectivo  ")), s("Efectivo"));
        assert_eq!(text(s("QR")), s("QR"));
    }

    #[test]
    fn test_dates() {
        let jan15 = NaiveDate::from_ymd_opt(2023, 1, 15);
        assert_eq!(parse_date("2023-01-15"), jan15);
        assert_eq!(parse_date("2023-01-15 10:00:00"), jan15);
        assert_eq!(parse_date("2023-01-15T10:00:00"), jan15);
        assert_eq!(parse_date("1899-12-30 10:00:00"), None);
        assert_eq!(parse_date("15/01/2023"), None);
    }

    #[test]
    fn test_times() {
        let t = |h, m, s| NaiveTime::from_hms_opt(h, m, s);
        assert_eq!(parse_time("10:20"), t(10, 20, 0));
        assert_eq!(parse_time("10:20:05"), t(10, 20, 5));
        assert_eq!(parse_time("1899-12-30 10:15:00"), t(10, 15, 0));
        assert_eq!(parse_time("2023-01-15 09:05"), t(9, 5, 0));
        assert_eq!(parse_time("25:00"), None);
    }

    #[test]
    fn test_field_reader_decimals() {
        let r = FieldReader::new(1);
        assert_eq!(r.money("total", s("121")), Some(Money::from_units(121)));
        assert_eq!(r.money("total", s("60.5")), Some(Money::from_scaled(605_000)));
        assert_eq!(r.money("total", s("n/a")), None);
        assert_eq!(r.money("total", None), None);

        assert_eq!(r.rate("rate_1", s("21.0")), Some(TaxRate::from_bps(2100)));
        assert_eq!(r.quantity("quantity", s("2")), Some(Quantity::from_units(2)));
    }

    #[test]
    fn test_field_reader_rounds_real_columns() {
        let r = FieldReader::new(1);
        assert_eq!(r.money("total", s("12.34567")), Some(Money::from_scaled(123_457)));
        assert_eq!(r.money("total", s("-0.00005")), Some(Money::from_scaled(-1)));
        assert_eq!(r.rate("rate_1", s("20.999")), Some(TaxRate::from_bps(2100)));
        assert_eq!(r.quantity("quantity", s("0.33333333")), Some(Quantity::from_scaled(3_333)));
        assert_eq!(r.rate("rate_1", s("-21")), None);
    }

    #[test]
    fn test_field_reader_integers() {
        let r = FieldReader::new(1);
        assert_eq!(r.integer("invoice_number", s("17")), Some(17));
        assert_eq!(r.integer("invoice_number", s("17.0")), Some(17));
        assert_eq!(r.integer("invoice_number", s("17.5")), None);
        assert_eq!(r.small_integer("diners", s("4")), Some(4));
        assert_eq!(r.small_integer("diners", s("99999999999")), None);
    }

    #[test]
    fn test_field_reader_dates_and_flags() {
        let r = FieldReader::new(1);
        assert_eq!(r.date("sale_date", s("10:00")), None);
        assert_eq!(r.time("sale_time", s("2023-01-15")), None);
        assert_eq!(
            r.time("sale_time", s("1899-12-30 10:20:00")),
            NaiveTime::from_hms_opt(10, 20, 0)
        );

        assert_eq!(r.flag(s(" S ")), Some(Flag::YES));
        assert_eq!(r.flag(s("")), None);
    }
}
