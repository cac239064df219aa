//! # Domain Types
//!
//! Invoice types shared by the sync engine and the receiving store.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────┐                       │
//! │  │                FullInvoice                   │                       │
//! │  │  ┌────────────────────┐  ┌────────────────┐  │   ┌───────────────┐  │
//! │  │  │  InvoiceHeader     │  │ InvoiceLine[]  │  │   │  FiscalData   │  │
//! │  │  │  code (PK)         │  │ invoice_code   │  │   │  name         │  │
//! │  │  │  sale/invoiced at  │  │ product  ─┐key │  │   │  address      │  │
//! │  │  │  totals, payment   │  │ line_number┘   │  │   │  tax id       │  │
//! │  │  │  TaxBreakdown[6]   │  │ quantity       │  │   │  email        │  │
//! │  │  │  customer fields ──┼──┼────────────────┼──┼──►└───────────────┘  │
//! │  │  │  printed flag      │  │ combined_with  │  │                       │
//! │  │  └────────────────────┘  └────────────────┘  │                       │
//! │  └──────────────────────────────────────────────┘                       │
//! │                                                                         │
//! │  Decimals: Money (scale 4), Quantity (scale 4), TaxRate (scale 2)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every optional field means "not applicable" when absent. Zero is a value.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::decimal::{format_scaled, parse_scaled, ScaledVisitor};
use crate::error::{DecimalError, ValidationError};
use crate::money::Money;
use crate::TAX_SLOTS;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in hundredths of a percent (basis points).
///
/// ## Why Basis Points?
/// Rates are NUMERIC(5,2) percentages in the source store.
/// 2100 bps = 21.00%
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct TaxRate(u32);

impl TaxRate {
    /// Number of fractional digits of the percentage.
    pub const SCALE: u32 = 2;

    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

impl FromStr for TaxRate {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scaled = parse_scaled(s, Self::SCALE)?;
        u32::try_from(scaled)
            .map(TaxRate)
            .map_err(|_| DecimalError::Overflow(s.trim().to_string()))
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_scaled(i64::from(self.0), Self::SCALE))
    }
}

impl Serialize for TaxRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaxRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let scaled =
            deserializer.deserialize_any(ScaledVisitor::new(Self::SCALE, "a percentage"))?;
        u32::try_from(scaled).map(TaxRate).map_err(|_| {
            serde::de::Error::custom(DecimalError::Overflow(format_scaled(scaled, Self::SCALE)))
        })
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// Line quantity in ten-thousandths (weighed goods, fractional portions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Quantity(i64);

impl Quantity {
    /// Number of fractional digits.
    pub const SCALE: u32 = 4;

    pub(crate) const FACTOR: i64 = 10_000;

    /// Creates a quantity from its raw scaled representation.
    #[inline]
    pub const fn from_scaled(scaled: i64) -> Self {
        Quantity(scaled)
    }

    /// Creates a quantity of whole units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * Self::FACTOR)
    }

    /// Returns the raw scaled value.
    #[inline]
    pub const fn scaled(&self) -> i64 {
        self.0
    }
}

impl FromStr for Quantity {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_scaled(s, Self::SCALE).map(Quantity)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_scaled(self.0, Self::SCALE))
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(ScaledVisitor::new(Self::SCALE, "a quantity"))
            .map(Quantity)
    }
}

// =============================================================================
// Flag
// =============================================================================

/// Single-character status flag (`'S'`/`'N'` in the point-of-sale store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flag(char);

impl Flag {
    /// "Sí": printed, reviewable, continues.
    pub const YES: Flag = Flag('S');
    /// "No".
    pub const NO: Flag = Flag('N');

    #[inline]
    pub const fn new(c: char) -> Self {
        Flag(c)
    }

    /// Reads a flag from a text column. Empty text is no flag at all.
    pub fn from_text(text: &str) -> Option<Self> {
        text.trim().chars().next().map(Flag)
    }

    #[inline]
    pub const fn as_char(&self) -> char {
        self.0
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Tax Breakdown
// =============================================================================

/// One taxable base / rate / tax amount component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxSlot {
    #[serde(default)]
    pub base: Option<Money>,
    #[serde(default)]
    pub rate: Option<TaxRate>,
    #[serde(default)]
    pub amount: Option<Money>,
}

impl TaxSlot {
    /// A fully populated slot.
    pub const fn new(base: Money, rate: TaxRate, amount: Money) -> Self {
        Self {
            base: Some(base),
            rate: Some(rate),
            amount: Some(amount),
        }
    }

    /// True when none of the three parts is present.
    pub fn is_empty(&self) -> bool {
        self.base.is_none() && self.rate.is_none() && self.amount.is_none()
    }

    /// Checks that a tax amount never appears without its base and rate.
    ///
    /// `position` is 1-based, matching the `base_1..base_6` column names.
    pub fn validate(&self, position: usize) -> Result<(), ValidationError> {
        if self.amount.is_some() && (self.base.is_none() || self.rate.is_none()) {
            return Err(ValidationError::Inconsistent {
                field: format!("taxes[{position}]"),
                reason: "tax amount present without base and rate".to_string(),
            });
        }
        Ok(())
    }
}

/// Up to six independent tax components of one invoice.
///
/// Serialized as a JSON array of six entries, each `null` or a slot object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxBreakdown([Option<TaxSlot>; TAX_SLOTS]);

impl TaxBreakdown {
    /// An empty breakdown (no applicable taxes).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a breakdown from raw slots, normalising all-absent slots to `None`.
    pub fn from_slots(slots: [TaxSlot; TAX_SLOTS]) -> Self {
        let mut breakdown = Self::new();
        for (index, slot) in slots.into_iter().enumerate() {
            breakdown.set(index, slot);
        }
        breakdown
    }

    /// Returns the slot at zero-based `index`, if present.
    pub fn slot(&self, index: usize) -> Option<&TaxSlot> {
        self.0.get(index).and_then(Option::as_ref)
    }

    /// Stores `slot` at zero-based `index`. Out-of-range indexes are ignored.
    pub fn set(&mut self, index: usize, slot: TaxSlot) {
        if let Some(entry) = self.0.get_mut(index) {
            *entry = if slot.is_empty() { None } else { Some(slot) };
        }
    }

    /// Every position, present or not (for column-by-column persistence).
    pub fn positions(&self) -> impl Iterator<Item = TaxSlot> + '_ {
        self.0.iter().map(|slot| slot.unwrap_or_default())
    }

    /// Present slots with their 1-based positions.
    pub fn present(&self) -> impl Iterator<Item = (usize, &TaxSlot)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (i + 1, s)))
    }

    /// Validates every present slot.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.present().try_for_each(|(position, slot)| slot.validate(position))
    }
}

// =============================================================================
// Invoice Header
// =============================================================================

/// A point-of-sale invoice header, identified by `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    /// Unique invoice code (> 0). Drives the sync checkpoint.
    pub code: i64,

    pub account: Option<String>,

    /// Date and time of the sale.
    pub sale_date: Option<NaiveDate>,
    pub sale_time: Option<NaiveTime>,

    pub total: Option<Money>,
    pub payment_method: Option<String>,
    pub seller: Option<String>,
    /// Tax amount over all slots as stored by the till.
    pub tax_total: Option<Money>,
    pub amount_paid: Option<Money>,
    pub terminal: Option<String>,
    pub transferred: Option<Flag>,

    /// Price list the sale was rung up with.
    pub price_list: String,

    #[serde(default)]
    pub taxes: TaxBreakdown,

    /// Invoice series letter.
    pub series: Flag,

    // Fiscal fields, the only mutable part after creation.
    pub customer_name: Option<String>,
    pub customer_address: Option<String>,
    pub customer_tax_id: Option<String>,
    pub customer_email: Option<String>,

    pub reviewable: Option<Flag>,
    pub printed: Option<Flag>,

    // Mixed (split) payment.
    pub mixed_payment_amount: Option<Money>,
    pub mixed_cash_amount: Option<Money>,
    pub mixed_payment_method: Option<String>,
    pub mixed_payment_method_2: Option<String>,
    pub mixed_payment_amount_2: Option<Money>,

    pub diners: Option<i32>,

    /// Official invoice number and invoicing time, distinct from the sale.
    pub invoice_number: Option<i64>,
    pub invoiced_date: Option<NaiveDate>,
    pub invoiced_time: Option<NaiveTime>,
}

impl InvoiceHeader {
    /// A header with only the required fields set.
    pub fn new(code: i64, price_list: impl Into<String>, series: Flag) -> Self {
        Self {
            code,
            account: None,
            sale_date: None,
            sale_time: None,
            total: None,
            payment_method: None,
            seller: None,
            tax_total: None,
            amount_paid: None,
            terminal: None,
            transferred: None,
            price_list: price_list.into(),
            taxes: TaxBreakdown::new(),
            series,
            customer_name: None,
            customer_address: None,
            customer_tax_id: None,
            customer_email: None,
            reviewable: None,
            printed: None,
            mixed_payment_amount: None,
            mixed_cash_amount: None,
            mixed_payment_method: None,
            mixed_payment_method_2: None,
            mixed_payment_amount_2: None,
            diners: None,
            invoice_number: None,
            invoiced_date: None,
            invoiced_time: None,
        }
    }

    /// The four customer fields as an update payload.
    pub fn fiscal_data(&self) -> FiscalData {
        FiscalData {
            customer_name: self.customer_name.clone(),
            customer_address: self.customer_address.clone(),
            customer_tax_id: self.customer_tax_id.clone(),
            customer_email: self.customer_email.clone(),
        }
    }
}

// =============================================================================
// Invoice Line
// =============================================================================

/// A line item, identified by (`invoice_code`, `product`, `line_number`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub invoice_code: i64,

    /// Whole-unit quantity kept by older till versions.
    pub legacy_units: Option<i32>,

    /// Pre-tax line amount.
    pub subtotal: Option<Money>,

    pub product_code: Option<String>,

    /// Product description as printed on the ticket.
    pub product: String,

    pub tax_rate: Option<TaxRate>,

    /// 1-based position within the invoice.
    pub line_number: i32,

    pub quantity: Option<Quantity>,

    /// Code of the product this line is combined with; empty when standalone.
    #[serde(default)]
    pub combined_with: String,

    /// Set when the next line belongs to the same combined product.
    pub continues_next: Option<Flag>,

    pub series: Option<Flag>,
}

impl InvoiceLine {
    /// A standalone line with only the identifying fields set.
    pub fn new(invoice_code: i64, line_number: i32, product: impl Into<String>) -> Self {
        Self {
            invoice_code,
            legacy_units: None,
            subtotal: None,
            product_code: None,
            product: product.into(),
            tax_rate: None,
            line_number,
            quantity: None,
            combined_with: String::new(),
            continues_next: None,
            series: None,
        }
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Header plus its lines, the unit of forwarding and persistence.
///
/// Wire form: `{ "header": {...}, "lines": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullInvoice {
    pub header: InvoiceHeader,
    #[serde(default)]
    pub lines: Vec<InvoiceLine>,
}

impl FullInvoice {
    pub fn new(header: InvoiceHeader, lines: Vec<InvoiceLine>) -> Self {
        Self { header, lines }
    }

    #[inline]
    pub fn code(&self) -> i64 {
        self.header.code
    }

    /// Sorts lines ascending by line number. Stable for equal numbers.
    pub fn sort_lines(&mut self) {
        self.lines.sort_by_key(|line| line.line_number);
    }
}

/// Customer-identifying fields, mutable after creation.
///
/// Every field is written as given: `None` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalData {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_address: Option<String>,
    #[serde(default)]
    pub customer_tax_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
}

/// Lightweight header row returned by the source poll query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub code: i64,
    pub sale_date: Option<NaiveDate>,
    pub total: Option<Money>,
}

// =============================================================================
// Unit Tests
// =============================================================================
