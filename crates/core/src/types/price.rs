//! Type-safe price representation using decimal arithmetic.
//!
//! Catalog prices are stored in the currency's standard unit (rupees). The
//! payment gateway works in the smallest unit (paise), so [`Price`] owns the
//! conversion and its rounding rule.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

/// Errors that can occur when converting a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Amounts charged to a customer cannot be negative.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
    /// A charge must be at least one minor unit.
    #[error("amount must be greater than zero: {0}")]
    NotPositive(Decimal),
    /// The amount does not fit in the gateway's integer representation.
    #[error("price is too large to charge: {0}")]
    Overflow(Decimal),
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price in Indian rupees.
    #[must_use]
    pub const fn inr(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::INR)
    }

    /// Amount in the smallest currency unit, rounded half away from zero.
    ///
    /// `₹249.99` becomes `24999`; `₹10.005` becomes `1001`.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for negative amounts and
    /// [`PriceError::Overflow`] when the result does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative(self.amount));
        }

        let scaled = self
            .amount
            .checked_mul(Decimal::from(self.currency_code.minor_unit_factor()))
            .ok_or(PriceError::Overflow(self.amount))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        scaled.to_i64().ok_or(PriceError::Overflow(self.amount))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
    }
}

/// ISO 4217 currency codes.
///
/// The storefront charges in a single currency; the enum exists so the code
/// sent to the gateway is never a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
}

impl CurrencyCode {
    /// The three-letter code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::INR => "INR",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::INR => "₹",
        }
    }

    /// Number of minor units in one major unit.
    #[must_use]
    pub const fn minor_unit_factor(self) -> i64 {
        match self {
            Self::INR => 100,
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}
