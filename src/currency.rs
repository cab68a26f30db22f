// src/currency.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::EconomyError;

/// Minor units (cents) in one currency unit.
pub const MINOR_PER_UNIT: i64 = 100;

/// A real-currency amount held as an integer count of minor units.
///
/// Amounts are produced by rounding exactly once from a coin integer (see
/// [`crate::conversion::ExchangeRate`]); `Currency` itself does no lossy
/// arithmetic. Serialized as the raw minor-unit integer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Currency(i64);

impl Currency {
    pub const ZERO: Currency = Currency(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Whole currency units, e.g. `from_major(50)` is 50.00.
    pub const fn from_major(units: i64) -> Self {
        Self(units * MINOR_PER_UNIT)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Lossy float view for display layers only.
    pub fn to_display(self) -> f64 {
        self.0 as f64 / MINOR_PER_UNIT as f64
    }

    /// Distance between two amounts in minor units.
    pub fn abs_diff(self, other: Currency) -> u64 {
        self.0.abs_diff(other.0)
    }

    pub fn checked_add(self, other: Currency) -> Option<Currency> {
        self.0.checked_add(other.0).map(Currency)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_UNIT as u64;
        write!(f, "{}{}.{:02}", sign, abs / per, abs % per)
    }
}

impl FromStr for Currency {
    type Err = EconomyError;

    /// Parses plain decimal text: an optional `-`, whole digits, and at most
    /// two fraction digits (`"50"`, `"4.5"`, `"128.21"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        if whole.is_empty()
            || fraction.len() > 2
            || (digits.contains('.') && fraction.is_empty())
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(EconomyError::InvalidAmount);
        }

        let whole: i64 = whole.parse().map_err(|_| EconomyError::InvalidAmount)?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| EconomyError::InvalidAmount)? * 10,
            _ => fraction.parse().map_err(|_| EconomyError::InvalidAmount)?,
        };

        let minor = whole
            .checked_mul(MINOR_PER_UNIT)
            .and_then(|m| m.checked_add(fraction))
            .ok_or(EconomyError::InvalidAmount)?;

        Ok(Currency(if negative { -minor } else { minor }))
    }
}
