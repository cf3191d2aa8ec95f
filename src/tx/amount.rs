// Amount - exact fixed-point money, 8 decimal places

use bitcoin::amount::{Denomination, ParseAmountError, SignedAmount};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Base units per whole coin
pub const COIN: i64 = 100_000_000;

/// A signed fixed-point amount.
///
/// Backed by an integer count of base units (1e-8 coin), so sums over many
/// small values never drift. Parsing goes through decimal strings only.
/// Operators saturate at the i64 bounds; use the `checked_*` methods where
/// overflow must be detected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(SignedAmount);

impl Amount {
    pub const ZERO: Amount = Amount(SignedAmount::ZERO);

    /// Create from a raw count of base units
    pub const fn from_sat(sat: i64) -> Self {
        Self(SignedAmount::from_sat(sat))
    }

    /// Create from a whole number of coins
    pub fn from_coins(coins: i64) -> Self {
        Self::from_sat(coins.saturating_mul(COIN))
    }

    /// Raw count of base units
    pub fn to_sat(self) -> i64 {
        self.0.to_sat()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_negative()
    }

    pub fn is_positive(self) -> bool {
        self.0.is_positive()
    }

    pub fn is_zero(self) -> bool {
        self.to_sat() == 0
    }

    /// The whole coin supply; no single transaction may move more
    pub fn max_money() -> Amount {
        Self::from_sat(i64::try_from(bitcoin::Amount::MAX_MONEY.to_sat()).unwrap_or(i64::MAX))
    }

    /// True when the magnitude does not exceed [`Amount::max_money`]
    pub fn is_money_range(self) -> bool {
        self.to_sat().unsigned_abs() <= bitcoin::Amount::MAX_MONEY.to_sat()
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    /// Parse a decimal coin string such as `"750"` or `"-0.02"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignedAmount::from_str_in(s.trim(), Denomination::Bitcoin).map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sat = self.to_sat();
        let sign = if sat < 0 { "-" } else { "" };
        let abs = sat.unsigned_abs();
        let whole = abs / COIN as u64;
        let frac = abs % COIN as u64;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let digits = format!("{frac:08}");
            write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Self::from_sat(self.to_sat().saturating_add(rhs.to_sat()))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        *self = *self + rhs;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Self::from_sat(self.to_sat().saturating_sub(rhs.to_sat()))
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        *self = *self - rhs;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Self::from_sat(self.to_sat().saturating_neg())
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.copied().sum()
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_sat())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Amount::from_sat)
    }
}
