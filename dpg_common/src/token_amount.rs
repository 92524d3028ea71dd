use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// The number of decimal places of the deposit token contract. Amounts are carried as integer base
/// units everywhere; this constant only matters when rendering them for humans.
pub const TOKEN_DECIMALS: u32 = 6;
pub const TOKEN_SYMBOL: &str = "USDX";

//--------------------------------------    TokenAmount     -----------------------------------------------------------
/// An exact token amount in base units (i.e. the raw integer value emitted by the token contract).
///
/// All arithmetic in the gateway happens on this type. There is deliberately no floating-point
/// representation anywhere in the credit path; converting to a decimal string is display-only.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct TokenAmount(i64);

op!(binary TokenAmount, Add, add);
op!(binary TokenAmount, Sub, sub);
op!(inplace TokenAmount, AddAssign, add_assign);
op!(inplace TokenAmount, SubAssign, sub_assign);
op!(unary TokenAmount, Neg, neg);

impl Mul<i64> for TokenAmount {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for TokenAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a token amount: {0}")]
pub struct AmountConversionError(pub String);

impl From<i64> for TokenAmount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for TokenAmount {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for TokenAmount {}

impl TryFrom<u64> for TokenAmount {
    type Error = AmountConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(AmountConversionError(format!("Value {value} is too large to convert to TokenAmount")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl TryFrom<u128> for TokenAmount {
    type Error = AmountConversionError;

    fn try_from(value: u128) -> Result<Self, Self::Error> {
        if value > i64::MAX as u128 {
            Err(AmountConversionError(format!("Value {value} is too large to convert to TokenAmount")))
        } else {
            #[allow(clippy::cast_possible_truncation)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.unsigned_abs() < 10_000 {
            write!(f, "{}u", self.0)
        } else {
            // Lossy, but only ever used for log and UI output.
            let tokens = self.0 as f64 / 10f64.powi(TOKEN_DECIMALS as i32);
            write!(f, "{tokens:0.3} {TOKEN_SYMBOL}")
        }
    }
}

impl TokenAmount {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Converts a whole-token value into base units.
    pub fn from_tokens(tokens: i64) -> Self {
        Self(tokens * 10i64.pow(TOKEN_DECIMALS))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic_is_exact() {
        let a = TokenAmount::from(1_000_001);
        let b = TokenAmount::from(999_999);
        assert_eq!((a + b).value(), 2_000_000);
        assert_eq!((a - b).value(), 2);
        assert_eq!((-b).value(), -999_999);
        let total: TokenAmount = vec![a, b, TokenAmount::from(1)].into_iter().sum();
        assert_eq!(total.value(), 2_000_001);
    }

    #[test]
    fn from_tokens_scales_by_decimals() {
        assert_eq!(TokenAmount::from_tokens(25).value(), 25_000_000);
    }

    #[test]
    fn u128_conversion_rejects_overflow() {
        let too_big = i64::MAX as u128 + 1;
        assert!(TokenAmount::try_from(too_big).is_err());
        assert_eq!(TokenAmount::try_from(42u128).unwrap().value(), 42);
    }

    #[test]
    fn display_scales_large_values() {
        assert_eq!(TokenAmount::from(500).to_string(), "500u");
        assert_eq!(TokenAmount::from(12_500_000).to_string(), "12.500 USDX");
    }
}
