//! 18-decimal fixed-point conversion between `U256` wei and `Decimal`
//!
//! `Decimal` carries a 96-bit mantissa, so very large wei values lose their
//! lowest digits on the way to display. The reverse direction is exact or fails.

use ethers_core::types::U256;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;
use types::TOKEN_DECIMALS;

/// Largest mantissa a `Decimal` can hold (2^96 - 1)
const MAX_DECIMAL_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),

    #[error("amount cannot be negative")]
    Negative,

    #[error("amount has more than {max} decimal places")]
    TooPrecise { max: u32 },
}

/// Parse a user-typed decimal amount
pub fn parse_amount(input: &str) -> Result<Decimal, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let value = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| AmountError::InvalidNumber(trimmed.to_string()))?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountError::Negative);
    }
    Ok(value.normalize())
}

/// Convert a token amount to its 18-decimal integer representation
pub fn to_wei(amount: Decimal) -> Result<U256, AmountError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::Negative);
    }

    let amount = amount.normalize();
    let scale = amount.scale();
    if scale > TOKEN_DECIMALS {
        return Err(AmountError::TooPrecise {
            max: TOKEN_DECIMALS,
        });
    }

    // Non-negative and normalized, so the mantissa fits u128
    let mantissa = amount.mantissa().unsigned_abs();
    Ok(U256::from(mantissa) * U256::exp10((TOKEN_DECIMALS - scale) as usize))
}

/// Convert an 18-decimal integer to a token amount
pub fn from_wei(wei: U256) -> Decimal {
    let max = U256::from(MAX_DECIMAL_MANTISSA);
    let mut mantissa = wei;
    let mut scale = TOKEN_DECIMALS;

    while mantissa > max {
        if scale == 0 {
            return Decimal::MAX;
        }
        mantissa /= U256::from(10u8);
        scale -= 1;
    }

    Decimal::from_i128_with_scale(mantissa.as_u128() as i128, scale).normalize()
}

/// Render a wei amount with exactly `decimals` fraction digits, truncating
pub fn format_amount(wei: U256, decimals: u32) -> String {
    let value = from_wei(wei).round_dp_with_strategy(decimals, RoundingStrategy::ToZero);
    format!("{:.*}", decimals as usize, value)
}
