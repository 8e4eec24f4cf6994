//! Display derivatives of pool state
//!
//! Ratios are computed on the integer amounts first (scaled by 10^18 with a
//! 512-bit intermediate) and only then converted to `Decimal`, so two huge
//! reserves never lose their ratio to mantissa truncation.

use crate::fixed_point::from_wei;
use ethers_core::types::{U256, U512};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Stateless derived-value functions over pool and wallet amounts
pub struct PoolMath;

impl PoolMath {
    /// Share of the pool an added amount would represent, in percent
    ///
    /// `amount / (amount + reserve) × 100`; an empty reserve yields 0.
    pub fn percent_of_pool(amount: U256, reserve: U256) -> Decimal {
        if reserve.is_zero() {
            return Decimal::ZERO;
        }
        let denominator = U512::from(amount) + U512::from(reserve);
        Self::ratio_u512(U512::from(amount), denominator) * dec!(100)
    }

    /// Units of token B per unit of token A; 0 when `reserve_a` is 0
    pub fn exchange_rate(reserve_a: U256, reserve_b: U256) -> Decimal {
        Self::ratio(reserve_b, reserve_a)
    }

    /// Realised rate of a quote, `amount_out / amount_in`; 0 when nothing goes in
    pub fn swap_rate(amount_in: U256, amount_out: U256) -> Decimal {
        Self::ratio(amount_out, amount_in)
    }

    /// Deviation of a quote from a 1:1 exchange, in percent
    ///
    /// `(1 − out/in) × 100`; 0 when the input is 0 or no usable quote exists.
    /// Saturates at `Decimal::MIN` when the output dwarfs the input.
    pub fn price_impact(amount_in: U256, amount_out: Option<U256>) -> Decimal {
        match amount_out {
            Some(out) if !amount_in.is_zero() && !out.is_zero() => Decimal::ONE
                .checked_sub(Self::ratio(out, amount_in))
                .and_then(|deviation| deviation.checked_mul(dec!(100)))
                .unwrap_or(Decimal::MIN),
            _ => Decimal::ZERO,
        }
    }

    /// Share of total pool liquidity held as `reserve`, in percent
    ///
    /// `reserve / (reserve + other) × 100`; 0 for an empty pool.
    pub fn reserve_share(reserve: U256, other: U256) -> Decimal {
        let total = U512::from(reserve) + U512::from(other);
        Self::ratio_u512(U512::from(reserve), total) * dec!(100)
    }

    /// Token amounts returned for burning `lp_amount` LP tokens
    ///
    /// `lp × reserve / total_supply` per side, exact in integers. `(0, 0)` when
    /// the supply is 0.
    pub fn withdrawal_preview(
        lp_amount: U256,
        reserve_a: U256,
        reserve_b: U256,
        total_supply: U256,
    ) -> (U256, U256) {
        if total_supply.is_zero() {
            return (U256::zero(), U256::zero());
        }
        (
            Self::mul_div(lp_amount, reserve_a, total_supply),
            Self::mul_div(lp_amount, reserve_b, total_supply),
        )
    }

    /// `a × b / denominator` with a 512-bit intermediate, saturating at `U256::MAX`
    pub fn mul_div(a: U256, b: U256, denominator: U256) -> U256 {
        if denominator.is_zero() {
            return U256::zero();
        }
        let quotient = a.full_mul(b) / U512::from(denominator);
        U256::try_from(quotient).unwrap_or(U256::MAX)
    }

    fn ratio(numerator: U256, denominator: U256) -> Decimal {
        Self::ratio_u512(U512::from(numerator), U512::from(denominator))
    }

    /// `numerator / denominator` as a Decimal with 18 fraction digits of precision
    fn ratio_u512(numerator: U512, denominator: U512) -> Decimal {
        if denominator.is_zero() {
            return Decimal::ZERO;
        }
        let scaled = numerator * U512::from(U256::exp10(18)) / denominator;
        match U256::try_from(scaled) {
            Ok(value) => from_wei(value),
            Err(_) => Decimal::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    #[test]
    fn test_percent_of_pool() {
        assert_eq!(PoolMath::percent_of_pool(tokens(100), tokens(900)), dec!(10));
        assert_eq!(PoolMath::percent_of_pool(tokens(100), U256::zero()), Decimal::ZERO);
        assert_eq!(PoolMath::percent_of_pool(U256::zero(), tokens(5)), Decimal::ZERO);
    }

    #[test]
    fn test_exchange_rate() {
        assert_eq!(PoolMath::exchange_rate(tokens(1000), tokens(2000)), dec!(2));
        assert_eq!(PoolMath::exchange_rate(tokens(4), tokens(1)), dec!(0.25));
        assert_eq!(PoolMath::exchange_rate(U256::zero(), tokens(2000)), Decimal::ZERO);
    }

    #[test]
    fn test_exchange_rate_keeps_ratio_of_huge_reserves() {
        let a = U256::MAX / 4;
        let b = U256::MAX / 2;
        assert_eq!(PoolMath::exchange_rate(a, b), dec!(2));
    }

    #[test]
    fn test_price_impact() {
        // 10 in, 9.5 out
        let out = U256::from(95u64) * U256::exp10(17);
        assert_eq!(PoolMath::price_impact(tokens(10), Some(out)), dec!(5));
        assert_eq!(PoolMath::price_impact(U256::zero(), Some(out)), Decimal::ZERO);
        assert_eq!(PoolMath::price_impact(tokens(10), None), Decimal::ZERO);
        assert_eq!(PoolMath::price_impact(tokens(10), Some(U256::zero())), Decimal::ZERO);
    }

    #[test]
    fn test_price_impact_saturates_on_dust_input() {
        // 1 wei in against a pool drained to dust on the input side
        let impact = PoolMath::price_impact(U256::one(), Some(tokens(2_000_000_000)));
        assert_eq!(impact, Decimal::MIN);

        let impact = PoolMath::price_impact(U256::one(), Some(U256::MAX));
        assert_eq!(impact, Decimal::MIN);
    }

    #[test]
    fn test_reserve_share() {
        assert_eq!(PoolMath::reserve_share(tokens(1000), tokens(3000)), dec!(25));
        assert_eq!(PoolMath::reserve_share(tokens(3000), tokens(1000)), dec!(75));
        assert_eq!(PoolMath::reserve_share(tokens(5), U256::zero()), dec!(100));
        assert_eq!(PoolMath::reserve_share(U256::zero(), U256::zero()), Decimal::ZERO);
    }

    #[test]
    fn test_withdrawal_preview() {
        let (a, b) = PoolMath::withdrawal_preview(tokens(10), tokens(1000), tokens(2000), tokens(100));
        assert_eq!(a, tokens(100));
        assert_eq!(b, tokens(200));

        assert_eq!(
            PoolMath::withdrawal_preview(tokens(10), tokens(1000), tokens(2000), U256::zero()),
            (U256::zero(), U256::zero())
        );
    }

    #[test]
    fn test_withdrawal_preview_no_intermediate_overflow() {
        // lp × reserve exceeds 256 bits, the quotient does not
        let huge = U256::MAX / 2;
        let (a, _) = PoolMath::withdrawal_preview(huge, huge, U256::one(), huge);
        assert_eq!(a, huge);
    }
}
