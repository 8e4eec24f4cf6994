//! Derived-Value Property Tests
//!
//! Properties that must hold for any pool or wallet state the ledger can
//! report, including empty pools and amounts near the top of the U256 range.

use ethers_core::types::U256;
use proptest::prelude::*;
use rust_decimal::Decimal;
use simpledex_amm::{clamp_to_balance, from_wei, to_wei, PoolMath, QuickFill};

fn any_u256() -> impl Strategy<Value = U256> {
    prop::array::uniform4(any::<u64>()).prop_map(U256)
}

fn token_amount() -> impl Strategy<Value = U256> {
    // Anything below 2^96 wei fits a Decimal mantissa at full scale
    (0u128..79_228_162_514_264_337_593_543_950_335u128).prop_map(U256::from)
}

proptest! {
    /// Property: an empty reserve A never yields a non-zero or non-finite rate
    #[test]
    fn exchange_rate_zero_when_reserve_a_empty(reserve_b in any_u256()) {
        prop_assert_eq!(PoolMath::exchange_rate(U256::zero(), reserve_b), Decimal::ZERO);
    }

    /// Property: the rate is defined for every reserve pair
    #[test]
    fn exchange_rate_never_negative(reserve_a in any_u256(), reserve_b in any_u256()) {
        let rate = PoolMath::exchange_rate(reserve_a, reserve_b);
        prop_assert!(rate >= Decimal::ZERO);
    }

    /// Property: a pool share is a percentage
    #[test]
    fn percent_of_pool_bounded(amount in any_u256(), reserve in any_u256()) {
        let share = PoolMath::percent_of_pool(amount, reserve);
        prop_assert!(share >= Decimal::ZERO);
        prop_assert!(share <= Decimal::ONE_HUNDRED);
    }

    /// Property: price impact is defined for every input and quote, and never exceeds 100%
    #[test]
    fn price_impact_total(amount_in in any_u256(), amount_out in any_u256()) {
        let impact = PoolMath::price_impact(amount_in, Some(amount_out));
        prop_assert!(impact <= Decimal::ONE_HUNDRED);
    }

    /// Property: the two reserve shares of a non-empty pool cover it
    #[test]
    fn reserve_shares_bounded(reserve_a in any_u256(), reserve_b in any_u256()) {
        let share_a = PoolMath::reserve_share(reserve_a, reserve_b);
        let share_b = PoolMath::reserve_share(reserve_b, reserve_a);
        prop_assert!(share_a >= Decimal::ZERO && share_a <= Decimal::ONE_HUNDRED);
        prop_assert!(share_a + share_b <= Decimal::ONE_HUNDRED);
    }

    /// Property: no withdrawal preview pays out more than the pool holds
    #[test]
    fn withdrawal_bounded_by_reserves(
        supply in 1u128..u128::MAX,
        lp_fraction in 0u32..=10_000,
        reserve_a in any_u256(),
        reserve_b in any_u256(),
    ) {
        let supply = U256::from(supply);
        let lp = supply * U256::from(lp_fraction) / U256::from(10_000u32);
        let (out_a, out_b) = PoolMath::withdrawal_preview(lp, reserve_a, reserve_b, supply);
        prop_assert!(out_a <= reserve_a);
        prop_assert!(out_b <= reserve_b);
    }

    /// Property: clamped amounts never exceed the balance
    #[test]
    fn clamp_never_exceeds_balance(amount in any_u256(), balance in any_u256()) {
        let clamped = clamp_to_balance(amount, balance);
        prop_assert!(clamped <= balance);
        prop_assert!(clamped <= amount);
    }

    /// Property: every quick-fill stays within the balance
    #[test]
    fn quick_fill_within_balance(balance in any_u256(), decimals in 0u32..=18) {
        for fill in QuickFill::ALL {
            prop_assert!(fill.apply(balance, decimals) <= balance);
        }
    }

    /// Property: display conversion is exact for amounts that fit a Decimal mantissa
    #[test]
    fn wei_conversion_exact_below_mantissa_limit(wei in token_amount()) {
        prop_assert_eq!(to_wei(from_wei(wei)).unwrap(), wei);
    }
}
