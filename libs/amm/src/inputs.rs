//! Helpers for user-entered amounts: balance clamping and quick-fill buttons

use ethers_core::types::U256;
use types::TOKEN_DECIMALS;

/// Never let a typed amount exceed what the account holds
pub fn clamp_to_balance(amount: U256, balance: U256) -> U256 {
    amount.min(balance)
}

/// Percentage shortcuts offered next to an amount field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuickFill {
    P25,
    P50,
    P75,
    Max,
}

impl QuickFill {
    pub const ALL: [QuickFill; 4] = [QuickFill::P25, QuickFill::P50, QuickFill::P75, QuickFill::Max];

    pub fn percent(&self) -> u64 {
        match self {
            QuickFill::P25 => 25,
            QuickFill::P50 => 50,
            QuickFill::P75 => 75,
            QuickFill::Max => 100,
        }
    }

    /// Parse a percentage (`25`, `50`, `75`, `100`) into a shortcut
    pub fn from_percent(percent: u64) -> Option<QuickFill> {
        Self::ALL.into_iter().find(|fill| fill.percent() == percent)
    }

    /// Amount this shortcut fills in for `balance`
    ///
    /// `Max` is the exact balance so dust is never left behind; the fractional
    /// shortcuts are truncated to `display_decimals` fraction digits.
    pub fn apply(&self, balance: U256, display_decimals: u32) -> U256 {
        if *self == QuickFill::Max {
            return balance;
        }
        let raw = balance / U256::from(100u8) * U256::from(self.percent())
            + balance % U256::from(100u8) * U256::from(self.percent()) / U256::from(100u8);
        truncate_to_decimals(raw, display_decimals)
    }
}

/// Drop wei digits beyond `decimals` fraction digits
pub fn truncate_to_decimals(wei: U256, decimals: u32) -> U256 {
    if decimals >= TOKEN_DECIMALS {
        return wei;
    }
    let unit = U256::exp10((TOKEN_DECIMALS - decimals) as usize);
    wei - wei % unit
}
