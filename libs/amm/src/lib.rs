//! # SimpleDEX AMM Display Math
//!
//! ## Purpose
//!
//! Pure, stateless derivations the client shows next to pool and wallet state:
//! pool share estimates, exchange rates, price impact and withdrawal previews.
//! The exchange contract owns all binding pricing; nothing here decides what a
//! transaction will actually receive.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Reserve, balance and LP snapshots from the read-state cache,
//!   user-typed amounts from interface panels
//! - **Output Destinations**: Interface panels and the CLI renderer
//! - **Precision**: On-chain integers stay `U256`; previews that feed a transaction
//!   decision use 512-bit intermediates, display ratios use `Decimal`
//!
//! ## Invariants
//!
//! - No function divides by a zero denominator; every such case is defined as zero
//! - No floating-point arithmetic touches an on-chain quantity

pub mod fixed_point;
pub mod inputs;
pub mod pool_math;

pub use fixed_point::{format_amount, from_wei, parse_amount, to_wei, AmountError};
pub use inputs::{clamp_to_balance, truncate_to_decimals, QuickFill};
pub use pool_math::PoolMath;

/// Common types for display calculations
pub use rust_decimal::Decimal;
