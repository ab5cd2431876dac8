//! Liquidation pricing.
//!
//! Simplified bankruptcy-price model with no maintenance-margin tiers: the
//! position is liquidated once the adverse move equals the posted margin,
//! i.e. a `1 / leverage` fraction of the entry price.

use super::position::Side;

/// Price at which a position's margin is exhausted.
///
/// Long: `entry * (1 - 1/leverage)`. Short: `entry * (1 + 1/leverage)`.
/// A leverage of zero is treated as 1x; the ledger rejects it before this is
/// ever reached.
pub fn liquidation_price(entry_price: f64, leverage: u32, side: Side) -> f64 {
    let buffer = 1.0 / leverage.max(1) as f64;
    match side {
        Side::Long => entry_price * (1.0 - buffer),
        Side::Short => entry_price * (1.0 + buffer),
    }
}

/// Fractional adverse move from entry that liquidates the position.
pub fn liquidation_distance(leverage: u32) -> f64 {
    1.0 / leverage.max(1) as f64
}
