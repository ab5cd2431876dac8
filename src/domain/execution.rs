//! Fill price and fee arithmetic.
//!
//! Rates are basis points (1 bps = 0.0001). Slippage always moves the fill
//! against the trader: entries pay up, exits give up.

use super::position::Side;

pub const BPS_DENOMINATOR: f64 = 10_000.0;

/// Convert basis points to a fraction.
pub fn bps_to_fraction(bps: f64) -> f64 {
    bps / BPS_DENOMINATOR
}

/// Fee on a traded value: `value * fee_rate_bps / 10000`.
pub fn calculate_fee(trade_value: f64, fee_rate_bps: f64) -> f64 {
    trade_value * bps_to_fraction(fee_rate_bps)
}

/// Opening fill. Long buys at `price * (1 + bps)`, short sells at `price * (1 - bps)`.
pub fn apply_entry_slippage(market_price: f64, side: Side, slippage_bps: f64) -> f64 {
    let slip = bps_to_fraction(slippage_bps);
    match side {
        Side::Long => market_price * (1.0 + slip),
        Side::Short => market_price * (1.0 - slip),
    }
}

/// Closing fill. Long sells at `price * (1 - bps)`, short buys back at `price * (1 + bps)`.
pub fn apply_exit_slippage(market_price: f64, side: Side, slippage_bps: f64) -> f64 {
    let slip = bps_to_fraction(slippage_bps);
    match side {
        Side::Long => market_price * (1.0 - slip),
        Side::Short => market_price * (1.0 + slip),
    }
}

/// Quantity-weighted average of an existing entry and an add-on fill.
pub fn weighted_entry_price(
    entry_price: f64,
    quantity: f64,
    fill_price: f64,
    fill_quantity: f64,
) -> f64 {
    let total = quantity + fill_quantity;
    (entry_price * quantity + fill_price * fill_quantity) / total
}
