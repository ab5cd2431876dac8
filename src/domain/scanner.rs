//! Risk-trigger scanning.
//!
//! Scanning is read-only. The caller is expected to follow a two-step
//! protocol: scan with the latest marks, then call [`Ledger::close`] for each
//! trigger it decides to realize. Nothing is cached between scans, so a level
//! changed with `update_stop_loss` is seen by the very next scan.
//!
//! Results come back ordered by symbol, then long before short.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::ledger::Ledger;
use super::position::{Position, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    StopLoss,
    TakeProfit,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerType::StopLoss => f.write_str("stop_loss"),
            TriggerType::TakeProfit => f.write_str("take_profit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    pub symbol: String,
    pub side: Side,
    /// Position size at scan time.
    pub quantity: f64,
    pub trigger_type: TriggerType,
    /// The configured level, not the observed mark.
    pub trigger_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidationTrigger {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub liquidation_price: f64,
    pub mark: f64,
}

/// Evaluate a single position. Stop-loss wins when both levels are breached.
pub fn evaluate_position(position: &Position, mark: f64) -> Option<Trigger> {
    let (trigger_type, trigger_price) = if position.should_stop_loss(mark) {
        (TriggerType::StopLoss, position.stop_loss)
    } else if position.should_take_profit(mark) {
        (TriggerType::TakeProfit, position.take_profit)
    } else {
        return None;
    };

    Some(Trigger {
        symbol: position.symbol.clone(),
        side: position.side,
        quantity: position.quantity,
        trigger_type,
        trigger_price,
    })
}

/// Report every position whose stop-loss or take-profit is breached by its
/// symbol's mark. Positions without a mark are skipped.
pub fn check_stop_loss_take_profit(
    ledger: &Ledger,
    marks: &HashMap<String, f64>,
) -> Vec<Trigger> {
    ledger
        .iter_positions()
        .filter_map(|pos| {
            let mark = marks.get(&pos.symbol)?;
            evaluate_position(pos, *mark)
        })
        .collect()
}

/// Report every position whose mark has reached its liquidation price.
///
/// Opt-in companion to [`check_stop_loss_take_profit`]; drivers that enable
/// it process liquidations first.
pub fn check_liquidations(
    ledger: &Ledger,
    marks: &HashMap<String, f64>,
) -> Vec<LiquidationTrigger> {
    ledger
        .iter_positions()
        .filter_map(|pos| {
            let mark = *marks.get(&pos.symbol)?;
            pos.is_liquidated(mark).then(|| LiquidationTrigger {
                symbol: pos.symbol.clone(),
                side: pos.side,
                quantity: pos.quantity,
                liquidation_price: pos.liquidation_price,
                mark,
            })
        })
        .collect()
}
