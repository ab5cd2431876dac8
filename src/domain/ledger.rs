//! Leveraged trading account: cash, the hedged position book, and the
//! open/close/update operations that keep them consistent.
//!
//! The ledger is plain in-memory state with no interior synchronization. One
//! driver owns it and calls it sequentially; sharing it across threads needs
//! an external mutex around each call.
//!
//! Every mutating operation validates first and mutates last, so a returned
//! [`LedgerError`] always means the account is exactly as it was.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::error::LedgerError;
use super::execution::{
    BPS_DENOMINATOR, apply_entry_slippage, apply_exit_slippage, calculate_fee,
    weighted_entry_price,
};
use super::position::{ClosedTrade, Position, PositionKey, Side};

pub const MAX_LEVERAGE: u32 = 100;
pub const MAX_POSITIONS: usize = 20;
/// Cap on a single fill's notional as a multiple of current equity.
pub const MAX_NOTIONAL_EQUITY_MULTIPLE: f64 = 50.0;
/// Relative tolerance when deciding a close consumes the whole position.
pub const QUANTITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub initial_cash: f64,
    pub fee_rate_bps: f64,
    pub slippage_bps: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            initial_cash: 10_000.0,
            fee_rate_bps: 0.0,
            slippage_bps: 0.0,
        }
    }
}

/// Instruction to open a position or add to an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub leverage: u32,
    pub price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Overrides the ledger's configured slippage for this fill only.
    pub slippage_bps: Option<f64>,
}

impl OpenRequest {
    pub fn new(symbol: &str, side: Side, quantity: f64, leverage: u32, price: f64) -> Self {
        OpenRequest {
            symbol: symbol.to_string(),
            side,
            quantity,
            leverage,
            price,
            stop_loss: None,
            take_profit: None,
            slippage_bps: None,
        }
    }

    pub fn with_stop_loss(mut self, stop_loss: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_take_profit(mut self, take_profit: f64) -> Self {
        self.take_profit = Some(take_profit);
        self
    }

    pub fn with_slippage_bps(mut self, bps: f64) -> Self {
        self.slippage_bps = Some(bps);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenOutcome {
    /// State of the position after the fill.
    pub position: Position,
    pub fee: f64,
    /// Slippage-adjusted price of this fill.
    pub fill_price: f64,
    pub fill_notional: f64,
    /// True when the fill was added to an existing position.
    pub added: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseOutcome {
    pub quantity: f64,
    pub fill_price: f64,
    pub realized_pnl: f64,
    pub fee: f64,
    /// Remaining position after a partial close; `None` once fully closed.
    pub remaining: Option<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquitySnapshot {
    pub cash: f64,
    pub unrealized_pnl: f64,
    pub equity: f64,
    pub margin_used: f64,
    /// Margin used as a percentage of equity; zero when equity is not positive.
    pub margin_used_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    cash: f64,
    initial_cash: f64,
    fee_rate_bps: f64,
    slippage_bps: f64,
    fees_paid: f64,
    positions: BTreeMap<PositionKey, Position>,
    closed_trades: Vec<ClosedTrade>,
}

impl LedgerConfig {
    /// Range-check the account parameters the ledger is built from.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(LedgerError::InvalidInitialCash {
                cash: self.initial_cash,
            });
        }
        if !valid_bps(self.fee_rate_bps) {
            return Err(LedgerError::InvalidFeeRate {
                bps: self.fee_rate_bps,
            });
        }
        if !valid_bps(self.slippage_bps) {
            return Err(LedgerError::InvalidSlippage {
                bps: self.slippage_bps,
            });
        }
        Ok(())
    }
}

impl Ledger {
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Ledger {
            cash: config.initial_cash,
            initial_cash: config.initial_cash,
            fee_rate_bps: config.fee_rate_bps,
            slippage_bps: config.slippage_bps,
            fees_paid: 0.0,
            positions: BTreeMap::new(),
            closed_trades: Vec::new(),
        })
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn slippage_bps(&self) -> f64 {
        self.slippage_bps
    }

    /// Total fees debited so far, opens and closes.
    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    pub fn position(&self, symbol: &str, side: Side) -> Option<&Position> {
        self.positions.get(&PositionKey::new(symbol, side))
    }

    pub fn has_position(&self, symbol: &str, side: Side) -> bool {
        self.positions.contains_key(&PositionKey::new(symbol, side))
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Snapshot of every open position, ordered by symbol then side.
    pub fn positions(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    pub(crate) fn iter_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    /// Open a position, or add to the existing one for the same (symbol, side).
    ///
    /// Adds re-average the entry price by quantity, take the leverage of this
    /// call, and overwrite stop-loss/take-profit with this call's values
    /// (an omitted level clears it).
    pub fn open(&mut self, request: &OpenRequest) -> Result<OpenOutcome, LedgerError> {
        if request.leverage > MAX_LEVERAGE {
            return Err(LedgerError::LeverageLimit {
                leverage: request.leverage,
                max: MAX_LEVERAGE,
            });
        }
        validate_quantity(request.quantity)?;
        validate_price(request.price)?;
        if request.leverage == 0 {
            return Err(LedgerError::InvalidLeverage {
                leverage: request.leverage,
            });
        }
        let stop_loss = validate_level("stop_loss", request.stop_loss.unwrap_or(0.0))?;
        let take_profit = validate_level("take_profit", request.take_profit.unwrap_or(0.0))?;
        let slippage_bps = match request.slippage_bps {
            Some(bps) if !valid_bps(bps) => return Err(LedgerError::InvalidSlippage { bps }),
            Some(bps) => bps,
            None => self.slippage_bps,
        };

        let key = PositionKey::new(&request.symbol, request.side);
        let exists = self.positions.contains_key(&key);
        if !exists && self.positions.len() >= MAX_POSITIONS {
            return Err(LedgerError::MaxPositions {
                count: self.positions.len(),
                max: MAX_POSITIONS,
            });
        }

        let fill_price = apply_entry_slippage(request.price, request.side, slippage_bps);
        let fill_notional = fill_price * request.quantity;

        // Pre-trade equity with the reference price as this symbol's mark.
        let marks = HashMap::from([(request.symbol.clone(), request.price)]);
        let equity = self.total_equity(&marks).equity;
        if fill_notional > MAX_NOTIONAL_EQUITY_MULTIPLE * equity {
            return Err(LedgerError::NotionalLimit {
                notional: fill_notional,
                equity,
                multiple: MAX_NOTIONAL_EQUITY_MULTIPLE,
            });
        }

        let fee = calculate_fee(fill_notional, self.fee_rate_bps);
        self.cash -= fee;
        self.fees_paid += fee;

        let position = match self.positions.entry(key) {
            Entry::Occupied(mut occupied) => {
                let pos = occupied.get_mut();
                pos.entry_price = weighted_entry_price(
                    pos.entry_price,
                    pos.quantity,
                    fill_price,
                    request.quantity,
                );
                pos.quantity += request.quantity;
                pos.leverage = request.leverage;
                pos.stop_loss = stop_loss;
                pos.take_profit = take_profit;
                pos.refresh_derived();
                pos.clone()
            }
            Entry::Vacant(vacant) => vacant
                .insert(Position::new(
                    &request.symbol,
                    request.side,
                    request.quantity,
                    request.leverage,
                    fill_price,
                    stop_loss,
                    take_profit,
                ))
                .clone(),
        };

        debug!(
            symbol = %position.symbol,
            side = %position.side,
            quantity = request.quantity,
            fill_price,
            fee,
            added = exists,
            "opened position"
        );

        Ok(OpenOutcome {
            position,
            fee,
            fill_price,
            fill_notional,
            added: exists,
        })
    }

    /// Close all or part of a position at `price` (before exit slippage).
    ///
    /// A partial close keeps the entry price and leverage and recomputes
    /// notional and margin from the remaining quantity.
    pub fn close(
        &mut self,
        symbol: &str,
        side: Side,
        quantity: f64,
        price: f64,
    ) -> Result<CloseOutcome, LedgerError> {
        validate_quantity(quantity)?;
        validate_price(price)?;

        let key = PositionKey::new(symbol, side);
        let Some(pos) = self.positions.get_mut(&key) else {
            return Err(LedgerError::PositionNotFound {
                symbol: symbol.to_string(),
                side,
            });
        };

        let tolerance = QUANTITY_EPSILON * pos.quantity.max(1.0);
        if quantity > pos.quantity + tolerance {
            return Err(LedgerError::QuantityExceedsPosition {
                symbol: symbol.to_string(),
                side,
                requested: quantity,
                available: pos.quantity,
            });
        }
        let full_close = pos.quantity - quantity <= tolerance;
        let closed_quantity = if full_close { pos.quantity } else { quantity };

        let fill_price = apply_exit_slippage(price, side, self.slippage_bps);
        let realized_pnl = pos.pnl_at(fill_price, closed_quantity);
        let fee = calculate_fee(fill_price * closed_quantity, self.fee_rate_bps);

        self.closed_trades.push(ClosedTrade {
            symbol: pos.symbol.clone(),
            side,
            quantity: closed_quantity,
            leverage: pos.leverage,
            entry_price: pos.entry_price,
            exit_price: fill_price,
            realized_pnl,
            fee,
        });
        self.cash += realized_pnl - fee;
        self.fees_paid += fee;

        let remaining = if full_close {
            self.positions.remove(&key);
            None
        } else {
            pos.quantity -= closed_quantity;
            pos.notional = pos.entry_price * pos.quantity;
            pos.margin_used = pos.notional / pos.leverage as f64;
            Some(pos.clone())
        };

        debug!(
            symbol,
            side = %side,
            quantity = closed_quantity,
            fill_price,
            realized_pnl,
            fee,
            full_close,
            "closed position"
        );

        Ok(CloseOutcome {
            quantity: closed_quantity,
            fill_price,
            realized_pnl,
            fee,
            remaining,
        })
    }

    /// Set the stop-loss level; `0.0` clears it. Not checked against any price.
    pub fn update_stop_loss(
        &mut self,
        symbol: &str,
        side: Side,
        stop_loss: f64,
    ) -> Result<(), LedgerError> {
        let level = validate_level("stop_loss", stop_loss)?;
        let pos = self.position_mut(symbol, side)?;
        pos.stop_loss = level;
        debug!(symbol, side = %side, stop_loss = level, "updated stop-loss");
        Ok(())
    }

    /// Set the take-profit level; `0.0` clears it. Not checked against any price.
    pub fn update_take_profit(
        &mut self,
        symbol: &str,
        side: Side,
        take_profit: f64,
    ) -> Result<(), LedgerError> {
        let level = validate_level("take_profit", take_profit)?;
        let pos = self.position_mut(symbol, side)?;
        pos.take_profit = level;
        debug!(symbol, side = %side, take_profit = level, "updated take-profit");
        Ok(())
    }

    /// Mark the book to `marks`. Symbols without a mark are valued at entry.
    pub fn total_equity(&self, marks: &HashMap<String, f64>) -> EquitySnapshot {
        let (unrealized_pnl, margin_used) = self.positions.values().fold(
            (0.0_f64, 0.0_f64),
            |(pnl, margin), pos| {
                let mark = marks.get(&pos.symbol).copied().unwrap_or(pos.entry_price);
                (pnl + pos.unrealized_pnl(mark), margin + pos.margin_used)
            },
        );

        let equity = self.cash + unrealized_pnl;
        let margin_used_pct = if equity > 0.0 {
            margin_used / equity * 100.0
        } else {
            0.0
        };

        EquitySnapshot {
            cash: self.cash,
            unrealized_pnl,
            equity,
            margin_used,
            margin_used_pct,
        }
    }

    fn position_mut(&mut self, symbol: &str, side: Side) -> Result<&mut Position, LedgerError> {
        self.positions
            .get_mut(&PositionKey::new(symbol, side))
            .ok_or_else(|| LedgerError::PositionNotFound {
                symbol: symbol.to_string(),
                side,
            })
    }
}

fn valid_bps(bps: f64) -> bool {
    bps.is_finite() && (0.0..BPS_DENOMINATOR).contains(&bps)
}

fn validate_quantity(quantity: f64) -> Result<(), LedgerError> {
    if quantity.is_finite() && quantity > 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidQuantity { quantity })
    }
}

fn validate_price(price: f64) -> Result<(), LedgerError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidPrice { price })
    }
}

fn validate_level(field: &'static str, value: f64) -> Result<f64, LedgerError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(LedgerError::InvalidLevel { field, value })
    }
}
