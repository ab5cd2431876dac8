//! Position tracking: the hedged (symbol, side) book entry and closed-trade log.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::liquidation::liquidation_price;

/// Direction of a position. Longs sort before shorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }

    /// +1 for long, -1 for short; turns a price move into PnL per unit.
    pub fn direction(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Ok(Side::Long),
            "short" | "sell" => Ok(Side::Short),
            other => Err(format!("unknown side '{other}', expected long or short")),
        }
    }
}

/// Composite key of the position book. A symbol may hold one long and one short.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionKey {
    pub symbol: String,
    pub side: Side,
}

impl PositionKey {
    pub fn new(symbol: &str, side: Side) -> Self {
        PositionKey {
            symbol: symbol.to_string(),
            side,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub leverage: u32,
    pub entry_price: f64,
    pub notional: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub liquidation_price: f64,
    pub margin_used: f64,
}

impl Position {
    /// Build a fresh position; derived fields are computed from entry price,
    /// quantity and leverage.
    pub fn new(
        symbol: &str,
        side: Side,
        quantity: f64,
        leverage: u32,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Self {
        let mut position = Position {
            symbol: symbol.to_string(),
            side,
            quantity,
            leverage,
            entry_price,
            notional: 0.0,
            stop_loss,
            take_profit,
            liquidation_price: 0.0,
            margin_used: 0.0,
        };
        position.refresh_derived();
        position
    }

    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }

    /// Recompute notional, margin and liquidation price.
    ///
    /// Notional always comes from the entry price, never a mark or close price.
    pub(crate) fn refresh_derived(&mut self) {
        self.notional = self.entry_price * self.quantity;
        self.margin_used = self.notional / self.leverage as f64;
        self.liquidation_price = liquidation_price(self.entry_price, self.leverage, self.side);
    }

    /// PnL of `quantity` units moving from the entry price to `price`.
    pub fn pnl_at(&self, price: f64, quantity: f64) -> f64 {
        self.side.direction() * (price - self.entry_price) * quantity
    }

    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        self.pnl_at(mark, self.quantity)
    }

    pub fn should_stop_loss(&self, mark: f64) -> bool {
        if self.stop_loss == 0.0 {
            return false;
        }
        match self.side {
            Side::Long => mark <= self.stop_loss,
            Side::Short => mark >= self.stop_loss,
        }
    }

    pub fn should_take_profit(&self, mark: f64) -> bool {
        if self.take_profit == 0.0 {
            return false;
        }
        match self.side {
            Side::Long => mark >= self.take_profit,
            Side::Short => mark <= self.take_profit,
        }
    }

    pub fn is_liquidated(&self, mark: f64) -> bool {
        match self.side {
            Side::Long => mark <= self.liquidation_price,
            Side::Short => mark >= self.liquidation_price,
        }
    }
}

/// One realized close, full or partial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub leverage: u32,
    pub entry_price: f64,
    pub exit_price: f64,
    pub realized_pnl: f64,
    pub fee: f64,
}

impl ClosedTrade {
    /// Realized PnL after the close fee.
    pub fn net_pnl(&self) -> f64 {
        self.realized_pnl - self.fee
    }
}
