//! Trading intents: the instructions a decision engine hands to the ledger.
//!
//! The engine that produces them lives outside this crate. Intents only say
//! what to do; the ledger still decides whether it is allowed.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use super::ledger::OpenRequest;
use super::position::Side;

#[derive(Debug, Clone, PartialEq)]
pub enum IntentAction {
    Open {
        quantity: f64,
        leverage: u32,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    },
    /// `None` closes the whole position.
    Close { quantity: Option<f64> },
    UpdateStopLoss { level: f64 },
    UpdateTakeProfit { level: f64 },
}

impl IntentAction {
    pub fn kind(&self) -> IntentKind {
        match self {
            IntentAction::Open { .. } => IntentKind::Open,
            IntentAction::Close { .. } => IntentKind::Close,
            IntentAction::UpdateStopLoss { .. } => IntentKind::UpdateStopLoss,
            IntentAction::UpdateTakeProfit { .. } => IntentKind::UpdateTakeProfit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Open,
    Close,
    UpdateStopLoss,
    UpdateTakeProfit,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntentKind::Open => "open",
            IntentKind::Close => "close",
            IntentKind::UpdateStopLoss => "update_stop_loss",
            IntentKind::UpdateTakeProfit => "update_take_profit",
        };
        f.write_str(s)
    }
}

impl FromStr for IntentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(IntentKind::Open),
            "close" => Ok(IntentKind::Close),
            "update_stop_loss" | "stop_loss" => Ok(IntentKind::UpdateStopLoss),
            "update_take_profit" | "take_profit" => Ok(IntentKind::UpdateTakeProfit),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub date: NaiveDate,
    pub symbol: String,
    pub side: Side,
    pub action: IntentAction,
    /// Execution price; the driver substitutes the bar's mark when absent.
    pub price: Option<f64>,
}

impl Intent {
    /// Build the ledger request for an `Open` intent at `price`.
    pub fn open_request(&self, price: f64) -> Option<OpenRequest> {
        match self.action {
            IntentAction::Open {
                quantity,
                leverage,
                stop_loss,
                take_profit,
            } => Some(OpenRequest {
                symbol: self.symbol.clone(),
                side: self.side,
                quantity,
                leverage,
                price,
                stop_loss,
                take_profit,
                slippage_bps: None,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.date,
            self.action.kind(),
            self.symbol,
            self.side
        )
    }
}
