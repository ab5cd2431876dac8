//! Domain error types.

use super::position::Side;

/// Rejection of a proposed ledger mutation.
///
/// Every variant leaves the account exactly as it was before the call, so the
/// caller can adjust its parameters and retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid quantity {quantity}: must be positive and finite")]
    InvalidQuantity { quantity: f64 },

    #[error("invalid price {price}: must be positive and finite")]
    InvalidPrice { price: f64 },

    #[error("invalid leverage {leverage}: must be at least 1")]
    InvalidLeverage { leverage: u32 },

    #[error("invalid {field} level {value}: must be zero (unset) or positive")]
    InvalidLevel { field: &'static str, value: f64 },

    #[error("invalid slippage {bps} bps: must be at least 0 and below 10000")]
    InvalidSlippage { bps: f64 },

    #[error("invalid fee rate {bps} bps: must be at least 0 and below 10000")]
    InvalidFeeRate { bps: f64 },

    #[error("invalid initial cash {cash}: must be positive and finite")]
    InvalidInitialCash { cash: f64 },

    #[error("leverage limit exceeded: {leverage}x requested, maximum is {max}x")]
    LeverageLimit { leverage: u32, max: u32 },

    #[error("position count limit reached: {count} open positions, maximum is {max}")]
    MaxPositions { count: usize, max: usize },

    #[error(
        "notional limit exceeded: {notional:.2} is above {multiple}x account equity {equity:.2}"
    )]
    NotionalLimit {
        notional: f64,
        equity: f64,
        multiple: f64,
    },

    #[error("position not found: {symbol} {side}")]
    PositionNotFound { symbol: String, side: Side },

    #[error("close quantity {requested} exceeds position size {available} for {symbol} {side}")]
    QuantityExceedsPosition {
        symbol: String,
        side: Side,
        requested: f64,
        available: f64,
    },
}

/// Top-level error type for perpledger.
#[derive(Debug, thiserror::Error)]
pub enum PerpLedgerError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("intent error at line {line}: {reason}")]
    Intent { line: usize, reason: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PerpLedgerError {
    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            PerpLedgerError::Io(_) | PerpLedgerError::Csv(_) => 1,
            PerpLedgerError::ConfigParse { .. }
            | PerpLedgerError::ConfigMissing { .. }
            | PerpLedgerError::ConfigInvalid { .. } => 2,
            PerpLedgerError::Data { .. } | PerpLedgerError::Intent { .. } => 5,
            PerpLedgerError::Ledger(_) => 6,
        }
    }
}

impl From<&PerpLedgerError> for std::process::ExitCode {
    fn from(err: &PerpLedgerError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
