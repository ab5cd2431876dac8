//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod execution;
pub mod intent;
pub mod ledger;
pub mod liquidation;
pub mod metrics;
pub mod ohlcv;
pub mod position;
pub mod replay;
pub mod scanner;
