//! Market data port trait.

use crate::domain::error::PerpLedgerError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `symbol` sorted by date, optionally bounded on either side
    /// (inclusive).
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, PerpLedgerError>;

    fn list_symbols(&self) -> Result<Vec<String>, PerpLedgerError>;
}
