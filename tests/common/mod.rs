#![allow(dead_code)]

use chrono::NaiveDate;
use perpledger::domain::error::PerpLedgerError;
use perpledger::domain::intent::{Intent, IntentAction};
pub use perpledger::domain::ohlcv::OhlcvBar;
pub use perpledger::domain::position::Side;
use perpledger::domain::replay::SymbolSeries;
use perpledger::ports::data_port::DataPort;
use perpledger::ports::intent_port::IntentPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, PerpLedgerError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(PerpLedgerError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| start_date.is_none_or(|s| b.date >= s))
            .filter(|b| end_date.is_none_or(|e| b.date <= e))
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, PerpLedgerError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub struct MockIntentPort {
    pub intents: Vec<Intent>,
}

impl IntentPort for MockIntentPort {
    fn load_intents(&self) -> Result<Vec<Intent>, PerpLedgerError> {
        Ok(self.intents.clone())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(symbol: &str, date: &str, close: f64) -> OhlcvBar {
    OhlcvBar {
        symbol: symbol.to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000.0,
    }
}

/// Consecutive daily bars starting 2024-01-01.
pub fn make_bars(symbol: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            date: date(2024, 1, 1) + chrono::Duration::days(i as i64),
            ..make_bar(symbol, "2024-01-01", close)
        })
        .collect()
}

pub fn load_series(port: &dyn DataPort, symbols: &[&str]) -> Vec<SymbolSeries> {
    symbols
        .iter()
        .map(|s| SymbolSeries::new(s.to_string(), port.fetch_ohlcv(s, None, None).unwrap()))
        .collect()
}

pub fn open_intent(
    day: u32,
    symbol: &str,
    side: Side,
    quantity: f64,
    leverage: u32,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
) -> Intent {
    Intent {
        date: date(2024, 1, day),
        symbol: symbol.to_string(),
        side,
        action: IntentAction::Open {
            quantity,
            leverage,
            stop_loss,
            take_profit,
        },
        price: None,
    }
}

pub fn action_intent(day: u32, symbol: &str, side: Side, action: IntentAction) -> Intent {
    Intent {
        date: date(2024, 1, day),
        symbol: symbol.to_string(),
        side,
        action,
        price: None,
    }
}

pub fn marks(entries: &[(&str, f64)]) -> HashMap<String, f64> {
    entries
        .iter()
        .map(|(symbol, price)| (symbol.to_string(), *price))
        .collect()
}
