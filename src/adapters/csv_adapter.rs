//! CSV file adapters for bars and intents.
//!
//! Bars live one file per symbol, `<dir>/<SYMBOL>.csv`, with a
//! `date,open,high,low,close,volume` header. Intents come from a single file
//! with a `date,symbol,side,action,quantity,leverage,price,stop_loss,take_profit`
//! header; unused columns may be left empty.

use crate::domain::error::PerpLedgerError;
use crate::domain::intent::{Intent, IntentAction, IntentKind};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::position::Side;
use crate::ports::data_port::DataPort;
use crate::ports::intent_port::IntentPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

fn parse_field<T: FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
) -> Result<T, PerpLedgerError>
where
    T::Err: std::fmt::Display,
{
    record
        .get(idx)
        .ok_or_else(|| PerpLedgerError::Data {
            reason: format!("missing {name} column"),
        })?
        .trim()
        .parse()
        .map_err(|e| PerpLedgerError::Data {
            reason: format!("invalid {name} value: {e}"),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, PerpLedgerError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| PerpLedgerError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| PerpLedgerError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let date_str = record.get(0).ok_or_else(|| PerpLedgerError::Data {
                reason: "missing date column".into(),
            })?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                PerpLedgerError::Data {
                    reason: format!("invalid date format '{date_str}': {e}"),
                }
            })?;

            if start_date.is_some_and(|s| date < s) || end_date.is_some_and(|e| date > e) {
                continue;
            }

            let bar = OhlcvBar {
                symbol: symbol.to_string(),
                date,
                open: parse_field(&record, 1, "open")?,
                high: parse_field(&record, 2, "high")?,
                low: parse_field(&record, 3, "low")?,
                close: parse_field(&record, 4, "close")?,
                volume: parse_field(&record, 5, "volume")?,
            };
            if !bar.is_consistent() {
                return Err(PerpLedgerError::Data {
                    reason: format!("inconsistent bar for {symbol} on {date}"),
                });
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, PerpLedgerError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| PerpLedgerError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PerpLedgerError::Data {
                reason: format!("directory entry error: {e}"),
            })?;
            let name = entry.file_name();
            if let Some(symbol) = name.to_string_lossy().strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[derive(Debug, Deserialize)]
struct IntentRow {
    date: String,
    symbol: String,
    side: String,
    action: String,
    quantity: Option<f64>,
    leverage: Option<u32>,
    price: Option<f64>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
}

impl IntentRow {
    fn into_intent(self, line: usize) -> Result<Intent, PerpLedgerError> {
        let invalid = |reason: String| PerpLedgerError::Intent { line, reason };

        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|e| invalid(format!("invalid date '{}': {e}", self.date)))?;
        let symbol = self.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(invalid("empty symbol".into()));
        }
        let side: Side = self.side.parse().map_err(invalid)?;
        let kind: IntentKind = self.action.parse().map_err(invalid)?;

        let action = match kind {
            IntentKind::Open => IntentAction::Open {
                quantity: self
                    .quantity
                    .ok_or_else(|| invalid("open requires quantity".into()))?,
                leverage: self
                    .leverage
                    .ok_or_else(|| invalid("open requires leverage".into()))?,
                stop_loss: self.stop_loss,
                take_profit: self.take_profit,
            },
            IntentKind::Close => IntentAction::Close {
                quantity: self.quantity,
            },
            IntentKind::UpdateStopLoss => IntentAction::UpdateStopLoss {
                level: self
                    .stop_loss
                    .ok_or_else(|| invalid("update_stop_loss requires stop_loss".into()))?,
            },
            IntentKind::UpdateTakeProfit => IntentAction::UpdateTakeProfit {
                level: self
                    .take_profit
                    .ok_or_else(|| invalid("update_take_profit requires take_profit".into()))?,
            },
        };

        Ok(Intent {
            date,
            symbol,
            side,
            action,
            price: self.price,
        })
    }
}

pub struct CsvIntentAdapter {
    path: PathBuf,
}

impl CsvIntentAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl IntentPort for CsvIntentAdapter {
    fn load_intents(&self) -> Result<Vec<Intent>, PerpLedgerError> {
        let content = fs::read_to_string(&self.path).map_err(|e| PerpLedgerError::Data {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        parse_intents(&content)
    }
}

/// Parse an intents CSV document. Line numbers in errors count the header as
/// line 1.
pub fn parse_intents(content: &str) -> Result<Vec<Intent>, PerpLedgerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let headers = rdr.headers()?.clone();
    let mut intents = Vec::new();

    for (idx, result) in rdr.records().enumerate() {
        let fallback_line = idx + 2;
        let record = result.map_err(|e| PerpLedgerError::Intent {
            line: fallback_line,
            reason: e.to_string(),
        })?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_line);
        let row: IntentRow =
            record
                .deserialize(Some(&headers))
                .map_err(|e| PerpLedgerError::Intent {
                    line,
                    reason: e.to_string(),
                })?;
        intents.push(row.into_intent(line)?);
    }

    Ok(intents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "date,symbol,side,action,quantity,leverage,price,stop_loss,take_profit\n";

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000.5\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n";

        fs::write(path.join("BTCUSDT.csv"), csv_content).unwrap();
        fs::write(path.join("ETHUSDT.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn fetch_ohlcv_returns_sorted_bars() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_ohlcv("BTCUSDT", None, None).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, date(15));
        assert_eq!(bars[0].symbol, "BTCUSDT");
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000.5);
        assert_eq!(bars[2].date, date(17));
    }

    #[test]
    fn fetch_ohlcv_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_ohlcv("BTCUSDT", Some(date(16)), Some(date(16)))
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, date(16));

        let bars = adapter.fetch_ohlcv("BTCUSDT", Some(date(16)), None).unwrap();
        assert_eq!(bars.len(), 2);
    }

    #[test]
    fn fetch_ohlcv_missing_file_is_data_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter.fetch_ohlcv("XYZUSDT", None, None).unwrap_err();
        assert!(matches!(err, PerpLedgerError::Data { .. }));
    }

    #[test]
    fn fetch_ohlcv_rejects_inconsistent_bar() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join("BADUSDT.csv"),
            "date,open,high,low,close,volume\n2024-01-15,100,90,95,99,1\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(path);
        let err = adapter.fetch_ohlcv("BADUSDT", None, None).unwrap_err();
        assert!(err.to_string().contains("inconsistent"));
    }

    #[test]
    fn list_symbols_returns_csv_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert_eq!(adapter.list_symbols().unwrap(), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn parse_intents_all_actions() {
        let content = format!(
            "{HEADER}\
             2024-01-15,btcusdt,long,open,0.1,10,,49000,52000\n\
             2024-01-16,BTCUSDT,long,stop_loss,,,,49500,\n\
             2024-01-16,BTCUSDT,long,update_take_profit,,,,,53000\n\
             2024-01-17,BTCUSDT,long,close,0.05,,51000,,\n\
             2024-01-18,BTCUSDT,long,close,,,,,\n"
        );
        let intents = parse_intents(&content).unwrap();
        assert_eq!(intents.len(), 5);

        assert_eq!(intents[0].symbol, "BTCUSDT");
        assert_eq!(
            intents[0].action,
            IntentAction::Open {
                quantity: 0.1,
                leverage: 10,
                stop_loss: Some(49_000.0),
                take_profit: Some(52_000.0),
            }
        );
        assert_eq!(intents[0].price, None);
        assert_eq!(intents[1].action, IntentAction::UpdateStopLoss { level: 49_500.0 });
        assert_eq!(
            intents[2].action,
            IntentAction::UpdateTakeProfit { level: 53_000.0 }
        );
        assert_eq!(intents[3].action, IntentAction::Close { quantity: Some(0.05) });
        assert_eq!(intents[3].price, Some(51_000.0));
        assert_eq!(intents[4].action, IntentAction::Close { quantity: None });
    }

    #[test]
    fn open_without_leverage_reports_line() {
        let content = format!(
            "{HEADER}\
             2024-01-15,BTCUSDT,long,open,0.1,10,,,\n\
             2024-01-16,BTCUSDT,short,open,0.1,,,,\n"
        );
        let err = parse_intents(&content).unwrap_err();
        assert!(matches!(err, PerpLedgerError::Intent { line: 3, .. }));
    }

    #[test]
    fn unknown_side_is_rejected() {
        let content = format!("{HEADER}2024-01-15,BTCUSDT,flat,open,0.1,10,,,\n");
        let err = parse_intents(&content).unwrap_err();
        assert!(matches!(err, PerpLedgerError::Intent { line: 2, .. }));
    }

    #[test]
    fn intent_adapter_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intents.csv");
        fs::write(&path, format!("{HEADER}2024-01-15,ETHUSDT,sell,open,1,5,3000,,\n")).unwrap();

        let intents = CsvIntentAdapter::new(path).load_intents().unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].side, Side::Short);
        assert_eq!(intents[0].price, Some(3_000.0));
    }
}
