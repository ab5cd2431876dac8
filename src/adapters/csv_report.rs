//! CSV report adapter implementing ReportPort.
//!
//! Writes three files into the output directory:
//! - `equity.csv`: one row per replayed date
//! - `trades.csv`: every realized close with its exit reason
//! - `summary.csv`: metric name/value pairs

use std::fs;
use std::path::Path;

use crate::domain::error::PerpLedgerError;
use crate::domain::metrics::Metrics;
use crate::domain::replay::ReplayResult;
use crate::ports::report_port::ReportPort;

pub const EQUITY_FILE: &str = "equity.csv";
pub const TRADES_FILE: &str = "trades.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn summary_rows(metrics: &Metrics) -> Vec<(&'static str, String)> {
    vec![
        ("initial_equity", format!("{:.2}", metrics.initial_equity)),
        ("final_equity", format!("{:.2}", metrics.final_equity)),
        ("total_return", format!("{:.6}", metrics.total_return)),
        ("max_drawdown", format!("{:.6}", metrics.max_drawdown)),
        (
            "max_drawdown_duration",
            metrics.max_drawdown_duration.to_string(),
        ),
        ("total_trades", metrics.total_trades.to_string()),
        ("trades_won", metrics.trades_won.to_string()),
        ("trades_lost", metrics.trades_lost.to_string()),
        ("win_rate", format!("{:.6}", metrics.win_rate)),
        ("profit_factor", format!("{:.6}", metrics.profit_factor)),
        ("largest_win", format!("{:.2}", metrics.largest_win)),
        ("largest_loss", format!("{:.2}", metrics.largest_loss)),
        ("realized_pnl", format!("{:.2}", metrics.realized_pnl)),
        ("total_fees", format!("{:.2}", metrics.total_fees)),
        ("stop_losses", metrics.stop_losses.to_string()),
        ("take_profits", metrics.take_profits.to_string()),
        ("liquidations", metrics.liquidations.to_string()),
        ("rejected_intents", metrics.rejected_intents.to_string()),
    ]
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &ReplayResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), PerpLedgerError> {
        fs::create_dir_all(output_dir)?;

        let mut equity = csv::Writer::from_path(output_dir.join(EQUITY_FILE))?;
        for point in &result.equity_curve {
            equity.serialize(point)?;
        }
        equity.flush()?;

        let mut trades = csv::Writer::from_path(output_dir.join(TRADES_FILE))?;
        for exit in &result.exits {
            trades.serialize(exit)?;
        }
        trades.flush()?;

        let mut summary = csv::Writer::from_path(output_dir.join(SUMMARY_FILE))?;
        summary.write_record(["metric", "value"])?;
        for (name, value) in summary_rows(metrics) {
            summary.write_record([name, value.as_str()])?;
        }
        summary.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intent::{Intent, IntentAction};
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::position::Side;
    use crate::domain::replay::{ReplayConfig, SymbolSeries, run_replay};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_result() -> ReplayResult {
        let bars = [50_000.0, 48_000.0, 51_000.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar {
                symbol: "BTCUSDT".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, i as u32 + 1).unwrap(),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
            })
            .collect();
        let series = SymbolSeries::new("BTCUSDT".into(), bars);
        let intents = vec![Intent {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            symbol: "BTCUSDT".into(),
            side: Side::Long,
            action: IntentAction::Open {
                quantity: 0.1,
                leverage: 10,
                stop_loss: Some(49_000.0),
                take_profit: None,
            },
            price: None,
        }];
        run_replay(&[series], &intents, &ReplayConfig::default()).unwrap()
    }

    #[test]
    fn writes_all_report_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("report");
        let result = sample_result();
        let metrics = Metrics::compute(&result);

        CsvReportAdapter::new().write(&result, &metrics, &out).unwrap();

        let equity = fs::read_to_string(out.join(EQUITY_FILE)).unwrap();
        let mut lines = equity.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,equity,cash,unrealized_pnl,margin_used,open_positions"
        );
        assert_eq!(lines.count(), 3);

        let trades = fs::read_to_string(out.join(TRADES_FILE)).unwrap();
        assert!(trades.starts_with("date,symbol,side,reason,quantity,fill_price,realized_pnl,fee"));
        assert!(trades.contains("2024-01-02,BTCUSDT,long,stop_loss"));

        let summary = fs::read_to_string(out.join(SUMMARY_FILE)).unwrap();
        assert!(summary.contains("stop_losses,1"));
        assert!(summary.contains("total_trades,1"));
    }

    #[test]
    fn empty_replay_still_writes_summary() {
        let dir = TempDir::new().unwrap();
        let result = run_replay(&[], &[], &ReplayConfig::default()).unwrap();
        let metrics = Metrics::compute(&result);

        CsvReportAdapter::new()
            .write(&result, &metrics, dir.path())
            .unwrap();

        let summary = fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap();
        assert!(summary.starts_with("metric,value"));
        assert!(summary.contains("final_equity,10000.00"));
    }
}
