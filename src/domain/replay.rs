//! Sequential bar replay.
//!
//! Each date on the unified timeline is processed strictly in order:
//!
//! 1. refresh marks from that date's closes (symbols without a bar keep their
//!    last mark);
//! 2. optionally force-close liquidated positions at their liquidation price;
//! 3. scan stop-loss/take-profit and close each trigger at its level;
//! 4. apply that date's intents in input order;
//! 5. record an equity point.
//!
//! Rejected intents are recorded and the replay carries on.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{info, warn};

use super::error::LedgerError;
use super::intent::{Intent, IntentAction};
use super::ledger::{Ledger, LedgerConfig};
use super::ohlcv::OhlcvBar;
use super::position::Side;
use super::scanner::{TriggerType, check_liquidations, check_stop_loss_take_profit};

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub ledger: LedgerConfig,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub check_liquidations: bool,
    pub close_at_end: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            ledger: LedgerConfig::default(),
            start_date: None,
            end_date: None,
            check_liquidations: false,
            close_at_end: true,
        }
    }
}

/// Bars for one symbol, indexed by date.
#[derive(Debug, Clone)]
pub struct SymbolSeries {
    pub symbol: String,
    pub bars: Vec<OhlcvBar>,
    date_index: HashMap<NaiveDate, usize>,
}

impl SymbolSeries {
    pub fn new(symbol: String, bars: Vec<OhlcvBar>) -> Self {
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            symbol,
            bars,
            date_index,
        }
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }
}

pub fn build_unified_timeline(series: &[SymbolSeries]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|s| s.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Liquidation,
    StopLoss,
    TakeProfit,
    Intent,
    EndOfReplay,
}

impl From<TriggerType> for ExitReason {
    fn from(trigger: TriggerType) -> Self {
        match trigger {
            TriggerType::StopLoss => ExitReason::StopLoss,
            TriggerType::TakeProfit => ExitReason::TakeProfit,
        }
    }
}

/// A realized close, stamped with the date and what caused it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitEvent {
    pub date: NaiveDate,
    pub symbol: String,
    pub side: Side,
    pub reason: ExitReason,
    pub quantity: f64,
    pub fill_price: f64,
    pub realized_pnl: f64,
    pub fee: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    pub cash: f64,
    pub unrealized_pnl: f64,
    pub margin_used: f64,
    pub open_positions: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectReason {
    #[error("no price available for {symbol}")]
    NoPrice { symbol: String },

    #[error("no bar on {date} for any symbol")]
    OutsideTimeline { date: NaiveDate },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub intent: Intent,
    pub reason: RejectReason,
}

#[derive(Debug, Clone)]
pub struct ReplayResult {
    pub ledger: Ledger,
    pub equity_curve: Vec<EquityPoint>,
    pub exits: Vec<ExitEvent>,
    pub rejections: Vec<Rejection>,
    pub intents_applied: usize,
}

/// Fails only when `config.ledger` is out of range; per-intent problems are
/// collected as rejections.
pub fn run_replay(
    series: &[SymbolSeries],
    intents: &[Intent],
    config: &ReplayConfig,
) -> Result<ReplayResult, LedgerError> {
    let timeline: Vec<NaiveDate> = build_unified_timeline(series)
        .into_iter()
        .filter(|d| config.start_date.is_none_or(|start| *d >= start))
        .filter(|d| config.end_date.is_none_or(|end| *d <= end))
        .collect();

    let mut by_date: BTreeMap<NaiveDate, Vec<&Intent>> = BTreeMap::new();
    for intent in intents {
        by_date.entry(intent.date).or_default().push(intent);
    }

    let mut result = ReplayResult {
        ledger: Ledger::new(&config.ledger)?,
        equity_curve: Vec::with_capacity(timeline.len()),
        exits: Vec::new(),
        rejections: Vec::new(),
        intents_applied: 0,
    };
    let mut marks: HashMap<String, f64> = HashMap::new();

    for &date in &timeline {
        for s in series {
            if let Some(bar) = s.get_bar(date) {
                marks.insert(s.symbol.clone(), bar.mark());
            }
        }

        if config.check_liquidations {
            process_liquidations(&mut result, &marks, date);
        }
        process_triggers(&mut result, &marks, date);

        if let Some(todays) = by_date.remove(&date) {
            for intent in todays {
                apply_intent(&mut result, &marks, intent);
            }
        }

        result.equity_curve.push(equity_point(&result.ledger, &marks, date));
    }

    for intent in by_date.into_values().flatten() {
        warn!(%intent, "intent dated outside the replay timeline");
        result.rejections.push(Rejection {
            intent: intent.clone(),
            reason: RejectReason::OutsideTimeline { date: intent.date },
        });
    }

    if config.close_at_end {
        if let Some(&last) = timeline.last() {
            flatten(&mut result, &marks, last);
            if let Some(point) = result.equity_curve.last_mut() {
                *point = equity_point(&result.ledger, &marks, last);
            }
        }
    }

    Ok(result)
}

fn process_liquidations(result: &mut ReplayResult, marks: &HashMap<String, f64>, date: NaiveDate) {
    for liq in check_liquidations(&result.ledger, marks) {
        info!(
            %date,
            symbol = %liq.symbol,
            side = %liq.side,
            mark = liq.mark,
            liquidation_price = liq.liquidation_price,
            "position liquidated"
        );
        if let Err(e) = close_and_record(
            result,
            date,
            &liq.symbol,
            liq.side,
            liq.quantity,
            liq.liquidation_price,
            ExitReason::Liquidation,
        ) {
            warn!(%date, symbol = %liq.symbol, error = %e, "liquidation close failed");
        }
    }
}

fn process_triggers(result: &mut ReplayResult, marks: &HashMap<String, f64>, date: NaiveDate) {
    for trigger in check_stop_loss_take_profit(&result.ledger, marks) {
        info!(
            %date,
            symbol = %trigger.symbol,
            side = %trigger.side,
            trigger = %trigger.trigger_type,
            price = trigger.trigger_price,
            "risk trigger fired"
        );
        if let Err(e) = close_and_record(
            result,
            date,
            &trigger.symbol,
            trigger.side,
            trigger.quantity,
            trigger.trigger_price,
            trigger.trigger_type.into(),
        ) {
            warn!(%date, symbol = %trigger.symbol, error = %e, "trigger close failed");
        }
    }
}

fn apply_intent(result: &mut ReplayResult, marks: &HashMap<String, f64>, intent: &Intent) {
    match execute_intent(result, marks, intent) {
        Ok(()) => result.intents_applied += 1,
        Err(reason) => {
            warn!(%intent, %reason, "intent rejected");
            result.rejections.push(Rejection {
                intent: intent.clone(),
                reason,
            });
        }
    }
}

fn execute_intent(
    result: &mut ReplayResult,
    marks: &HashMap<String, f64>,
    intent: &Intent,
) -> Result<(), RejectReason> {
    let price = || {
        intent
            .price
            .or_else(|| marks.get(&intent.symbol).copied())
            .ok_or_else(|| RejectReason::NoPrice {
                symbol: intent.symbol.clone(),
            })
    };

    match &intent.action {
        IntentAction::Open { .. } => {
            let price = price()?;
            if let Some(request) = intent.open_request(price) {
                result.ledger.open(&request)?;
            }
        }
        IntentAction::Close { quantity } => {
            let price = price()?;
            let quantity = match quantity {
                Some(q) => *q,
                None => result
                    .ledger
                    .position(&intent.symbol, intent.side)
                    .map(|pos| pos.quantity)
                    .ok_or_else(|| LedgerError::PositionNotFound {
                        symbol: intent.symbol.clone(),
                        side: intent.side,
                    })?,
            };
            close_and_record(
                result,
                intent.date,
                &intent.symbol,
                intent.side,
                quantity,
                price,
                ExitReason::Intent,
            )?;
        }
        IntentAction::UpdateStopLoss { level } => {
            result
                .ledger
                .update_stop_loss(&intent.symbol, intent.side, *level)?;
        }
        IntentAction::UpdateTakeProfit { level } => {
            result
                .ledger
                .update_take_profit(&intent.symbol, intent.side, *level)?;
        }
    }
    Ok(())
}

fn flatten(result: &mut ReplayResult, marks: &HashMap<String, f64>, date: NaiveDate) {
    for pos in result.ledger.positions() {
        let price = marks.get(&pos.symbol).copied().unwrap_or(pos.entry_price);
        if let Err(e) = close_and_record(
            result,
            date,
            &pos.symbol,
            pos.side,
            pos.quantity,
            price,
            ExitReason::EndOfReplay,
        ) {
            warn!(%date, symbol = %pos.symbol, error = %e, "end-of-replay close failed");
        }
    }
}

fn close_and_record(
    result: &mut ReplayResult,
    date: NaiveDate,
    symbol: &str,
    side: Side,
    quantity: f64,
    price: f64,
    reason: ExitReason,
) -> Result<(), LedgerError> {
    let outcome = result.ledger.close(symbol, side, quantity, price)?;
    result.exits.push(ExitEvent {
        date,
        symbol: symbol.to_string(),
        side,
        reason,
        quantity: outcome.quantity,
        fill_price: outcome.fill_price,
        realized_pnl: outcome.realized_pnl,
        fee: outcome.fee,
    });
    Ok(())
}

fn equity_point(ledger: &Ledger, marks: &HashMap<String, f64>, date: NaiveDate) -> EquityPoint {
    let snapshot = ledger.total_equity(marks);
    EquityPoint {
        date,
        equity: snapshot.equity,
        cash: snapshot.cash,
        unrealized_pnl: snapshot.unrealized_pnl,
        margin_used: snapshot.margin_used,
        open_positions: ledger.position_count(),
    }
}
