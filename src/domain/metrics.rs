//! Summary statistics for a finished replay.

use super::replay::{EquityPoint, ExitReason, ReplayResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub realized_pnl: f64,
    pub total_fees: f64,
    pub stop_losses: usize,
    pub take_profits: usize,
    pub liquidations: usize,
    pub rejected_intents: usize,
}

impl Metrics {
    pub fn compute(result: &ReplayResult) -> Self {
        let ledger = &result.ledger;
        let initial_equity = ledger.initial_cash();
        let final_equity = result
            .equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_equity);

        let total_return = if initial_equity > 0.0 {
            (final_equity - initial_equity) / initial_equity
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&result.equity_curve);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut realized_pnl = 0.0_f64;

        // wins and losses are judged net of the closing fee
        for trade in ledger.closed_trades() {
            realized_pnl += trade.realized_pnl;
            let pnl = trade.net_pnl();
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
        }

        let total_trades = ledger.closed_trades().len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let count = |reason: ExitReason| result.exits.iter().filter(|e| e.reason == reason).count();

        Metrics {
            initial_equity,
            final_equity,
            total_return,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            win_rate,
            profit_factor,
            largest_win,
            largest_loss,
            realized_pnl,
            total_fees: ledger.fees_paid(),
            stop_losses: count(ExitReason::StopLoss),
            take_profits: count(ExitReason::TakeProfit),
            liquidations: count(ExitReason::Liquidation),
            rejected_intents: result.rejections.len(),
        }
    }
}

/// Largest peak-to-trough decline as a fraction of the peak, and the longest
/// run of points spent below a prior peak.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}
