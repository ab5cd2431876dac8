//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::{CsvAdapter, CsvIntentAdapter};
use crate::adapters::csv_report::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    build_replay_config, replay_symbols, validate_ledger_config, validate_replay_config,
};
use crate::domain::error::PerpLedgerError;
use crate::domain::ledger::MAX_LEVERAGE;
use crate::domain::liquidation::{liquidation_distance, liquidation_price};
use crate::domain::metrics::Metrics;
use crate::domain::position::Side;
use crate::domain::replay::{ReplayResult, SymbolSeries, run_replay};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::intent_port::IntentPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_OUTPUT_DIR: &str = "report";

#[derive(Parser, Debug)]
#[command(name = "perpledger", about = "Leveraged perpetual-futures ledger and replay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay an intent file against historical bars
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        intents: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a ledger/replay configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the liquidation price for an entry
    LiqPrice {
        #[arg(long)]
        entry: f64,
        #[arg(long)]
        leverage: u32,
        #[arg(long)]
        side: Side,
    },
    /// List symbols with bar files in a data directory
    ListSymbols {
        #[arg(short, long)]
        data_dir: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Replay {
            config,
            data_dir,
            intents,
            output,
        } => run_replay_command(
            &config,
            data_dir.as_deref(),
            intents.as_deref(),
            output.as_deref(),
        ),
        Command::Validate { config } => run_validate(&config),
        Command::LiqPrice {
            entry,
            leverage,
            side,
        } => run_liq_price(entry, leverage, side),
        Command::ListSymbols { data_dir } => run_list_symbols(data_dir),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = PerpLedgerError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Resolve a path from the CLI flag, then the `[replay]` key, then `default`.
pub fn resolve_path(
    flag: Option<&Path>,
    config: &dyn ConfigPort,
    key: &str,
    default: Option<&str>,
) -> Result<PathBuf, PerpLedgerError> {
    if let Some(p) = flag {
        return Ok(p.to_path_buf());
    }
    match config.get_string("replay", key) {
        Some(s) if !s.trim().is_empty() => Ok(PathBuf::from(s.trim())),
        _ => default.map(PathBuf::from).ok_or_else(|| PerpLedgerError::ConfigMissing {
            section: "replay".into(),
            key: key.into(),
        }),
    }
}

fn run_replay_command(
    config_path: &Path,
    data_dir: Option<&Path>,
    intents_path: Option<&Path>,
    output_dir: Option<&Path>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match run_replay_pipeline(&adapter, data_dir, intents_path, output_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load bars and intents, replay them, print the summary and write the report.
pub fn run_replay_pipeline(
    adapter: &dyn ConfigPort,
    data_dir: Option<&Path>,
    intents_path: Option<&Path>,
    output_dir: Option<&Path>,
) -> Result<(), PerpLedgerError> {
    let replay_config = build_replay_config(adapter)?;
    let symbols = replay_symbols(adapter)?;
    let data_dir = resolve_path(data_dir, adapter, "data_dir", Some(DEFAULT_DATA_DIR))?;
    let intents_path = resolve_path(intents_path, adapter, "intents", None)?;
    let output_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let data_port = CsvAdapter::new(data_dir);
    let mut series = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let bars = data_port.fetch_ohlcv(
            symbol,
            replay_config.start_date,
            replay_config.end_date,
        )?;
        info!(symbol = %symbol, bars = bars.len(), "loaded bars");
        series.push(SymbolSeries::new(symbol.clone(), bars));
    }

    let intents = CsvIntentAdapter::new(intents_path).load_intents()?;

    eprintln!(
        "Running replay: {} symbols, {} intents",
        series.len(),
        intents.len()
    );
    let result = run_replay(&series, &intents, &replay_config)?;
    let metrics = Metrics::compute(&result);

    print_summary(&result, &metrics);

    CsvReportAdapter::new().write(&result, &metrics, &output_dir)?;
    eprintln!("\nReport written to: {}", output_dir.display());
    Ok(())
}

fn print_summary(result: &ReplayResult, metrics: &Metrics) {
    eprintln!("  Processed: {} dates", result.equity_curve.len());
    eprintln!("\n=== Replay Results ===");
    eprintln!("Final Equity:     {:.2}", metrics.final_equity);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Realized PnL:     {:.2}", metrics.realized_pnl);
    eprintln!("Fees Paid:        {:.2}", metrics.total_fees);
    eprintln!(
        "Exits:            {} stop-loss, {} take-profit, {} liquidation",
        metrics.stop_losses, metrics.take_profits, metrics.liquidations
    );

    if !result.rejections.is_empty() {
        eprintln!("\n=== Rejected Intents ({}) ===", result.rejections.len());
        for rejection in &result.rejections {
            eprintln!("  {}: {}", rejection.intent, rejection.reason);
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_ledger_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = validate_replay_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let replay = match build_replay_config(&adapter) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let symbols = match replay_symbols(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nLedger:");
    eprintln!("  initial_cash: {:.2}", replay.ledger.initial_cash);
    eprintln!("  fee_rate_bps: {}", replay.ledger.fee_rate_bps);
    eprintln!("  slippage_bps: {}", replay.ledger.slippage_bps);
    eprintln!("\nReplay:");
    eprintln!("  symbols: {}", symbols.join(", "));
    if let Some(start) = replay.start_date {
        eprintln!("  start_date: {start}");
    }
    if let Some(end) = replay.end_date {
        eprintln!("  end_date: {end}");
    }
    eprintln!("  check_liquidations: {}", replay.check_liquidations);
    eprintln!("  close_at_end: {}", replay.close_at_end);

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_liq_price(entry: f64, leverage: u32, side: Side) -> ExitCode {
    if !(entry.is_finite() && entry > 0.0) {
        eprintln!("error: entry price must be positive");
        return ExitCode::from(2);
    }
    if leverage == 0 || leverage > MAX_LEVERAGE {
        eprintln!("error: leverage must be between 1 and {MAX_LEVERAGE}");
        return ExitCode::from(2);
    }

    let price = liquidation_price(entry, leverage, side);
    println!("{price}");
    eprintln!(
        "{side} {leverage}x from {entry}: liquidated at {price} ({:.2}% adverse move)",
        liquidation_distance(leverage) * 100.0
    );
    ExitCode::SUCCESS
}

fn run_list_symbols(data_dir: PathBuf) -> ExitCode {
    let adapter = CsvAdapter::new(data_dir);
    let symbols = match adapter.list_symbols() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{symbol}");
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}
