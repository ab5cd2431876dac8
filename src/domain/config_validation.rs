//! Configuration validation.
//!
//! Validates every `[ledger]` and `[replay]` field before a replay runs and
//! builds the typed configs from them.

use crate::domain::error::PerpLedgerError;
use crate::domain::ledger::LedgerConfig;
use crate::domain::replay::ReplayConfig;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::collections::HashSet;

const LEDGER: &str = "ledger";
const REPLAY: &str = "replay";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SymbolListError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Split a comma-separated symbol list, trimming and upper-casing each entry.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, SymbolListError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(SymbolListError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(SymbolListError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

pub fn validate_ledger_config(config: &dyn ConfigPort) -> Result<(), PerpLedgerError> {
    build_ledger_config(config).map(|_| ())
}

pub fn validate_replay_config(config: &dyn ConfigPort) -> Result<(), PerpLedgerError> {
    replay_symbols(config)?;
    replay_dates(config)?;
    read_bool(config, REPLAY, "check_liquidations")?;
    read_bool(config, REPLAY, "close_at_end")?;
    Ok(())
}

/// Build the `[ledger]` section. `initial_cash` is required; the rates default
/// to zero when absent.
pub fn build_ledger_config(config: &dyn ConfigPort) -> Result<LedgerConfig, PerpLedgerError> {
    let defaults = LedgerConfig::default();
    let Some(initial_cash) = read_double(config, LEDGER, "initial_cash")? else {
        return Err(PerpLedgerError::ConfigMissing {
            section: LEDGER.to_string(),
            key: "initial_cash".to_string(),
        });
    };
    if !(initial_cash.is_finite() && initial_cash > 0.0) {
        return Err(invalid(
            LEDGER,
            "initial_cash",
            "initial_cash must be positive".to_string(),
        ));
    }

    Ok(LedgerConfig {
        initial_cash,
        fee_rate_bps: read_bps(config, "fee_rate_bps", defaults.fee_rate_bps)?,
        slippage_bps: read_bps(config, "slippage_bps", defaults.slippage_bps)?,
    })
}

pub fn build_replay_config(config: &dyn ConfigPort) -> Result<ReplayConfig, PerpLedgerError> {
    let ledger = build_ledger_config(config)?;
    let (start_date, end_date) = replay_dates(config)?;
    let defaults = ReplayConfig::default();
    Ok(ReplayConfig {
        ledger,
        start_date,
        end_date,
        check_liquidations: read_bool(config, REPLAY, "check_liquidations")?
            .unwrap_or(defaults.check_liquidations),
        close_at_end: read_bool(config, REPLAY, "close_at_end")?.unwrap_or(defaults.close_at_end),
    })
}

/// The validated `[replay] symbols` list.
pub fn replay_symbols(config: &dyn ConfigPort) -> Result<Vec<String>, PerpLedgerError> {
    let raw = match config.get_string(REPLAY, "symbols") {
        Some(s) if !s.trim().is_empty() => s,
        _ => {
            return Err(PerpLedgerError::ConfigMissing {
                section: REPLAY.to_string(),
                key: "symbols".to_string(),
            })
        }
    };
    parse_symbols(&raw).map_err(|e| PerpLedgerError::ConfigInvalid {
        section: REPLAY.to_string(),
        key: "symbols".to_string(),
        reason: e.to_string(),
    })
}

fn invalid(section: &str, key: &str, reason: String) -> PerpLedgerError {
    PerpLedgerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, PerpLedgerError> {
    config
        .get_double(section, key)
        .map_err(|reason| invalid(section, key, reason))
}

fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<bool>, PerpLedgerError> {
    config
        .get_bool(section, key)
        .map_err(|reason| invalid(section, key, reason))
}

fn read_bps(config: &dyn ConfigPort, key: &str, default: f64) -> Result<f64, PerpLedgerError> {
    let value = read_double(config, LEDGER, key)?.unwrap_or(default);
    if !(0.0..10_000.0).contains(&value) {
        return Err(invalid(
            LEDGER,
            key,
            format!("{key} must be at least 0 and below 10000"),
        ));
    }
    Ok(value)
}

fn replay_dates(
    config: &dyn ConfigPort,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), PerpLedgerError> {
    let start = parse_date(config.get_string(REPLAY, "start_date").as_deref(), "start_date")?;
    let end = parse_date(config.get_string(REPLAY, "end_date").as_deref(), "end_date")?;

    if let (Some(s), Some(e)) = (start, end) {
        if s >= e {
            return Err(PerpLedgerError::ConfigInvalid {
                section: REPLAY.to_string(),
                key: "start_date".to_string(),
                reason: "start_date must be before end_date".to_string(),
            });
        }
    }
    Ok((start, end))
}

fn parse_date(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>, PerpLedgerError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| PerpLedgerError::ConfigInvalid {
                section: REPLAY.to_string(),
                key: field.to_string(),
                reason: format!("invalid {field} format, expected YYYY-MM-DD"),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn parse_symbols_uppercases_and_trims() {
        assert_eq!(
            parse_symbols(" btcusdt, ETHusdt ").unwrap(),
            vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
        );
    }

    #[test]
    fn parse_symbols_rejects_empty_token() {
        assert_eq!(parse_symbols("BTCUSDT,,ETHUSDT"), Err(SymbolListError::EmptyToken));
    }

    #[test]
    fn parse_symbols_rejects_duplicates_case_insensitively() {
        assert_eq!(
            parse_symbols("BTCUSDT,btcusdt"),
            Err(SymbolListError::DuplicateSymbol("BTCUSDT".into()))
        );
    }

    #[test]
    fn valid_config_builds() {
        let config = make_config(
            r#"
[ledger]
initial_cash = 25000
fee_rate_bps = 4
slippage_bps = 2

[replay]
symbols = btcusdt,ethusdt
start_date = 2024-01-01
end_date = 2024-12-31
check_liquidations = true
close_at_end = false
"#,
        );
        let replay = build_replay_config(&config).unwrap();
        assert_eq!(replay.ledger.initial_cash, 25_000.0);
        assert_eq!(replay.ledger.fee_rate_bps, 4.0);
        assert_eq!(replay.ledger.slippage_bps, 2.0);
        assert_eq!(replay.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(replay.end_date, NaiveDate::from_ymd_opt(2024, 12, 31));
        assert!(replay.check_liquidations);
        assert!(!replay.close_at_end);
        assert_eq!(replay_symbols(&config).unwrap(), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn dates_and_flags_are_optional() {
        let config = make_config("[ledger]\ninitial_cash = 1000\n[replay]\nsymbols = BTCUSDT\n");
        let replay = build_replay_config(&config).unwrap();
        assert_eq!(replay.start_date, None);
        assert_eq!(replay.end_date, None);
        assert!(!replay.check_liquidations);
        assert!(replay.close_at_end);
        assert_eq!(replay.ledger.fee_rate_bps, 0.0);
    }

    #[test]
    fn initial_cash_must_be_positive() {
        let config = make_config("[ledger]\ninitial_cash = 0\n");
        let err = validate_ledger_config(&config).unwrap_err();
        assert!(matches!(err, PerpLedgerError::ConfigInvalid { key, .. } if key == "initial_cash"));
    }

    #[test]
    fn missing_initial_cash_fails() {
        let config = make_config("[ledger]\nfee_rate_bps = 4\n");
        let err = validate_ledger_config(&config).unwrap_err();
        assert!(matches!(err, PerpLedgerError::ConfigMissing { key, .. } if key == "initial_cash"));
    }

    #[test]
    fn non_numeric_bps_fails() {
        for (key, value) in [("fee_rate_bps", "four"), ("slippage_bps", "2bps")] {
            let ini = format!("[ledger]\ninitial_cash = 100\n{key} = {value}\n");
            let config = make_config(&ini);
            let err = build_ledger_config(&config).unwrap_err();
            assert!(matches!(err, PerpLedgerError::ConfigInvalid { key: k, .. } if k == key));
        }
    }

    #[test]
    fn non_numeric_initial_cash_fails() {
        let config = make_config("[ledger]\ninitial_cash = lots\n");
        let err = validate_ledger_config(&config).unwrap_err();
        assert!(matches!(err, PerpLedgerError::ConfigInvalid { key, .. } if key == "initial_cash"));
    }

    #[test]
    fn non_boolean_flag_fails() {
        let config = make_config(
            "[ledger]\ninitial_cash = 100\n\
             [replay]\nsymbols = BTCUSDT\ncheck_liquidations = ture\n",
        );
        let err = build_replay_config(&config).unwrap_err();
        assert!(
            matches!(err, PerpLedgerError::ConfigInvalid { key, .. } if key == "check_liquidations")
        );
        let err = validate_replay_config(&config).unwrap_err();
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn negative_fee_fails() {
        let config = make_config("[ledger]\ninitial_cash = 100\nfee_rate_bps = -1\n");
        let err = validate_ledger_config(&config).unwrap_err();
        assert!(matches!(err, PerpLedgerError::ConfigInvalid { key, .. } if key == "fee_rate_bps"));
    }

    #[test]
    fn slippage_at_denominator_fails() {
        let config = make_config("[ledger]\ninitial_cash = 100\nslippage_bps = 10000\n");
        let err = validate_ledger_config(&config).unwrap_err();
        assert!(matches!(err, PerpLedgerError::ConfigInvalid { key, .. } if key == "slippage_bps"));
    }

    #[test]
    fn missing_symbols_fails() {
        let config = make_config("[replay]\nclose_at_end = true\n");
        let err = validate_replay_config(&config).unwrap_err();
        assert!(matches!(err, PerpLedgerError::ConfigMissing { key, .. } if key == "symbols"));
    }

    #[test]
    fn duplicate_symbols_fail() {
        let config = make_config("[replay]\nsymbols = BTCUSDT, btcusdt\n");
        let err = validate_replay_config(&config).unwrap_err();
        assert!(matches!(err, PerpLedgerError::ConfigInvalid { key, .. } if key == "symbols"));
    }

    #[test]
    fn bad_date_format_fails() {
        let config = make_config("[replay]\nsymbols = BTCUSDT\nstart_date = 2024/01/01\n");
        let err = validate_replay_config(&config).unwrap_err();
        assert!(matches!(err, PerpLedgerError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn start_after_end_fails() {
        let config = make_config(
            "[replay]\nsymbols = BTCUSDT\nstart_date = 2024-06-01\nend_date = 2024-01-01\n",
        );
        let err = validate_replay_config(&config).unwrap_err();
        assert!(matches!(err, PerpLedgerError::ConfigInvalid { key, .. } if key == "start_date"));
    }
}
