//! OHLCV bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// Prices are positive and the high/low bracket the open and close.
    pub fn is_consistent(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
    }

    /// The single mark used by the scanner for this bar.
    pub fn mark(&self) -> f64 {
        self.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> OhlcvBar {
        OhlcvBar {
            symbol: "BTCUSDT".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            open: 50_000.0,
            high: 51_000.0,
            low: 49_000.0,
            close: 50_500.0,
            volume: 1_250.5,
        }
    }

    #[test]
    fn consistent_bar() {
        assert!(sample_bar().is_consistent());
    }

    #[test]
    fn high_below_close_is_inconsistent() {
        let bar = OhlcvBar {
            high: 50_400.0,
            ..sample_bar()
        };
        assert!(!bar.is_consistent());
    }

    #[test]
    fn non_positive_price_is_inconsistent() {
        let bar = OhlcvBar {
            low: 0.0,
            ..sample_bar()
        };
        assert!(!bar.is_consistent());
    }

    #[test]
    fn mark_is_close() {
        assert_eq!(sample_bar().mark(), 50_500.0);
    }
}
