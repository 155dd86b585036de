//! Deterministic synthetic bar provider.
//!
//! Produces a seeded random walk per symbol so offline runs and tests can
//! exercise the full pipeline without network access. The walk is
//! deterministic in the symbol name: the same symbol and date range always
//! yield the same bars.

use super::provider::{DataError, DataProvider, FetchResult, RawBar};
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Synthetic data provider. Never touches the network and never fails.
pub struct SyntheticProvider;

impl SyntheticProvider {
    /// Generate weekday bars between `start` and `end` (inclusive).
    fn generate(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<RawBar> {
        // Deterministic seed from symbol name
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let mut bars = Vec::new();
        let mut price = 100.0_f64;
        let mut current = start;

        while current <= end {
            let weekday = current.weekday();
            if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
                current += chrono::Duration::days(1);
                continue;
            }

            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000..5_000_000u64);

            bars.push(RawBar {
                date: current,
                open,
                high,
                low,
                close,
                volume,
            });

            price = close;
            current += chrono::Duration::days(1);
        }

        bars
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let bars = Self::generate(symbol, start, end);
        if bars.is_empty() {
            // Range contained no weekdays
            return Err(DataError::EmptyResult {
                symbol: symbol.to_string(),
            });
        }
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
        })
    }
}
