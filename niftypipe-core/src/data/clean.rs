//! Cleaning and validation of the aggregated raw table.
//!
//! Passes, in order:
//! 1. Drop duplicate (ticker, date) rows, keeping the last occurrence
//! 2. Sort by (ticker, date)
//! 3. Forward-fill missing prices within each ticker series (never
//!    backward-fill; a leading gap stays missing and is discarded below)
//! 4. Validate high >= low and positive prices, discarding violations
//! 5. Flag low-coverage and short-history tickers (reported, not removed)
//! 6. Append the fixed transaction-cost column
//!
//! Every pass is counted in the quality report.

use super::provider::PriceRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Tunables for the cleaning stage. Defaults live in `config::CleanConfig`.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Tickers whose missing-day fraction (against the union calendar,
    /// restricted to their own first..last span) exceeds this are flagged.
    pub max_missing_frac: f64,
    /// Tickers with fewer trading rows than this are flagged.
    pub min_history_days: usize,
    /// Value of the fixed transaction-cost column, in basis points.
    pub transaction_cost_bps: f64,
}

/// A cleaned row: a raw price row plus derived fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanRow {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// True if any price field in this row was forward-filled.
    pub filled: bool,
    /// Fixed transaction-cost assumption, basis points.
    pub cost_bps: f64,
}

/// Date coverage of the cleaned table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRangeStats {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
    /// Distinct trading dates across all tickers.
    pub trading_days: usize,
}

/// Aggregate statistics for one cleaning run, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub cleaned_at: chrono::NaiveDateTime,
    pub initial_rows: usize,
    pub duplicates_removed: usize,
    pub filled_values: usize,
    pub invalid_rows_dropped: usize,
    pub final_rows: usize,
    pub tickers_processed: usize,
    pub low_coverage_tickers: Vec<String>,
    pub insufficient_history_tickers: Vec<String>,
    pub avg_history_days: f64,
    pub date_range: DateRangeStats,
    /// 0–100: retention and completeness weighted equally.
    pub quality_score: f64,
}

/// Errors from the cleaning stage. Both are fatal to the run.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("raw table is empty — nothing to clean")]
    EmptyInput,

    #[error("all rows were discarded during cleaning")]
    AllRowsDiscarded,
}

/// Result of a cleaning run.
#[derive(Debug)]
pub struct CleanResult {
    pub rows: Vec<CleanRow>,
    pub report: QualityReport,
}

/// Run the full cleaning pipeline over the raw table.
pub fn clean(raw: Vec<PriceRow>, opts: &CleanOptions) -> Result<CleanResult, CleanError> {
    let initial_rows = raw.len();
    if initial_rows == 0 {
        return Err(CleanError::EmptyInput);
    }

    // Pass 1+2: dedup keep-last, then sort by (ticker, date)
    let mut by_key: HashMap<(String, NaiveDate), PriceRow> = HashMap::with_capacity(initial_rows);
    for row in raw {
        by_key.insert((row.ticker.clone(), row.date), row);
    }
    let duplicates_removed = initial_rows - by_key.len();

    let mut rows: Vec<PriceRow> = by_key.into_values().collect();
    rows.sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.date.cmp(&b.date)));

    // Pass 3: forward-fill within each ticker series
    let (mut filled, filled_values) = forward_fill(rows, opts.transaction_cost_bps);

    // Pass 4: discard invalid rows (inverted bars, non-positive or still-
    // missing prices; NaN fails every comparison and is dropped here too)
    let before_validate = filled.len();
    filled.retain(|r| {
        r.high >= r.low && r.open > 0.0 && r.high > 0.0 && r.low > 0.0 && r.close > 0.0
    });
    let invalid_rows_dropped = before_validate - filled.len();

    if filled.is_empty() {
        return Err(CleanError::AllRowsDiscarded);
    }

    // Pass 5: coverage and history flags
    let flags = coverage_flags(&filled, opts);

    let final_rows = filled.len();
    let retention = final_rows as f64 / initial_rows as f64;
    let completeness = 1.0 - filled_values as f64 / initial_rows as f64;
    let quality_score = ((retention * 0.5 + completeness * 0.5) * 10_000.0).round() / 100.0;

    let report = QualityReport {
        cleaned_at: chrono::Local::now().naive_local(),
        initial_rows,
        duplicates_removed,
        filled_values,
        invalid_rows_dropped,
        final_rows,
        tickers_processed: flags.ticker_count,
        low_coverage_tickers: flags.low_coverage,
        insufficient_history_tickers: flags.insufficient_history,
        avg_history_days: flags.avg_history_days,
        date_range: flags.date_range,
        quality_score,
    };

    Ok(CleanResult {
        rows: filled,
        report,
    })
}

/// Forward-fill missing price fields within each ticker series.
///
/// Returns the rows as `CleanRow`s (with the `filled` flag set where a
/// value was substituted) and the number of cells filled. The fill state
/// resets at each ticker boundary, so values never leak across tickers,
/// and nothing is ever backward-filled.
fn forward_fill(rows: Vec<PriceRow>, cost_bps: f64) -> (Vec<CleanRow>, usize) {
    let mut out = Vec::with_capacity(rows.len());
    let mut filled_values = 0usize;

    let mut current_ticker: Option<String> = None;
    let mut last: [Option<f64>; 4] = [None; 4];

    for row in rows {
        if current_ticker.as_deref() != Some(row.ticker.as_str()) {
            current_ticker = Some(row.ticker.clone());
            last = [None; 4];
        }

        let mut prices = [row.open, row.high, row.low, row.close];
        let mut row_filled = false;

        for (i, price) in prices.iter_mut().enumerate() {
            if price.is_nan() {
                if let Some(prev) = last[i] {
                    *price = prev;
                    filled_values += 1;
                    row_filled = true;
                }
            }
            if !price.is_nan() {
                last[i] = Some(*price);
            }
        }

        out.push(CleanRow {
            ticker: row.ticker,
            date: row.date,
            open: prices[0],
            high: prices[1],
            low: prices[2],
            close: prices[3],
            volume: row.volume,
            filled: row_filled,
            cost_bps,
        });
    }

    (out, filled_values)
}

struct CoverageFlags {
    ticker_count: usize,
    low_coverage: Vec<String>,
    insufficient_history: Vec<String>,
    avg_history_days: f64,
    date_range: DateRangeStats,
}

/// Compute per-ticker coverage statistics against the union calendar.
///
/// A ticker's expected day count is the number of union trading dates
/// falling inside its own first..last span, so a late-listed ticker is not
/// penalised for dates before it existed.
fn coverage_flags(rows: &[CleanRow], opts: &CleanOptions) -> CoverageFlags {
    let union: BTreeSet<NaiveDate> = rows.iter().map(|r| r.date).collect();

    let mut per_ticker: BTreeMap<&str, (NaiveDate, NaiveDate, usize)> = BTreeMap::new();
    for row in rows {
        per_ticker
            .entry(row.ticker.as_str())
            .and_modify(|(first, last, n)| {
                if row.date < *first {
                    *first = row.date;
                }
                if row.date > *last {
                    *last = row.date;
                }
                *n += 1;
            })
            .or_insert((row.date, row.date, 1));
    }

    let mut low_coverage = Vec::new();
    let mut insufficient_history = Vec::new();
    let mut total_days = 0usize;

    for (ticker, (first, last, n)) in &per_ticker {
        let expected = union.range(first..=last).count();
        let missing_frac = 1.0 - *n as f64 / expected as f64;
        if missing_frac > opts.max_missing_frac {
            low_coverage.push(ticker.to_string());
        }
        if *n < opts.min_history_days {
            insufficient_history.push(ticker.to_string());
        }
        total_days += n;
    }

    let ticker_count = per_ticker.len();
    let avg_history_days = total_days as f64 / ticker_count as f64;

    let earliest = *union.iter().next().expect("rows are non-empty");
    let latest = *union.iter().next_back().expect("rows are non-empty");

    CoverageFlags {
        ticker_count,
        low_coverage,
        insufficient_history,
        avg_history_days,
        date_range: DateRangeStats {
            earliest,
            latest,
            trading_days: union.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn row(ticker: &str, date: NaiveDate, close: f64) -> PriceRow {
        PriceRow {
            ticker: ticker.to_string(),
            date,
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        }
    }

    fn opts() -> CleanOptions {
        CleanOptions {
            max_missing_frac: 0.10,
            min_history_days: 1,
            transaction_cost_bps: 3.0,
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            clean(vec![], &opts()),
            Err(CleanError::EmptyInput)
        ));
    }

    #[test]
    fn duplicates_keep_last_occurrence() {
        let raw = vec![row("AAA", d(2), 10.0), row("AAA", d(2), 99.0)];
        let result = clean(raw, &opts()).unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].close, 99.0);
        assert_eq!(result.report.duplicates_removed, 1);
    }

    #[test]
    fn output_is_sorted_with_unique_keys() {
        let raw = vec![
            row("BBB", d(3), 20.0),
            row("AAA", d(2), 10.0),
            row("BBB", d(2), 19.0),
            row("AAA", d(3), 11.0),
        ];
        let result = clean(raw, &opts()).unwrap();

        let keys: Vec<(&str, NaiveDate)> = result
            .rows
            .iter()
            .map(|r| (r.ticker.as_str(), r.date))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn forward_fill_resolves_internal_gap() {
        let mut gap = row("AAA", d(3), f64::NAN);
        gap.open = f64::NAN;
        gap.high = f64::NAN;
        gap.low = f64::NAN;
        let raw = vec![row("AAA", d(2), 10.0), gap, row("AAA", d(4), 12.0)];

        let result = clean(raw, &opts()).unwrap();

        assert_eq!(result.rows.len(), 3);
        let mid = &result.rows[1];
        assert!(mid.filled);
        assert_eq!(mid.close, 10.0);
        assert_eq!(result.report.filled_values, 4);
        assert_eq!(result.report.invalid_rows_dropped, 0);
    }

    #[test]
    fn leading_gap_is_discarded_not_backfilled() {
        let mut gap = row("AAA", d(2), f64::NAN);
        gap.open = f64::NAN;
        gap.high = f64::NAN;
        gap.low = f64::NAN;
        let raw = vec![gap, row("AAA", d(3), 12.0)];

        let result = clean(raw, &opts()).unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].date, d(3));
        assert_eq!(result.report.invalid_rows_dropped, 1);
        assert_eq!(result.report.filled_values, 0);
    }

    #[test]
    fn fill_state_does_not_leak_across_tickers() {
        let mut gap = row("BBB", d(2), f64::NAN);
        gap.open = f64::NAN;
        gap.high = f64::NAN;
        gap.low = f64::NAN;
        let raw = vec![row("AAA", d(2), 10.0), gap];

        let result = clean(raw, &opts()).unwrap();

        // BBB's gap has no prior BBB value, so it must be dropped
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].ticker, "AAA");
    }

    #[test]
    fn inverted_bar_is_discarded() {
        let mut bad = row("AAA", d(3), 10.0);
        bad.high = 5.0;
        bad.low = 15.0;
        let raw = vec![row("AAA", d(2), 10.0), bad];

        let result = clean(raw, &opts()).unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.report.invalid_rows_dropped, 1);
    }

    #[test]
    fn non_positive_price_is_discarded() {
        let mut bad = row("AAA", d(3), 10.0);
        bad.open = 0.0;
        let raw = vec![row("AAA", d(2), 10.0), bad];

        let result = clean(raw, &opts()).unwrap();

        assert_eq!(result.rows.len(), 1);
        for r in &result.rows {
            assert!(r.high >= r.low);
            assert!(r.open > 0.0 && r.high > 0.0 && r.low > 0.0 && r.close > 0.0);
        }
    }

    #[test]
    fn all_rows_invalid_is_an_error() {
        let mut bad = row("AAA", d(2), 10.0);
        bad.close = -1.0;
        assert!(matches!(
            clean(vec![bad], &opts()),
            Err(CleanError::AllRowsDiscarded)
        ));
    }

    #[test]
    fn low_coverage_ticker_is_flagged() {
        // Union calendar has 10 days (from AAA); BBB only covers 5 of the
        // 10 days inside its own span -> 50% missing
        let mut raw: Vec<PriceRow> = (2..12).map(|day| row("AAA", d(day), 10.0)).collect();
        for day in [2, 4, 6, 8, 11] {
            raw.push(row("BBB", d(day), 20.0));
        }

        let result = clean(raw, &opts()).unwrap();

        assert_eq!(result.report.low_coverage_tickers, vec!["BBB".to_string()]);
    }

    #[test]
    fn short_history_ticker_is_flagged() {
        let mut o = opts();
        o.min_history_days = 5;
        let raw = vec![
            row("AAA", d(2), 10.0),
            row("AAA", d(3), 10.5),
            row("BBB", d(2), 20.0),
            row("BBB", d(3), 20.5),
            row("BBB", d(4), 21.0),
            row("BBB", d(5), 21.5),
            row("BBB", d(6), 22.0),
        ];

        let result = clean(raw, &o).unwrap();

        assert_eq!(
            result.report.insufficient_history_tickers,
            vec!["AAA".to_string()]
        );
        assert!((result.report.avg_history_days - 3.5).abs() < 1e-9);
    }

    #[test]
    fn cost_column_is_constant() {
        let raw = vec![row("AAA", d(2), 10.0), row("AAA", d(3), 11.0)];
        let result = clean(raw, &opts()).unwrap();

        assert!(result.rows.iter().all(|r| r.cost_bps == 3.0));
    }

    #[test]
    fn clean_table_stats() {
        let raw = vec![
            row("AAA", d(2), 10.0),
            row("AAA", d(3), 11.0),
            row("BBB", d(2), 20.0),
        ];
        let result = clean(raw, &opts()).unwrap();
        let report = &result.report;

        assert_eq!(report.initial_rows, 3);
        assert_eq!(report.final_rows, 3);
        assert_eq!(report.tickers_processed, 2);
        assert_eq!(report.date_range.earliest, d(2));
        assert_eq!(report.date_range.latest, d(3));
        assert_eq!(report.date_range.trading_days, 2);
        assert_eq!(report.quality_score, 100.0);
    }
}
