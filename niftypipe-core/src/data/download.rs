//! Batch downloader — fetches every ticker sequentially and aggregates
//! the results into one raw table plus a download summary.
//!
//! Per-ticker failure policy: attempt, and on any error retry up to
//! `max_retries` times with a fixed delay between attempts; after the
//! budget is exhausted the ticker is recorded as failed and the batch
//! continues. One ticker's failure never aborts the batch. A fixed delay
//! is inserted between ticker requests to bound the outbound request rate.

use super::provider::{DataProvider, DownloadProgress, PriceRow};
use super::universe::bare_symbol;
use crate::runlog::RunLog;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Options for one batch download.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Start date (inclusive).
    pub start: NaiveDate,
    /// End date (inclusive).
    pub end: NaiveDate,
    /// Retries per ticker after the first attempt.
    pub max_retries: u32,
    /// Fixed delay between attempts for one ticker.
    pub retry_delay: Duration,
    /// Delay inserted between ticker requests.
    pub request_delay: Duration,
}

/// Outcome of one ticker's download.
#[derive(Debug, Clone)]
pub struct TickerOutcome {
    pub ticker: String,
    pub ok: bool,
    pub rows: usize,
    pub error: Option<String>,
}

/// Aggregate statistics for a batch download, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSummary {
    pub downloaded_at: chrono::NaiveDateTime,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_tickers: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub rows: usize,
    pub data_hash: String,
    pub duration_secs: f64,
    pub failed_tickers: Vec<String>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Result of a batch download: the aggregated raw table plus bookkeeping.
#[derive(Debug)]
pub struct DownloadResult {
    pub rows: Vec<PriceRow>,
    pub outcomes: Vec<TickerOutcome>,
    pub summary: DownloadSummary,
}

/// Download every symbol in order, aggregating bars into one raw table.
///
/// Symbols carry the provider suffix (e.g. `RELIANCE.NS`); rows are stored
/// under the bare ticker. Progress events go to `progress`, per-ticker
/// outcomes to the run log.
pub fn download_all(
    provider: &dyn DataProvider,
    symbols: &[String],
    opts: &DownloadOptions,
    progress: &dyn DownloadProgress,
    log: &RunLog,
) -> DownloadResult {
    let total = symbols.len();
    let started = Instant::now();

    log.line(&format!(
        "starting batch download for {total} tickers, {} to {} (provider: {})",
        opts.start,
        opts.end,
        provider.name()
    ));

    let mut rows: Vec<PriceRow> = Vec::new();
    let mut outcomes: Vec<TickerOutcome> = Vec::with_capacity(total);

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        match fetch_with_retry(provider, symbol, opts, log) {
            Ok(fetch) => {
                let ticker = bare_symbol(symbol);
                let first = fetch.bars.first().map(|b| b.date);
                let last = fetch.bars.last().map(|b| b.date);
                let count = fetch.bars.len();

                rows.extend(fetch.bars.iter().map(|b| PriceRow::from_bar(ticker, b)));

                log.line(&format!(
                    "{symbol}: downloaded {count} rows ({} to {})",
                    first.map(|d| d.to_string()).unwrap_or_default(),
                    last.map(|d| d.to_string()).unwrap_or_default()
                ));
                progress.on_complete(symbol, i, total, &Ok(count));
                outcomes.push(TickerOutcome {
                    ticker: ticker.to_string(),
                    ok: true,
                    rows: count,
                    error: None,
                });
            }
            Err(e) => {
                log.line(&format!(
                    "{symbol}: all {} attempts failed - {e}",
                    opts.max_retries + 1
                ));
                let msg = e.to_string();
                progress.on_complete(symbol, i, total, &Err(e));
                outcomes.push(TickerOutcome {
                    ticker: bare_symbol(symbol).to_string(),
                    ok: false,
                    rows: 0,
                    error: Some(msg),
                });
            }
        }

        // Pace outbound requests regardless of outcome
        if i + 1 < total {
            std::thread::sleep(opts.request_delay);
        }
    }

    let succeeded = outcomes.iter().filter(|o| o.ok).count();
    let failed = total - succeeded;
    let failed_tickers: Vec<String> = outcomes
        .iter()
        .filter(|o| !o.ok)
        .map(|o| o.ticker.clone())
        .collect();

    progress.on_batch_complete(succeeded, failed, total);

    let duration_secs = started.elapsed().as_secs_f64();
    let summary = DownloadSummary {
        downloaded_at: chrono::Local::now().naive_local(),
        start_date: opts.start,
        end_date: opts.end,
        total_tickers: total,
        succeeded,
        failed,
        success_rate: if total == 0 {
            0.0
        } else {
            (succeeded as f64 / total as f64 * 10_000.0).round() / 100.0
        },
        rows: rows.len(),
        data_hash: raw_table_hash(&rows),
        duration_secs,
        failed_tickers,
    };

    log.line(&format!(
        "batch complete: {succeeded}/{total} succeeded, {failed} failed, {} rows in {duration_secs:.1}s",
        rows.len()
    ));

    DownloadResult {
        rows,
        outcomes,
        summary,
    }
}

/// Fetch one ticker with the bounded, fixed-delay retry loop.
///
/// `max_retries = N` means N+1 attempts total. Every error class is
/// retryable; the last error wins once the budget is gone.
fn fetch_with_retry(
    provider: &dyn DataProvider,
    symbol: &str,
    opts: &DownloadOptions,
    log: &RunLog,
) -> Result<super::provider::FetchResult, super::provider::DataError> {
    let mut last_error = None;

    for attempt in 0..=opts.max_retries {
        if attempt > 0 {
            std::thread::sleep(opts.retry_delay);
        }

        match provider.fetch(symbol, opts.start, opts.end) {
            Ok(fetch) => return Ok(fetch),
            Err(e) => {
                log.line(&format!(
                    "{symbol}: attempt {}/{} failed - {e}",
                    attempt + 1,
                    opts.max_retries + 1
                ));
                last_error = Some(e);
            }
        }
    }

    Err(last_error.expect("retry loop runs at least once"))
}

/// Deterministic BLAKE3 hash over the raw table, in row order.
///
/// Recorded in the download summary so a cleaned dataset can be traced
/// back to the exact raw table it came from.
pub fn raw_table_hash(rows: &[PriceRow]) -> String {
    let mut hasher = blake3::Hasher::new();
    for row in rows {
        hasher.update(row.ticker.as_bytes());
        hasher.update(row.date.to_string().as_bytes());
        hasher.update(&row.open.to_le_bytes());
        hasher.update(&row.high.to_le_bytes());
        hasher.update(&row.low.to_le_bytes());
        hasher.update(&row.close.to_le_bytes());
        hasher.update(&row.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{DataError, FetchResult, RawBar, SilentProgress};

    /// Provider that succeeds for some symbols and always errors for others.
    struct ScriptedProvider {
        good: Vec<String>,
    }

    impl DataProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch(
            &self,
            symbol: &str,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<FetchResult, DataError> {
            if !self.good.iter().any(|g| g == symbol) {
                return Err(DataError::NetworkUnreachable("unplugged".into()));
            }
            let bars = vec![
                RawBar {
                    date: start,
                    open: 10.0,
                    high: 11.0,
                    low: 9.0,
                    close: 10.5,
                    volume: 100,
                },
                RawBar {
                    date: start + chrono::Duration::days(1),
                    open: 10.5,
                    high: 12.0,
                    low: 10.0,
                    close: 11.0,
                    volume: 120,
                },
            ];
            Ok(FetchResult {
                symbol: symbol.to_string(),
                bars,
            })
        }
    }

    fn opts() -> DownloadOptions {
        DownloadOptions {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2020, 1, 5).unwrap(),
            max_retries: 2,
            retry_delay: Duration::ZERO,
            request_delay: Duration::ZERO,
        }
    }

    fn run(symbols: &[&str], good: &[&str]) -> DownloadResult {
        let provider = ScriptedProvider {
            good: good.iter().map(|s| s.to_string()).collect(),
        };
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(dir.path(), "download");
        let symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
        download_all(&provider, &symbols, &opts(), &SilentProgress, &log)
    }

    #[test]
    fn mixed_batch_counts_and_failed_list() {
        let result = run(&["AAA.NS", "BBB.NS"], &["AAA.NS"]);

        assert_eq!(result.summary.total_tickers, 2);
        assert_eq!(result.summary.succeeded, 1);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.summary.failed_tickers, vec!["BBB".to_string()]);
        assert_eq!(result.summary.success_rate, 50.0);

        // Failed ticker contributes zero rows; bare tickers in the table
        assert_eq!(result.rows.len(), 2);
        assert!(result.rows.iter().all(|r| r.ticker == "AAA"));
    }

    #[test]
    fn failed_ticker_appears_exactly_once() {
        let result = run(&["AAA.NS", "BBB.NS"], &["AAA.NS"]);
        let count = result
            .summary
            .failed_tickers
            .iter()
            .filter(|t| t.as_str() == "BBB")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn all_failed_yields_empty_table() {
        let result = run(&["AAA.NS", "BBB.NS"], &[]);
        assert!(result.rows.is_empty());
        assert_eq!(result.summary.failed, 2);
        assert_eq!(result.summary.success_rate, 0.0);
    }

    #[test]
    fn hash_is_deterministic_and_order_sensitive() {
        let a = run(&["AAA.NS"], &["AAA.NS"]);
        let b = run(&["AAA.NS"], &["AAA.NS"]);
        assert_eq!(a.summary.data_hash, b.summary.data_hash);

        let c = run(&["BBB.NS"], &["BBB.NS"]);
        assert_ne!(a.summary.data_hash, c.summary.data_hash);
    }

    /// Provider that always errors, counting how often it is asked.
    struct CountingProvider {
        calls: std::sync::Mutex<usize>,
    }

    impl DataProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn fetch(
            &self,
            symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<FetchResult, DataError> {
            *self.calls.lock().unwrap() += 1;
            Err(DataError::EmptyResult {
                symbol: symbol.to_string(),
            })
        }
    }

    #[test]
    fn retry_budget_means_n_plus_one_attempts() {
        let provider = CountingProvider {
            calls: std::sync::Mutex::new(0),
        };
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(dir.path(), "download");

        let mut o = opts();
        o.max_retries = 3;
        let result = download_all(
            &provider,
            &["AAA.NS".to_string()],
            &o,
            &SilentProgress,
            &log,
        );

        assert_eq!(*provider.calls.lock().unwrap(), 4);
        assert!(result.rows.is_empty());
        assert_eq!(result.summary.failed_tickers, vec!["AAA".to_string()]);
    }

    #[test]
    fn outcomes_preserve_input_order() {
        let result = run(&["AAA.NS", "BBB.NS", "CCC.NS"], &["CCC.NS"]);
        let tickers: Vec<&str> = result.outcomes.iter().map(|o| o.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAA", "BBB", "CCC"]);
    }
}
