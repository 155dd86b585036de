//! Wide-format views of the cleaned table.
//!
//! Pivots the long (ticker, date, value) table into a matrix with one row
//! per date and one column per ticker. Cells where a ticker has no bar are
//! empty. `unpivot` recovers the original triples, so pivoting is lossless
//! for downstream consumers that prefer long format.

use super::clean::CleanRow;
use chrono::NaiveDate;

/// A date-by-ticker matrix. `values[row][col]` corresponds to
/// `(dates[row], tickers[col])`; `None` means no bar for that pair.
#[derive(Debug, Clone, PartialEq)]
pub struct WideMatrix {
    pub dates: Vec<NaiveDate>,
    pub tickers: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl WideMatrix {
    /// Number of (date, ticker) cells that hold a value.
    pub fn filled_cells(&self) -> usize {
        self.values
            .iter()
            .map(|row| row.iter().filter(|v| v.is_some()).count())
            .sum()
    }
}

/// Pivot close prices into a wide matrix.
pub fn pivot_close(rows: &[CleanRow]) -> WideMatrix {
    pivot(rows, |r| r.close)
}

/// Pivot volumes into a wide matrix.
pub fn pivot_volume(rows: &[CleanRow]) -> WideMatrix {
    pivot(rows, |r| r.volume as f64)
}

/// Pivot an arbitrary field. Rows are keyed by (ticker, date); the cleaner
/// guarantees those keys are unique, so a later duplicate would silently
/// overwrite — callers must pass cleaned rows.
pub fn pivot(rows: &[CleanRow], value: impl Fn(&CleanRow) -> f64) -> WideMatrix {
    let mut dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
    dates.sort();
    dates.dedup();

    let mut tickers: Vec<String> = rows.iter().map(|r| r.ticker.clone()).collect();
    tickers.sort();
    tickers.dedup();

    let date_idx: std::collections::HashMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    let ticker_idx: std::collections::HashMap<&str, usize> = tickers
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i))
        .collect();

    let mut values = vec![vec![None; tickers.len()]; dates.len()];
    for row in rows {
        let r = date_idx[&row.date];
        let c = ticker_idx[row.ticker.as_str()];
        values[r][c] = Some(value(row));
    }

    WideMatrix {
        dates,
        tickers,
        values,
    }
}

/// Recover the (ticker, date, value) triples from a wide matrix,
/// sorted by (ticker, date).
pub fn unpivot(matrix: &WideMatrix) -> Vec<(String, NaiveDate, f64)> {
    let mut triples = Vec::with_capacity(matrix.filled_cells());
    for (r, date) in matrix.dates.iter().enumerate() {
        for (c, ticker) in matrix.tickers.iter().enumerate() {
            if let Some(v) = matrix.values[r][c] {
                triples.push((ticker.clone(), *date, v));
            }
        }
    }
    triples.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    triples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn row(ticker: &str, date: NaiveDate, close: f64, volume: u64) -> CleanRow {
        CleanRow {
            ticker: ticker.to_string(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume,
            filled: false,
            cost_bps: 3.0,
        }
    }

    #[test]
    fn pivot_shapes_and_gaps() {
        let rows = vec![
            row("AAA", d(2), 10.0, 100),
            row("AAA", d(3), 11.0, 110),
            row("BBB", d(2), 20.0, 200),
        ];

        let m = pivot_close(&rows);

        assert_eq!(m.dates, vec![d(2), d(3)]);
        assert_eq!(m.tickers, vec!["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(m.values[0][0], Some(10.0));
        assert_eq!(m.values[0][1], Some(20.0));
        assert_eq!(m.values[1][0], Some(11.0));
        assert_eq!(m.values[1][1], None); // BBB has no bar on d(3)
        assert_eq!(m.filled_cells(), 3);
    }

    #[test]
    fn pivot_unpivot_roundtrip() {
        let rows = vec![
            row("AAA", d(2), 10.0, 100),
            row("AAA", d(3), 11.0, 110),
            row("BBB", d(2), 20.0, 200),
        ];

        let triples = unpivot(&pivot_close(&rows));

        assert_eq!(
            triples,
            vec![
                ("AAA".to_string(), d(2), 10.0),
                ("AAA".to_string(), d(3), 11.0),
                ("BBB".to_string(), d(2), 20.0),
            ]
        );
    }

    #[test]
    fn volume_matrix_uses_volume() {
        let rows = vec![row("AAA", d(2), 10.0, 12345)];
        let m = pivot_volume(&rows);
        assert_eq!(m.values[0][0], Some(12345.0));
    }
}
