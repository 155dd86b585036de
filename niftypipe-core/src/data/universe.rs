//! Ticker universe — fetches the NIFTY 500 constituent list.
//!
//! Primary source is the NSE index constituent CSV; on any network or
//! parse failure we degrade to an embedded list of major constituents.
//! The degradation is recoverable and logged, never fatal. An empty
//! universe after all sources is fatal.
//!
//! NOTE: only current constituents are listed, so downstream datasets
//! carry survivorship bias — delisted companies never appear.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// NSE index constituent listing for the NIFTY 500.
pub const INDEX_CSV_URL: &str =
    "https://www.niftyindices.com/IndexConstituent/ind_nifty500list.csv";

/// Embedded fallback: major NIFTY 500 constituents, used when the remote
/// listing is unavailable.
pub const FALLBACK_TICKERS: &[&str] = &[
    "RELIANCE", "TCS", "HDFCBANK", "INFY", "ICICIBANK", "HINDUNILVR", "ITC",
    "SBIN", "BHARTIARTL", "BAJFINANCE", "KOTAKBANK", "LT", "ASIANPAINT",
    "HCLTECH", "AXISBANK", "MARUTI", "SUNPHARMA", "TITAN", "ULTRACEMCO",
    "NESTLEIND", "WIPRO", "ADANIENT", "ONGC", "NTPC", "POWERGRID",
    "TATAMOTORS", "BAJAJFINSV", "JSWSTEEL", "M&M", "TECHM", "INDUSINDBK",
    "TATASTEEL", "ADANIPORTS", "HINDALCO", "COALINDIA", "GRASIM",
    "BRITANNIA", "SHREECEM", "EICHERMOT", "CIPLA", "DRREDDY", "DIVISLAB",
    "APOLLOHOSP", "BPCL", "HEROMOTOCO", "SBILIFE", "HDFCLIFE", "BAJAJ-AUTO",
    "TATACONSUM", "DABUR", "GODREJCP", "MARICO", "PIDILITIND", "BERGEPAINT",
    "COLPAL", "HAVELLS", "VOLTAS", "WHIRLPOOL", "VBL", "MCDOWELL-N",
    "JUBLFOOD", "PAGEIND", "DIXON", "POLYCAB", "CROMPTON", "VGUARD",
    "BATAINDIA", "RELAXO", "TRENT", "ABFRL", "VEDL", "SAIL", "NMDC", "MOIL",
    "ACC", "AMBUJACEM", "RAMCOCEM", "JKCEMENT", "HEIDELBERG", "BANKBARODA",
    "PNB", "CANBK", "UNIONBANK", "IDFCFIRSTB", "FEDERALBNK", "RBLBANK",
    "BANDHANBNK", "PFC", "RECLTD", "IRCTC", "IRFC", "CONCOR", "GMRINFRA",
    "ADANIGREEN", "ADANITRANS", "TATAPOWER", "TORNTPOWER", "CESC", "NHPC",
];

/// One constituent: symbol plus optional display metadata from the listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerRecord {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
}

impl TickerRecord {
    pub fn bare(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: None,
            sector: None,
        }
    }
}

/// Which source produced the universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UniverseSource {
    Remote,
    Fallback,
}

/// Errors from universe fetching.
#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("index listing request failed: {0}")]
    Http(String),

    #[error("index listing parse failed: {0}")]
    Parse(String),

    #[error("no tickers from any source")]
    Empty,
}

/// Row shape of the NSE constituent CSV.
#[derive(Debug, Deserialize)]
struct IndexCsvRow {
    #[serde(rename = "Company Name")]
    company: Option<String>,
    #[serde(rename = "Industry")]
    industry: Option<String>,
    #[serde(rename = "Symbol")]
    symbol: String,
}

/// Fetches the constituent list with fallback logic.
pub struct UniverseFetcher {
    client: reqwest::blocking::Client,
    url: String,
}

impl UniverseFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            url: INDEX_CSV_URL.to_string(),
        }
    }

    /// Override the listing URL (tests point this at a local server).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Fetch the universe: remote listing first, embedded list on failure.
    ///
    /// The returned list is non-empty, deduplicated, and order-preserving.
    pub fn fetch(&self) -> Result<(Vec<TickerRecord>, UniverseSource), UniverseError> {
        match self.fetch_remote() {
            Ok(records) if !records.is_empty() => Ok((records, UniverseSource::Remote)),
            Ok(_) => {
                eprintln!("WARNING: index listing returned no symbols, using embedded fallback");
                Self::fallback()
            }
            Err(e) => {
                eprintln!("WARNING: index listing unavailable ({e}), using embedded fallback");
                Self::fallback()
            }
        }
    }

    fn fallback() -> Result<(Vec<TickerRecord>, UniverseSource), UniverseError> {
        let records = dedup_ordered(FALLBACK_TICKERS.iter().map(|s| TickerRecord::bare(s)));
        if records.is_empty() {
            return Err(UniverseError::Empty);
        }
        Ok((records, UniverseSource::Fallback))
    }

    fn fetch_remote(&self) -> Result<Vec<TickerRecord>, UniverseError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| UniverseError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UniverseError::Http(format!("HTTP {status}")));
        }

        let body = resp.text().map_err(|e| UniverseError::Http(e.to_string()))?;
        parse_index_csv(&body)
    }
}

/// Parse the constituent CSV body into ticker records.
pub fn parse_index_csv(body: &str) -> Result<Vec<TickerRecord>, UniverseError> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut records = Vec::new();

    for row in reader.deserialize::<IndexCsvRow>() {
        let row = row.map_err(|e| UniverseError::Parse(e.to_string()))?;
        let symbol = row.symbol.trim().to_string();
        if symbol.is_empty() {
            continue;
        }
        records.push(TickerRecord {
            symbol,
            name: row.company.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            sector: row.industry.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        });
    }

    Ok(dedup_ordered(records.into_iter()))
}

/// Deduplicate by symbol, keeping the first occurrence and its order.
pub fn dedup_ordered(records: impl Iterator<Item = TickerRecord>) -> Vec<TickerRecord> {
    let mut seen = HashSet::new();
    records
        .filter(|r| seen.insert(r.symbol.clone()))
        .collect()
}

/// Format a bare NSE symbol for the Yahoo chart API (`.NS` suffix).
pub fn yahoo_symbol(symbol: &str) -> String {
    format!("{symbol}.NS")
}

/// Strip the Yahoo suffix back off for storage in the raw table.
pub fn bare_symbol(symbol: &str) -> &str {
    symbol.strip_suffix(".NS").unwrap_or(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_list_is_nonempty_and_unique() {
        let records = dedup_ordered(FALLBACK_TICKERS.iter().map(|s| TickerRecord::bare(s)));
        assert_eq!(records.len(), FALLBACK_TICKERS.len());
        assert!(records.len() >= 90);
    }

    #[test]
    fn parses_constituent_csv() {
        let body = "Company Name,Industry,Symbol,Series,ISIN Code\n\
                    Reliance Industries Ltd.,Oil Gas & Consumable Fuels,RELIANCE,EQ,INE002A01018\n\
                    Tata Consultancy Services Ltd.,Information Technology,TCS,EQ,INE467B01029\n";
        let records = parse_index_csv(body).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol, "RELIANCE");
        assert_eq!(records[0].name.as_deref(), Some("Reliance Industries Ltd."));
        assert_eq!(records[1].sector.as_deref(), Some("Information Technology"));
    }

    #[test]
    fn parse_dedups_preserving_order() {
        let body = "Company Name,Industry,Symbol\nA,X,AAA\nB,Y,BBB\nA2,X2,AAA\n";
        let records = parse_index_csv(body).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol, "AAA");
        assert_eq!(records[0].name.as_deref(), Some("A"));
        assert_eq!(records[1].symbol, "BBB");
    }

    #[test]
    fn parse_without_symbol_column_is_error() {
        let body = "Company Name,Industry\nReliance,Oil\n";
        assert!(parse_index_csv(body).is_err());
    }

    #[test]
    fn symbol_suffix_roundtrip() {
        assert_eq!(yahoo_symbol("RELIANCE"), "RELIANCE.NS");
        assert_eq!(bare_symbol("RELIANCE.NS"), "RELIANCE");
        assert_eq!(bare_symbol("RELIANCE"), "RELIANCE");
    }
}
