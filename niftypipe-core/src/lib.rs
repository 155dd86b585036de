//! NiftyPipe — NIFTY 500 market-data acquisition pipeline.
//!
//! Three sequential batch stages with file-based hand-off:
//!
//! 1. **fetch** — ticker universe from the NSE index listing (embedded
//!    fallback list when the listing is unavailable)
//! 2. **download** — daily OHLCV bars per ticker from Yahoo Finance, with
//!    bounded retries and request pacing
//! 3. **clean** — deduplicated, validated master table plus wide
//!    close-price / volume matrices and a quality report
//!
//! The `niftypipe` binary orchestrates the stages; this crate holds all
//! the stage logic.
//!
//! WARNING: the universe only lists current constituents, so datasets
//! produced here carry survivorship bias.

pub mod artifacts;
pub mod config;
pub mod data;
pub mod runlog;
