//! Providers, batch download, and cleaning.

pub mod clean;
pub mod download;
pub mod pivot;
pub mod provider;
pub mod synthetic;
pub mod universe;
pub mod yahoo;

pub use clean::{clean, CleanOptions, CleanResult, CleanRow, QualityReport};
pub use download::{download_all, DownloadOptions, DownloadResult, DownloadSummary};
pub use pivot::{pivot_close, pivot_volume, unpivot, WideMatrix};
pub use provider::{DataError, DataProvider, DownloadProgress, PriceRow, RawBar, StdoutProgress};
pub use synthetic::SyntheticProvider;
pub use universe::{TickerRecord, UniverseFetcher, UniverseSource};
pub use yahoo::YahooProvider;
