//! Filesystem artifacts — the file-based hand-off between stages.
//!
//! Everything lives under one data directory:
//!
//! ```text
//! {data_dir}/raw/tickers.csv           stage 1 output (tabular)
//! {data_dir}/raw/tickers.json          stage 1 output (structured)
//! {data_dir}/raw/prices.csv            stage 2 output (long format)
//! {data_dir}/processed/master.csv      stage 3 output
//! {data_dir}/processed/close_prices.csv
//! {data_dir}/processed/volumes.csv
//! {data_dir}/reports/download_summary.json
//! {data_dir}/reports/failed_tickers.csv
//! {data_dir}/reports/quality_report.json
//! {data_dir}/logs/{stage}.log
//! ```
//!
//! A stage's reader fails with `MissingPrerequisite` naming both the file
//! and the stage that produces it, which is what the orchestrator surfaces
//! when a stage is skipped without its input being present.

use crate::data::clean::{CleanRow, QualityReport};
use crate::data::download::DownloadSummary;
use crate::data::pivot::WideMatrix;
use crate::data::provider::PriceRow;
use crate::data::universe::TickerRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from artifact I/O.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("missing input file {path} — run the `{stage}` stage first")]
    MissingPrerequisite { path: String, stage: String },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {path}: {reason}")]
    Malformed { path: String, reason: String },
}

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn malformed(path: &Path, reason: impl ToString) -> Self {
        Self::Malformed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Paths of every pipeline artifact under one data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn tickers_csv(&self) -> PathBuf {
        self.root.join("raw").join("tickers.csv")
    }

    pub fn tickers_json(&self) -> PathBuf {
        self.root.join("raw").join("tickers.json")
    }

    pub fn prices_csv(&self) -> PathBuf {
        self.root.join("raw").join("prices.csv")
    }

    pub fn master_csv(&self) -> PathBuf {
        self.root.join("processed").join("master.csv")
    }

    pub fn close_prices_csv(&self) -> PathBuf {
        self.root.join("processed").join("close_prices.csv")
    }

    pub fn volumes_csv(&self) -> PathBuf {
        self.root.join("processed").join("volumes.csv")
    }

    pub fn download_summary_json(&self) -> PathBuf {
        self.root.join("reports").join("download_summary.json")
    }

    pub fn failed_tickers_csv(&self) -> PathBuf {
        self.root.join("reports").join("failed_tickers.csv")
    }

    pub fn quality_report_json(&self) -> PathBuf {
        self.root.join("reports").join("quality_report.json")
    }

    /// Create the directory tree.
    pub fn ensure_dirs(&self) -> Result<(), ArtifactError> {
        for dir in ["raw", "processed", "reports", "logs"] {
            let path = self.root.join(dir);
            std::fs::create_dir_all(&path).map_err(|e| ArtifactError::io(&path, e))?;
        }
        Ok(())
    }

    /// Prerequisite check: the named stage must already have produced `path`.
    pub fn require(&self, path: PathBuf, stage: &str) -> Result<PathBuf, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::MissingPrerequisite {
                path: path.display().to_string(),
                stage: stage.to_string(),
            });
        }
        Ok(path)
    }
}

// ─── Tickers ────────────────────────────────────────────────────────

/// Structured ticker file shape (`tickers.json`).
#[derive(Debug, Serialize, Deserialize)]
pub struct TickerFile {
    pub count: usize,
    pub tickers: Vec<String>,
}

/// Write the universe in both formats.
pub fn write_tickers(layout: &DataLayout, records: &[TickerRecord]) -> Result<(), ArtifactError> {
    let csv_path = layout.tickers_csv();
    let mut wtr = csv::Writer::from_path(&csv_path).map_err(|e| csv_err(&csv_path, e))?;
    for record in records {
        wtr.serialize(record).map_err(|e| csv_err(&csv_path, e))?;
    }
    wtr.flush().map_err(|e| ArtifactError::io(&csv_path, e))?;

    let file = TickerFile {
        count: records.len(),
        tickers: records.iter().map(|r| r.symbol.clone()).collect(),
    };
    write_json(&layout.tickers_json(), &file)
}

/// Load the universe back for the download stage.
pub fn load_tickers(layout: &DataLayout) -> Result<Vec<TickerRecord>, ArtifactError> {
    let path = layout.require(layout.tickers_csv(), "fetch")?;
    let mut rdr = csv::Reader::from_path(&path).map_err(|e| csv_err(&path, e))?;
    let mut records = Vec::new();
    for row in rdr.deserialize::<TickerRecord>() {
        records.push(row.map_err(|e| ArtifactError::malformed(&path, e))?);
    }
    Ok(records)
}

// ─── Raw price table ────────────────────────────────────────────────

pub fn write_price_rows(path: &Path, rows: &[PriceRow]) -> Result<(), ArtifactError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    for row in rows {
        wtr.serialize(row).map_err(|e| csv_err(path, e))?;
    }
    wtr.flush().map_err(|e| ArtifactError::io(path, e))
}

pub fn read_price_rows(layout: &DataLayout) -> Result<Vec<PriceRow>, ArtifactError> {
    let path = layout.require(layout.prices_csv(), "download")?;
    let mut rdr = csv::Reader::from_path(&path).map_err(|e| csv_err(&path, e))?;
    let mut rows = Vec::new();
    for row in rdr.deserialize::<PriceRow>() {
        rows.push(row.map_err(|e| ArtifactError::malformed(&path, e))?);
    }
    Ok(rows)
}

// ─── Cleaned outputs ────────────────────────────────────────────────

pub fn write_clean_rows(path: &Path, rows: &[CleanRow]) -> Result<(), ArtifactError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    for row in rows {
        wtr.serialize(row).map_err(|e| csv_err(path, e))?;
    }
    wtr.flush().map_err(|e| ArtifactError::io(path, e))
}

/// Write a wide matrix: first column `date`, one column per ticker,
/// empty cell where a ticker has no bar.
pub fn write_matrix(path: &Path, matrix: &WideMatrix) -> Result<(), ArtifactError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;

    let mut header = vec!["date".to_string()];
    header.extend(matrix.tickers.iter().cloned());
    wtr.write_record(&header).map_err(|e| csv_err(path, e))?;

    for (r, date) in matrix.dates.iter().enumerate() {
        let mut record = vec![date.to_string()];
        for cell in &matrix.values[r] {
            record.push(cell.map(|v| v.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record).map_err(|e| csv_err(path, e))?;
    }
    wtr.flush().map_err(|e| ArtifactError::io(path, e))
}

/// Read a wide matrix back (inverse of `write_matrix`).
pub fn read_matrix(path: &Path) -> Result<WideMatrix, ArtifactError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| csv_err(path, e))?;

    let headers = rdr.headers().map_err(|e| csv_err(path, e))?.clone();
    if headers.is_empty() || &headers[0] != "date" {
        return Err(ArtifactError::malformed(path, "first column must be `date`"));
    }
    let tickers: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();

    let mut dates = Vec::new();
    let mut values = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| csv_err(path, e))?;
        let date = record
            .get(0)
            .and_then(|s| s.parse::<chrono::NaiveDate>().ok())
            .ok_or_else(|| ArtifactError::malformed(path, "unparseable date cell"))?;

        let mut row = Vec::with_capacity(tickers.len());
        for cell in record.iter().skip(1) {
            if cell.is_empty() {
                row.push(None);
            } else {
                let v = cell
                    .parse::<f64>()
                    .map_err(|e| ArtifactError::malformed(path, e))?;
                row.push(Some(v));
            }
        }
        dates.push(date);
        values.push(row);
    }

    Ok(WideMatrix {
        dates,
        tickers,
        values,
    })
}

// ─── Reports ────────────────────────────────────────────────────────

pub fn write_download_summary(
    layout: &DataLayout,
    summary: &DownloadSummary,
) -> Result<(), ArtifactError> {
    write_json(&layout.download_summary_json(), summary)
}

pub fn write_quality_report(
    layout: &DataLayout,
    report: &QualityReport,
) -> Result<(), ArtifactError> {
    write_json(&layout.quality_report_json(), report)
}

/// Failure list for operator follow-up, one ticker per row.
pub fn write_failed_tickers(layout: &DataLayout, failed: &[String]) -> Result<(), ArtifactError> {
    let path = layout.failed_tickers_csv();
    let mut wtr = csv::Writer::from_path(&path).map_err(|e| csv_err(&path, e))?;
    wtr.write_record(["ticker"]).map_err(|e| csv_err(&path, e))?;
    for ticker in failed {
        wtr.write_record([ticker]).map_err(|e| csv_err(&path, e))?;
    }
    wtr.flush().map_err(|e| ArtifactError::io(&path, e))
}

// ─── Helpers ────────────────────────────────────────────────────────

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ArtifactError::malformed(path, e))?;
    std::fs::write(path, json).map_err(|e| ArtifactError::io(path, e))
}

fn csv_err(path: &Path, e: csv::Error) -> ArtifactError {
    ArtifactError::Malformed {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
