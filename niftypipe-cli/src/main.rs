//! NiftyPipe CLI — fetch, download, clean, and run commands.
//!
//! Commands:
//! - `fetch` — fetch the NIFTY 500 constituent list and persist it
//! - `download` — download daily OHLCV bars for the fetched tickers
//! - `clean` — clean the raw table and emit processed views plus reports
//! - `run` — run the full pipeline, with per-stage skip flags
//!
//! A stage may be skipped only if its input artifact already exists; the
//! orchestrator fails fast naming the missing prerequisite otherwise.
//! Partial per-ticker failures are reported but do not fail the run; total
//! stage failure exits non-zero.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use niftypipe_core::artifacts::{self, DataLayout};
use niftypipe_core::config::PipelineConfig;
use niftypipe_core::data::clean::QualityReport;
use niftypipe_core::data::download::DownloadSummary;
use niftypipe_core::data::provider::DataProvider;
use niftypipe_core::data::{
    clean, download_all, pivot_close, pivot_volume, universe, DownloadOptions, StdoutProgress,
    SyntheticProvider, UniverseFetcher, UniverseSource, YahooProvider,
};
use niftypipe_core::runlog::RunLog;

#[derive(Parser)]
#[command(
    name = "niftypipe",
    about = "NIFTY 500 data pipeline — fetch tickers, download OHLCV history, clean"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the NIFTY 500 constituent list (embedded fallback on failure).
    Fetch {
        /// Data directory. Defaults to the configured value (./data).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Download daily OHLCV bars for every fetched ticker.
    Download {
        /// Start date (YYYY-MM-DD). Defaults to 2000-01-01.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Retries per ticker after the first attempt.
        #[arg(long)]
        max_retries: Option<u32>,

        /// Use the deterministic synthetic provider (no network).
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Data directory. Defaults to the configured value (./data).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Clean the raw table: dedup, validate, fill, pivot, report.
    Clean {
        /// Data directory. Defaults to the configured value (./data).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run fetch → download → clean in sequence.
    Run {
        /// Start date (YYYY-MM-DD). Defaults to 2000-01-01.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Retries per ticker after the first attempt.
        #[arg(long)]
        max_retries: Option<u32>,

        /// Use the deterministic synthetic provider (no network).
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Skip the fetch stage (requires an existing ticker file).
        #[arg(long, default_value_t = false)]
        skip_fetch: bool,

        /// Skip the download stage (requires an existing raw table).
        #[arg(long, default_value_t = false)]
        skip_download: bool,

        /// Skip the clean stage.
        #[arg(long, default_value_t = false)]
        skip_clean: bool,

        /// Data directory. Defaults to the configured value (./data).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch { data_dir, config } => {
            let cfg = load_config(config.as_deref(), data_dir, None)?;
            stage_fetch(&cfg)?;
            Ok(())
        }
        Commands::Download {
            start,
            end,
            max_retries,
            synthetic,
            data_dir,
            config,
        } => {
            let cfg = load_config(config.as_deref(), data_dir, max_retries)?;
            let (start, end) = parse_range(start.as_deref(), end.as_deref())?;
            stage_download(&cfg, start, end, synthetic)?;
            Ok(())
        }
        Commands::Clean { data_dir, config } => {
            let cfg = load_config(config.as_deref(), data_dir, None)?;
            stage_clean(&cfg)?;
            Ok(())
        }
        Commands::Run {
            start,
            end,
            max_retries,
            synthetic,
            skip_fetch,
            skip_download,
            skip_clean,
            data_dir,
            config,
        } => {
            let cfg = load_config(config.as_deref(), data_dir, max_retries)?;
            let (start, end) = parse_range(start.as_deref(), end.as_deref())?;
            run_pipeline(&cfg, start, end, synthetic, skip_fetch, skip_download, skip_clean)
        }
    }
}

/// Load the config file (or defaults) and apply CLI overrides.
fn load_config(
    config: Option<&Path>,
    data_dir: Option<PathBuf>,
    max_retries: Option<u32>,
) -> Result<PipelineConfig> {
    let mut cfg = match config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = data_dir {
        cfg.data_dir = dir;
    }
    if let Some(retries) = max_retries {
        cfg.download.max_retries = retries;
    }
    Ok(cfg)
}

fn parse_range(start: Option<&str>, end: Option<&str>) -> Result<(NaiveDate, NaiveDate)> {
    let start = start
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("invalid --start date (expected YYYY-MM-DD)")?
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());

    let end = end
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("invalid --end date (expected YYYY-MM-DD)")?
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    if end < start {
        bail!("--end ({end}) is before --start ({start})");
    }
    Ok((start, end))
}

// ─── Stages ─────────────────────────────────────────────────────────

fn stage_fetch(cfg: &PipelineConfig) -> Result<usize> {
    let layout = DataLayout::new(&cfg.data_dir);
    layout.ensure_dirs()?;
    let log = RunLog::open(&layout.logs_dir(), "fetch");
    log.banner("TICKER FETCH");

    let fetcher = UniverseFetcher::new(cfg.download.timeout());
    let (records, source) = fetcher.fetch()?;

    match source {
        UniverseSource::Remote => {
            log.line(&format!("fetched {} tickers from index listing", records.len()));
        }
        UniverseSource::Fallback => {
            log.line(&format!(
                "index listing unavailable — using embedded fallback list ({} tickers)",
                records.len()
            ));
        }
    }

    artifacts::write_tickers(&layout, &records)?;
    log.line(&format!("saved universe to {}", layout.tickers_csv().display()));
    println!(
        "Fetched {} tickers -> {}",
        records.len(),
        layout.tickers_csv().display()
    );
    Ok(records.len())
}

fn stage_download(
    cfg: &PipelineConfig,
    start: NaiveDate,
    end: NaiveDate,
    synthetic: bool,
) -> Result<DownloadSummary> {
    let layout = DataLayout::new(&cfg.data_dir);
    layout.ensure_dirs()?;
    let log = RunLog::open(&layout.logs_dir(), "download");
    log.banner("HISTORICAL DATA DOWNLOAD");

    let records = artifacts::load_tickers(&layout)?;
    if records.is_empty() {
        bail!(
            "ticker file {} contains no tickers",
            layout.tickers_csv().display()
        );
    }

    let symbols: Vec<String> = records
        .iter()
        .map(|r| universe::yahoo_symbol(&r.symbol))
        .collect();

    let provider: Box<dyn DataProvider> = if synthetic {
        Box::new(SyntheticProvider)
    } else {
        Box::new(YahooProvider::new(cfg.download.timeout()))
    };

    let opts = DownloadOptions {
        start,
        end,
        max_retries: cfg.download.max_retries,
        retry_delay: cfg.download.retry_delay(),
        request_delay: cfg.download.request_delay(),
    };

    let result = download_all(provider.as_ref(), &symbols, &opts, &StdoutProgress, &log);

    // Reports are written even on total failure, for operator follow-up
    artifacts::write_download_summary(&layout, &result.summary)?;
    artifacts::write_failed_tickers(&layout, &result.summary.failed_tickers)?;

    if result.rows.is_empty() {
        bail!(
            "no rows downloaded for any ticker — see {}",
            layout.failed_tickers_csv().display()
        );
    }

    artifacts::write_price_rows(&layout.prices_csv(), &result.rows)?;
    log.line(&format!(
        "saved {} raw rows to {}",
        result.rows.len(),
        layout.prices_csv().display()
    ));

    if !result.summary.all_succeeded() {
        eprintln!(
            "WARNING: {} ticker(s) failed — see {}",
            result.summary.failed,
            layout.failed_tickers_csv().display()
        );
    }

    Ok(result.summary)
}

fn stage_clean(cfg: &PipelineConfig) -> Result<QualityReport> {
    let layout = DataLayout::new(&cfg.data_dir);
    layout.ensure_dirs()?;
    let log = RunLog::open(&layout.logs_dir(), "clean");
    log.banner("DATA CLEANING");

    let raw = artifacts::read_price_rows(&layout)?;
    log.line(&format!("loaded {} raw rows", raw.len()));

    let result = clean(raw, &cfg.clean_options())?;

    artifacts::write_clean_rows(&layout.master_csv(), &result.rows)?;
    artifacts::write_matrix(&layout.close_prices_csv(), &pivot_close(&result.rows))?;
    artifacts::write_matrix(&layout.volumes_csv(), &pivot_volume(&result.rows))?;
    artifacts::write_quality_report(&layout, &result.report)?;

    log.line(&format!(
        "cleaned {} -> {} rows ({} duplicates, {} invalid, {} values filled)",
        result.report.initial_rows,
        result.report.final_rows,
        result.report.duplicates_removed,
        result.report.invalid_rows_dropped,
        result.report.filled_values
    ));

    print_clean_summary(&result.report);
    Ok(result.report)
}

#[allow(clippy::too_many_arguments)]
fn run_pipeline(
    cfg: &PipelineConfig,
    start: NaiveDate,
    end: NaiveDate,
    synthetic: bool,
    skip_fetch: bool,
    skip_download: bool,
    skip_clean: bool,
) -> Result<()> {
    let layout = DataLayout::new(&cfg.data_dir);
    let started = Instant::now();

    let ticker_count = if skip_fetch {
        // Skipping is only legal when the artifact is already on disk
        layout.require(layout.tickers_csv(), "fetch")?;
        let count = artifacts::load_tickers(&layout)?.len();
        println!("Skipping fetch ({count} tickers already on disk)");
        count
    } else {
        stage_fetch(cfg)?
    };

    let summary = if skip_download {
        layout.require(layout.prices_csv(), "download")?;
        println!("Skipping download (raw table already on disk)");
        None
    } else {
        Some(stage_download(cfg, start, end, synthetic)?)
    };

    let report = if skip_clean {
        println!("Skipping clean");
        None
    } else {
        Some(stage_clean(cfg)?)
    };

    println!();
    println!("=== Pipeline Summary ===");
    println!("Tickers:        {ticker_count}");
    match &summary {
        Some(s) => println!(
            "Downloaded:     {} rows ({}/{} tickers, {:.2}% success)",
            s.rows, s.succeeded, s.total_tickers, s.success_rate
        ),
        None => println!("Downloaded:     (skipped)"),
    }
    match &report {
        Some(r) => println!(
            "Cleaned:        {} rows (quality {:.2}/100)",
            r.final_rows, r.quality_score
        ),
        None => println!("Cleaned:        (skipped)"),
    }
    println!("Duration:       {:.1}s", started.elapsed().as_secs_f64());
    println!();
    println!("Output files:");
    println!("  {}", layout.tickers_csv().display());
    println!("  {}", layout.prices_csv().display());
    if report.is_some() {
        println!("  {}", layout.master_csv().display());
        println!("  {}", layout.close_prices_csv().display());
        println!("  {}", layout.volumes_csv().display());
        println!("  {}", layout.quality_report_json().display());
    }
    println!("  {}", layout.download_summary_json().display());

    Ok(())
}

fn print_clean_summary(report: &QualityReport) {
    println!();
    println!("=== Cleaning Summary ===");
    println!("Initial rows:       {}", report.initial_rows);
    println!("Final rows:         {}", report.final_rows);
    println!("Duplicates removed: {}", report.duplicates_removed);
    println!("Values filled:      {}", report.filled_values);
    println!("Invalid dropped:    {}", report.invalid_rows_dropped);
    println!("Tickers:            {}", report.tickers_processed);
    println!("Avg history:        {:.1} days", report.avg_history_days);
    println!(
        "Date range:         {} to {} ({} trading days)",
        report.date_range.earliest, report.date_range.latest, report.date_range.trading_days
    );
    if !report.low_coverage_tickers.is_empty() {
        println!(
            "Low coverage:       {} ticker(s)",
            report.low_coverage_tickers.len()
        );
    }
    if !report.insufficient_history_tickers.is_empty() {
        println!(
            "Short history:      {} ticker(s)",
            report.insufficient_history_tickers.len()
        );
    }
    println!("Quality score:      {:.2}/100", report.quality_score);
}
