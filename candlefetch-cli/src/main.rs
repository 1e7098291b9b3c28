//! candlefetch CLI — batch download of Gate.io candlestick archives.
//!
//! Commands:
//! - `fetch` — discover trading pairs and download their monthly archives
//! - `symbols` — list discovered pairs and their download eligibility
//! - `status` — summarize the local archive tree

use anyhow::{Context, Result};
use candlefetch_core::{
    discover_symbols, is_eligible, sync_all, ArchiveClient, ArchiveStore, FetchConfig,
    StdoutProgress, Timeframe,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "candlefetch",
    about = "candlefetch — Gate.io candlestick archive downloader"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover trading pairs and download their monthly candlestick archives.
    Fetch {
        /// Path to a TOML config file. Flags below override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Root output directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Quote assets, comma separated (e.g. USDT,BTC,ETH).
        #[arg(long)]
        quotes: Option<String>,

        /// Timeframes, comma separated (e.g. 1m,5m,1h,4h,1d).
        #[arg(long)]
        timeframes: Option<String>,

        /// Symbols processed in parallel (outer pool).
        #[arg(long)]
        symbol_workers: Option<usize>,

        /// Timeframes processed in parallel per symbol (inner pool).
        #[arg(long)]
        timeframe_workers: Option<usize>,

        /// Days before today at which the backward walk starts.
        #[arg(long)]
        offset_days: Option<i64>,
    },
    /// List discovered trading pairs and whether each would be downloaded.
    Symbols {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Quote assets, comma separated (e.g. USDT,BTC,ETH).
        #[arg(long)]
        quotes: Option<String>,
    },
    /// Summarize the local archive tree (files and bytes per symbol).
    Status {
        /// Root output directory.
        #[arg(long, default_value = "data/gateio")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            config,
            output_dir,
            quotes,
            timeframes,
            symbol_workers,
            timeframe_workers,
            offset_days,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }
            if let Some(quotes) = quotes {
                cfg.quote_assets = parse_quotes(&quotes);
            }
            if let Some(timeframes) = timeframes {
                cfg.timeframes = parse_timeframes(&timeframes)?;
            }
            if let Some(n) = symbol_workers {
                cfg.symbol_workers = n;
            }
            if let Some(n) = timeframe_workers {
                cfg.timeframe_workers = n;
            }
            if let Some(days) = offset_days {
                cfg.history_offset_days = days;
            }
            run_fetch(cfg)
        }
        Commands::Symbols { config, quotes } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(quotes) = quotes {
                cfg.quote_assets = parse_quotes(&quotes);
            }
            run_symbols(cfg)
        }
        Commands::Status { output_dir } => run_status(output_dir),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<FetchConfig> {
    match path {
        Some(path) => FetchConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(FetchConfig::default()),
    }
}

fn parse_quotes(s: &str) -> Vec<String> {
    s.split(',')
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}

fn parse_timeframes(s: &str) -> Result<Vec<Timeframe>> {
    s.split(',')
        .map(|code| code.trim().parse::<Timeframe>().map_err(Into::into))
        .collect()
}

fn run_fetch(cfg: FetchConfig) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            eprintln!("\ninterrupt received — draining in-flight downloads...");
            cancel.store(true, Ordering::SeqCst);
        })
        .context("installing interrupt handler")?;
    }

    let client = ArchiveClient::new(&cfg);
    let store = ArchiveStore::new(&cfg.output_dir);
    let today = chrono::Local::now().date_naive();

    let summary = sync_all(&cfg, &client, &store, today, &StdoutProgress, &cancel)?;

    println!(
        "Months downloaded: {} ({} repaired)",
        summary.months_downloaded, summary.months_repaired
    );
    if summary.cancelled {
        println!(
            "Interrupted: {} of {} symbols fully processed, {} cut short.",
            summary.succeeded + summary.failed + summary.skipped,
            summary.total,
            summary.interrupted
        );
    }
    if !summary.all_succeeded() {
        for (symbol, err) in &summary.errors {
            eprintln!("Error for {symbol}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_symbols(cfg: FetchConfig) -> Result<()> {
    let client = ArchiveClient::new(&cfg);
    let symbols = discover_symbols(client.http(), &cfg)?;

    let mut eligible = 0usize;
    for symbol in &symbols {
        if is_eligible(symbol, &cfg.quote_assets) {
            eligible += 1;
            println!("{symbol}");
        } else {
            println!("{symbol} (skipped: no configured quote suffix)");
        }
    }
    println!("\n{} pairs, {} eligible for download", symbols.len(), eligible);

    Ok(())
}

fn run_status(output_dir: PathBuf) -> Result<()> {
    let store = ArchiveStore::new(&output_dir);
    let rows = store.status()?;

    if rows.is_empty() {
        println!("Archive is empty: {}", store.root().display());
        return Ok(());
    }

    let total_files: usize = rows.iter().map(|r| r.files).sum();
    let total_bytes: u64 = rows.iter().map(|r| r.bytes).sum();

    println!("Archive: {}", store.root().display());
    println!("Symbols: {}", rows.len());
    println!("Files: {total_files}");
    println!("Total size: {}", format_size(total_bytes));
    println!();
    println!("{:<16} {:>8} {:>10}", "Symbol", "Files", "Size");
    println!("{}", "-".repeat(36));
    for row in &rows {
        println!(
            "{:<16} {:>8} {:>10}",
            row.symbol,
            row.files,
            format_size(row.bytes)
        );
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
