//! Orchestration — discovery, then a two-level worker-pool fan-out.
//!
//! The outer pool runs one task per symbol; inside each symbol task an inner
//! pool runs one task per timeframe. The filesystem is partitioned by
//! (symbol, timeframe), so workers never contend on a path and no locks are
//! needed beyond the result accumulators. Peak concurrent connections are
//! bounded by `symbol_workers * timeframe_workers`.

use crate::archive::ArchiveClient;
use crate::config::FetchConfig;
use crate::discovery::{discover_symbols, is_eligible};
use crate::error::FetchError;
use crate::pool::run_indexed;
use crate::progress::FetchProgress;
use crate::store::ArchiveStore;
use crate::walk::{run_walk, StopReason, WalkStats};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Result of one symbol: every timeframe walk's outcome, or the error that
/// failed the symbol.
enum SymbolResult {
    Skipped,
    Completed(Vec<WalkStats>),
    /// Cancellation cut the symbol short: some timeframes unclaimed or
    /// stopped mid-walk. Not a success — the symbol was not fully processed.
    Interrupted(Vec<WalkStats>),
    Failed(FetchError),
}

/// Summary of a full fetch run.
#[derive(Debug)]
pub struct FetchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Symbols whose timeframe walks were cut short by cancellation.
    pub interrupted: usize,
    /// Months downloaded fresh, across all symbols and timeframes.
    pub months_downloaded: usize,
    /// Corrupt files deleted and replaced.
    pub months_repaired: usize,
    /// Whether the run was interrupted and drained early.
    pub cancelled: bool,
    pub errors: Vec<(String, FetchError)>,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Run the whole batch: discover symbols, then walk every (symbol,
/// timeframe) pair under the two-level pool.
///
/// Discovery failure is fatal and returned as the error; a single walk's
/// failure marks its symbol failed in the summary without aborting siblings.
/// Setting `cancel` stops new work from being claimed and drains what is in
/// flight; partially downloaded files are not rolled back (the atomic
/// tmp-rename means no partial file is ever visible under its final name).
pub fn sync_all(
    config: &FetchConfig,
    client: &ArchiveClient,
    store: &ArchiveStore,
    today: NaiveDate,
    progress: &dyn FetchProgress,
    cancel: &AtomicBool,
) -> Result<FetchSummary, FetchError> {
    config.validate()?;

    let start = config.start_month(today);
    if start < config.floor {
        return Err(FetchError::InvalidConfig(format!(
            "floor {} is after the start month {start} — the walk would do nothing",
            config.floor
        )));
    }

    store.ensure_root()?;

    let symbols = discover_symbols(client.http(), config)?;
    let total = symbols.len();
    let results: Mutex<Vec<(String, SymbolResult)>> = Mutex::new(Vec::with_capacity(total));

    run_indexed(config.symbol_workers, total, cancel, |i| {
        let symbol = symbols[i].as_str();
        progress.on_symbol_start(symbol, i, total);

        let result = run_symbol(config, client, store, symbol, today, progress, cancel);
        let result = match result {
            SymbolResult::Skipped => {
                progress.on_symbol_skipped(symbol);
                SymbolResult::Skipped
            }
            SymbolResult::Completed(stats) => {
                progress.on_symbol_done(symbol, &Ok(()));
                SymbolResult::Completed(stats)
            }
            // No done callback: the symbol was cut short, not processed.
            SymbolResult::Interrupted(stats) => SymbolResult::Interrupted(stats),
            SymbolResult::Failed(e) => {
                let failed = Err(e);
                progress.on_symbol_done(symbol, &failed);
                let Err(e) = failed else { unreachable!() };
                SymbolResult::Failed(e)
            }
        };

        results.lock().unwrap().push((symbol.to_string(), result));
    });

    let mut summary = FetchSummary {
        total,
        succeeded: 0,
        failed: 0,
        skipped: 0,
        interrupted: 0,
        months_downloaded: 0,
        months_repaired: 0,
        cancelled: cancel.load(Ordering::Relaxed),
        errors: Vec::new(),
    };

    for (symbol, result) in results.into_inner().unwrap() {
        match result {
            SymbolResult::Skipped => summary.skipped += 1,
            SymbolResult::Completed(stats) => {
                summary.succeeded += 1;
                for s in &stats {
                    summary.months_downloaded += s.downloaded;
                    summary.months_repaired += s.repaired;
                }
            }
            SymbolResult::Interrupted(stats) => {
                summary.interrupted += 1;
                for s in &stats {
                    summary.months_downloaded += s.downloaded;
                    summary.months_repaired += s.repaired;
                }
            }
            SymbolResult::Failed(e) => {
                summary.failed += 1;
                summary.errors.push((symbol, e));
            }
        }
    }

    progress.on_batch_complete(
        summary.succeeded,
        summary.failed,
        summary.skipped,
        summary.total,
    );
    Ok(summary)
}

/// Walk every configured timeframe of one symbol under the inner pool.
fn run_symbol(
    config: &FetchConfig,
    client: &ArchiveClient,
    store: &ArchiveStore,
    symbol: &str,
    today: NaiveDate,
    progress: &dyn FetchProgress,
    cancel: &AtomicBool,
) -> SymbolResult {
    if !is_eligible(symbol, &config.quote_assets) {
        return SymbolResult::Skipped;
    }

    let timeframes = &config.timeframes;
    let walks: Mutex<Vec<Result<WalkStats, FetchError>>> =
        Mutex::new(Vec::with_capacity(timeframes.len()));

    run_indexed(config.timeframe_workers, timeframes.len(), cancel, |j| {
        let result = run_walk(
            client,
            store,
            config,
            symbol,
            timeframes[j],
            today,
            progress,
            cancel,
        );
        walks.lock().unwrap().push(result);
    });

    let mut stats = Vec::new();
    for walk in walks.into_inner().unwrap() {
        match walk {
            Ok(s) => stats.push(s),
            // First failed timeframe fails the symbol; the others already ran.
            Err(e) => return SymbolResult::Failed(e),
        }
    }

    // Fewer walks than timeframes means cancellation left some unclaimed;
    // a Cancelled stop means a walk quit mid-history. Either way the symbol
    // is not fully processed and must not count as a success.
    let cut_short = stats.len() < timeframes.len()
        || stats.iter().any(|s| s.stop == StopReason::Cancelled);
    if cut_short {
        SymbolResult::Interrupted(stats)
    } else {
        SymbolResult::Completed(stats)
    }
}
