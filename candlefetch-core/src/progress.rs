//! Progress reporting for multi-symbol fetch runs.
//!
//! Progress is reported at symbol granularity; per-month downloads and
//! corrupt-file repairs are informational. Implementations must tolerate
//! concurrent calls from pool workers.

use crate::error::FetchError;
use crate::month::MonthKey;
use crate::timeframe::Timeframe;

/// Progress callbacks for a fetch run.
pub trait FetchProgress: Send + Sync {
    /// A worker claimed a symbol and is about to walk its timeframes.
    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize);

    /// All timeframe walks for a symbol finished (or the first one failed).
    fn on_symbol_done(&self, symbol: &str, result: &Result<(), FetchError>);

    /// The symbol does not end in a configured quote suffix — no downloads.
    fn on_symbol_skipped(&self, symbol: &str);

    /// One month's archive was downloaded.
    fn on_month_downloaded(&self, symbol: &str, timeframe: Timeframe, month: MonthKey);

    /// A corrupt local file was deleted and replaced.
    fn on_corrupt_repaired(&self, symbol: &str, timeframe: Timeframe, month: MonthKey);

    /// The whole run finished (or drained after cancellation).
    fn on_batch_complete(&self, succeeded: usize, failed: usize, skipped: usize, total: usize);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_symbol_done(&self, symbol: &str, result: &Result<(), FetchError>) {
        match result {
            Ok(()) => println!("  OK: {symbol}"),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_symbol_skipped(&self, symbol: &str) {
        println!("  skip {symbol}: no configured quote suffix");
    }

    fn on_month_downloaded(&self, symbol: &str, timeframe: Timeframe, month: MonthKey) {
        println!("  downloaded {symbol} {timeframe} {month}");
    }

    fn on_corrupt_repaired(&self, symbol: &str, timeframe: Timeframe, month: MonthKey) {
        println!("  repaired corrupt archive {symbol} {timeframe} {month}");
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, skipped: usize, total: usize) {
        println!(
            "\nFetch complete: {succeeded}/{total} succeeded, {failed} failed, {skipped} skipped"
        );
    }
}

/// Silent progress reporter for tests and embedding.
pub struct NullProgress;

impl FetchProgress for NullProgress {
    fn on_symbol_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_symbol_done(&self, _symbol: &str, _result: &Result<(), FetchError>) {}
    fn on_symbol_skipped(&self, _symbol: &str) {}
    fn on_month_downloaded(&self, _symbol: &str, _timeframe: Timeframe, _month: MonthKey) {}
    fn on_corrupt_repaired(&self, _symbol: &str, _timeframe: Timeframe, _month: MonthKey) {}
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _skipped: usize, _total: usize) {
    }
}
