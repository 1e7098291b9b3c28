//! Backward month walk for one (symbol, timeframe) pair.
//!
//! Months are visited strictly sequentially and strictly descending. The
//! ordering is load-bearing: the walk terminates at the first month the
//! remote reports missing, so skipping ahead or reordering would mis-detect
//! the data horizon.

use crate::archive::{ArchiveClient, DownloadOutcome};
use crate::config::FetchConfig;
use crate::discovery::is_eligible;
use crate::error::FetchError;
use crate::month::MonthKey;
use crate::progress::FetchProgress;
use crate::store::{gzip_is_valid, ArchiveStore};
use crate::timeframe::Timeframe;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The remote returned 404 for a month — the data horizon was reached.
    HorizonReached,
    /// The walk ran all the way down to the configured earliest month.
    FloorReached,
    /// The cancel flag was set between months.
    Cancelled,
    /// The symbol has no configured quote suffix — nothing was done.
    Skipped,
}

/// Counters for one completed walk.
#[derive(Debug, Clone)]
pub struct WalkStats {
    /// Local files that already existed and validated.
    pub validated: usize,
    /// Months downloaded fresh.
    pub downloaded: usize,
    /// Corrupt files deleted and re-downloaded.
    pub repaired: usize,
    pub stop: StopReason,
}

impl WalkStats {
    fn new(stop: StopReason) -> Self {
        Self {
            validated: 0,
            downloaded: 0,
            repaired: 0,
            stop,
        }
    }
}

/// Walk one (symbol, timeframe) pair backward from the start month.
///
/// For each month: an existing valid file is kept; an existing corrupt file
/// is deleted and re-downloaded exactly once; a missing file is downloaded.
/// A 404 terminates the walk (including on a corrupt-file re-download). A
/// transport error that survives the client's bounded retries fails this
/// walk only — sibling walks are unaffected.
#[allow(clippy::too_many_arguments)]
pub fn run_walk(
    client: &ArchiveClient,
    store: &ArchiveStore,
    config: &FetchConfig,
    symbol: &str,
    timeframe: Timeframe,
    today: NaiveDate,
    progress: &dyn FetchProgress,
    cancel: &AtomicBool,
) -> Result<WalkStats, FetchError> {
    if !is_eligible(symbol, &config.quote_assets) {
        return Ok(WalkStats::new(StopReason::Skipped));
    }

    store.ensure_pair_dir(symbol, timeframe)?;

    let start = config.start_month(today);
    let mut stats = WalkStats::new(StopReason::FloorReached);

    for month in MonthKey::walk_back(start, config.floor) {
        if cancel.load(Ordering::Relaxed) {
            stats.stop = StopReason::Cancelled;
            return Ok(stats);
        }

        let path = store.archive_path(symbol, timeframe, month);
        let url = client.archive_url(symbol, timeframe, month);

        if path.exists() {
            if gzip_is_valid(&path) {
                stats.validated += 1;
                continue;
            }
            // Corrupt: delete, re-download once. A 404 here is the same
            // end-of-data signal as on a fresh download.
            store.remove(&path)?;
            match client.download(&url, &path)? {
                DownloadOutcome::Downloaded => {
                    stats.repaired += 1;
                    progress.on_corrupt_repaired(symbol, timeframe, month);
                }
                DownloadOutcome::NotFound => {
                    stats.stop = StopReason::HorizonReached;
                    return Ok(stats);
                }
            }
        } else {
            match client.download(&url, &path)? {
                DownloadOutcome::Downloaded => {
                    stats.downloaded += 1;
                    progress.on_month_downloaded(symbol, timeframe, month);
                }
                DownloadOutcome::NotFound => {
                    stats.stop = StopReason::HorizonReached;
                    return Ok(stats);
                }
            }
        }
    }

    Ok(stats)
}
