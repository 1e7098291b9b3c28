//! Local archive tree — path layout, gzip container validation, status.
//!
//! Layout: `{root}/{symbol}/{timeframe}/{symbol}-{yyyymm}.csv.gz`
//!
//! The tree is partitioned by (symbol, timeframe), so concurrent walks never
//! touch the same path. Downloads land as `.tmp` files and are renamed into
//! place, so a partially written file is never mistaken for an archive.

use crate::error::FetchError;
use crate::month::MonthKey;
use crate::timeframe::Timeframe;
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// The local archive tree rooted at the configured output directory.
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if absent.
    pub fn ensure_root(&self) -> Result<(), FetchError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| FetchError::Storage(format!("create {}: {e}", self.root.display())))
    }

    /// Directory holding one (symbol, timeframe) partition.
    pub fn pair_dir(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.root.join(symbol).join(timeframe.as_str())
    }

    /// Create the (symbol, timeframe) directory if absent and return it.
    pub fn ensure_pair_dir(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<PathBuf, FetchError> {
        let dir = self.pair_dir(symbol, timeframe);
        fs::create_dir_all(&dir)
            .map_err(|e| FetchError::Storage(format!("create {}: {e}", dir.display())))?;
        Ok(dir)
    }

    /// Path of one archive file: `{root}/{symbol}/{tf}/{symbol}-{yyyymm}.csv.gz`
    pub fn archive_path(&self, symbol: &str, timeframe: Timeframe, month: MonthKey) -> PathBuf {
        self.pair_dir(symbol, timeframe)
            .join(format!("{symbol}-{}.csv.gz", month.yyyymm()))
    }

    /// Delete a local archive file (used after failed validation).
    pub fn remove(&self, path: &Path) -> Result<(), FetchError> {
        fs::remove_file(path)
            .map_err(|e| FetchError::Storage(format!("remove {}: {e}", path.display())))
    }

    /// Per-symbol file count and byte size, sorted by symbol.
    pub fn status(&self) -> Result<Vec<SymbolStatus>, FetchError> {
        let mut rows = Vec::new();
        if !self.root.exists() {
            return Ok(rows);
        }

        let entries = fs::read_dir(&self.root)
            .map_err(|e| FetchError::Storage(format!("read {}: {e}", self.root.display())))?;

        for entry in entries {
            let entry = entry.map_err(|e| FetchError::Storage(format!("dir entry: {e}")))?;
            if !entry.path().is_dir() {
                continue;
            }
            let symbol = entry.file_name().to_string_lossy().to_string();
            let (files, bytes) = count_archives(&entry.path());
            rows.push(SymbolStatus {
                symbol,
                files,
                bytes,
            });
        }

        rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(rows)
    }
}

/// File count and total size for one symbol directory.
#[derive(Debug, Clone)]
pub struct SymbolStatus {
    pub symbol: String,
    pub files: usize,
    pub bytes: u64,
}

/// Whether a file opens as a gzip stream yielding at least one byte.
///
/// An empty payload counts as invalid — an archive month always has content,
/// so a zero-byte stream means a truncated or bogus download.
pub fn gzip_is_valid(path: &Path) -> bool {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let mut decoder = GzDecoder::new(file);
    let mut byte = [0u8; 1];
    matches!(decoder.read(&mut byte), Ok(1))
}

/// Count `.csv.gz` files (and their bytes) under a symbol's timeframe dirs.
fn count_archives(symbol_dir: &Path) -> (usize, u64) {
    let mut files = 0usize;
    let mut bytes = 0u64;

    let Ok(tf_entries) = fs::read_dir(symbol_dir) else {
        return (files, bytes);
    };
    for tf_entry in tf_entries.flatten() {
        let Ok(archives) = fs::read_dir(tf_entry.path()) else {
            continue;
        };
        for archive in archives.flatten() {
            let name = archive.file_name();
            if !name.to_string_lossy().ends_with(".csv.gz") {
                continue;
            }
            files += 1;
            if let Ok(meta) = archive.metadata() {
                bytes += meta.len();
            }
        }
    }

    (files, bytes)
}
