//! candlefetch core — batch downloader for Gate.io candlestick archives.
//!
//! Two phases with no feedback loop: discover trading pairs settled in the
//! configured quote assets, then for each (symbol, timeframe) walk backward
//! one calendar month at a time downloading gzip'd CSV archives until the
//! remote reports no more data. Bounded two-level worker pools fan out the
//! walks; the filesystem is partitioned by (symbol, timeframe) so workers
//! never share a path.

pub mod archive;
pub mod config;
pub mod discovery;
pub mod error;
pub mod month;
pub mod pool;
pub mod progress;
pub mod store;
pub mod sync;
pub mod timeframe;
pub mod walk;

pub use archive::{ArchiveClient, DownloadOutcome};
pub use config::FetchConfig;
pub use discovery::{discover_symbols, is_eligible};
pub use error::FetchError;
pub use month::MonthKey;
pub use progress::{FetchProgress, NullProgress, StdoutProgress};
pub use store::{ArchiveStore, SymbolStatus};
pub use sync::{sync_all, FetchSummary};
pub use timeframe::Timeframe;
pub use walk::{run_walk, StopReason, WalkStats};
