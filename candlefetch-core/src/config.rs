//! Fetch configuration — explicit and injectable, no process-wide globals.
//!
//! Every knob the original tool hard-coded lives here so tests can inject
//! fixtures (mock server URLs, temp directories, fixed floors) without
//! touching shared state. Loadable from TOML; missing fields fall back to
//! the defaults that match the public Gate.io endpoints.

use crate::error::FetchError;
use crate::month::MonthKey;
use crate::timeframe::Timeframe;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a fetch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Base URL of the exchange REST API (currency-pair listing).
    pub api_base: String,

    /// Base URL of the static archive host (per-month gzip files).
    pub archive_base: String,

    /// Root of the local archive tree.
    pub output_dir: PathBuf,

    /// Quote-asset suffixes a symbol must end with to be downloaded.
    pub quote_assets: Vec<String>,

    /// Timeframes to walk per symbol.
    pub timeframes: Vec<Timeframe>,

    /// Outer pool size: symbols processed in parallel.
    pub symbol_workers: usize,

    /// Inner pool size: timeframes processed in parallel within one symbol.
    pub timeframe_workers: usize,

    /// Days before today at which the backward walk starts.
    pub history_offset_days: i64,

    /// Earliest month the walk may request. Guards against a runaway loop if
    /// the remote ever stops signaling end-of-data with 404.
    pub floor: MonthKey,

    /// Retry attempts for a non-404 download failure before the walk fails.
    pub max_retries: u32,

    /// Base delay for the doubling retry wait.
    pub retry_base_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.gateio.ws/api/v4".to_string(),
            archive_base: "https://download.gatedata.org".to_string(),
            output_dir: PathBuf::from("data/gateio"),
            quote_assets: vec!["BTC".to_string(), "ETH".to_string(), "USDT".to_string()],
            timeframes: Timeframe::ALL.to_vec(),
            symbol_workers: 10,
            timeframe_workers: 10,
            history_offset_days: 50,
            floor: MonthKey::new(2000, 1),
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl FetchConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, FetchError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FetchError::Storage(format!("read config {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, FetchError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| FetchError::InvalidConfig(format!("parse config TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency. Called by [`crate::sync::sync_all`] before
    /// any work is scheduled.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.quote_assets.is_empty() {
            return Err(FetchError::InvalidConfig(
                "quote_assets must not be empty".into(),
            ));
        }
        if self.timeframes.is_empty() {
            return Err(FetchError::InvalidConfig(
                "timeframes must not be empty".into(),
            ));
        }
        if self.symbol_workers == 0 || self.timeframe_workers == 0 {
            return Err(FetchError::InvalidConfig(
                "worker pool sizes must be at least 1".into(),
            ));
        }
        if self.floor.month == 0 || self.floor.month > 12 {
            return Err(FetchError::InvalidConfig(format!(
                "floor month {} out of range 1..=12",
                self.floor.month
            )));
        }
        if self.history_offset_days < 0 {
            return Err(FetchError::InvalidConfig(
                "history_offset_days must not be negative".into(),
            ));
        }
        Ok(())
    }

    /// The month the backward walk starts from, given today's date.
    pub fn start_month(&self, today: NaiveDate) -> MonthKey {
        MonthKey::start(today, self.history_offset_days)
    }

    /// The `settle` query value: comma-joined lowercase quote-asset codes.
    pub fn settle_param(&self) -> String {
        self.quote_assets
            .iter()
            .map(|q| q.to_lowercase())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_public_endpoints() {
        let config = FetchConfig::default();
        assert_eq!(config.api_base, "https://api.gateio.ws/api/v4");
        assert_eq!(config.archive_base, "https://download.gatedata.org");
        assert_eq!(config.timeframes.len(), 5);
        assert_eq!(config.history_offset_days, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn settle_param_is_lowercase_comma_joined() {
        let config = FetchConfig::default();
        assert_eq!(config.settle_param(), "btc,eth,usdt");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = FetchConfig::from_toml(
            r#"
            output_dir = "/tmp/archive"
            quote_assets = ["USDT"]
            timeframes = ["1d"]
            "#,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/archive"));
        assert_eq!(config.quote_assets, vec!["USDT"]);
        assert_eq!(config.timeframes, vec![Timeframe::D1]);
        // Untouched fields keep defaults
        assert_eq!(config.symbol_workers, 10);
        assert_eq!(config.floor, MonthKey::new(2000, 1));
    }

    #[test]
    fn rejects_bad_timeframe_code() {
        let result = FetchConfig::from_toml(r#"timeframes = ["7m"]"#);
        assert!(matches!(result, Err(FetchError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_empty_quote_assets() {
        let result = FetchConfig::from_toml("quote_assets = []");
        assert!(matches!(result, Err(FetchError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_workers() {
        let result = FetchConfig::from_toml("symbol_workers = 0");
        assert!(matches!(result, Err(FetchError::InvalidConfig(_))));
    }

    #[test]
    fn start_month_uses_offset() {
        let config = FetchConfig::default();
        let today = NaiveDate::from_ymd_opt(2024, 9, 20).unwrap();
        assert_eq!(config.start_month(today), MonthKey::new(2024, 8));
    }
}
