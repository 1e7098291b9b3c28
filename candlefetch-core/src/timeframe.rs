//! Candlestick granularities served by the archive endpoint.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of candlestick granularities the archive publishes.
///
/// Serialized as the wire code (`1m`, `5m`, `1h`, `4h`, `1d`) that appears in
/// archive URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M1,
    M5,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// All timeframes, in ascending granularity order.
    pub const ALL: [Timeframe; 5] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    /// The code used in archive URLs and directory names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(FetchError::InvalidConfig(format!(
                "unknown timeframe '{other}'. Valid: 1m, 5m, 1h, 4h, 1d"
            ))),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = FetchError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> String {
        tf.as_str().to_string()
    }
}
