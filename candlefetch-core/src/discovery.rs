//! Symbol discovery — one call to the exchange's currency-pair listing.
//!
//! Discovery has no retry policy: without a symbol list no downloads can
//! proceed, so any failure here is fatal to the run.

use crate::config::FetchConfig;
use crate::error::FetchError;
use serde::Deserialize;

/// One entry of the currency-pair listing. Only the identifier matters;
/// all other metadata fields are ignored.
#[derive(Debug, Deserialize)]
struct CurrencyPair {
    id: String,
}

/// Fetch all trading-pair identifiers settled in the configured quote assets.
///
/// Returns identifiers in response order, without deduplication — the
/// exchange is treated as authoritative.
pub fn discover_symbols(
    http: &reqwest::blocking::Client,
    config: &FetchConfig,
) -> Result<Vec<String>, FetchError> {
    let url = format!("{}/spot/currency_pairs", config.api_base);

    let resp = http
        .get(&url)
        .query(&[("settle", config.settle_param().as_str())])
        .send()
        .map_err(|e| FetchError::NetworkUnreachable(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            status: status.as_u16(),
            url,
        });
    }

    let pairs: Vec<CurrencyPair> = resp
        .json()
        .map_err(|e| FetchError::ResponseFormat(format!("currency-pair listing: {e}")))?;

    Ok(pairs.into_iter().map(|p| p.id).collect())
}

/// Whether a symbol ends with one of the configured quote-asset suffixes.
///
/// Discovery already filters by settle currency, but the walk repeats this
/// check before writing anything — a symbol that fails it produces no files.
pub fn is_eligible(symbol: &str, quote_assets: &[String]) -> bool {
    quote_assets.iter().any(|q| symbol.ends_with(q.as_str()))
}
