//! Archive endpoint client — URL construction and single-file downloads.
//!
//! A 404 is the archive's defined "no data for this month" signal and maps to
//! [`DownloadOutcome::NotFound`]; everything else non-2xx is a transport
//! problem and is retried a bounded number of times before failing.

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::month::MonthKey;
use crate::timeframe::Timeframe;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Result of a single archive download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was written to its destination path.
    Downloaded,
    /// The remote has no archive for this month (HTTP 404). Nothing written.
    NotFound,
}

/// HTTP client for the listing and archive endpoints.
pub struct ArchiveClient {
    http: reqwest::blocking::Client,
    archive_base: String,
    max_retries: u32,
    base_delay: Duration,
}

impl ArchiveClient {
    pub fn new(config: &FetchConfig) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("candlefetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            archive_base: config.archive_base.clone(),
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// The underlying HTTP client, shared with discovery.
    pub fn http(&self) -> &reqwest::blocking::Client {
        &self.http
    }

    /// Remote URL of one archive file:
    /// `{archive_base}/spot/candlesticks_{tf}/{yyyymm}/{symbol}-{yyyymm}.csv.gz`
    pub fn archive_url(&self, symbol: &str, timeframe: Timeframe, month: MonthKey) -> String {
        let yyyymm = month.yyyymm();
        format!(
            "{}/spot/candlesticks_{}/{yyyymm}/{symbol}-{yyyymm}.csv.gz",
            self.archive_base,
            timeframe.as_str()
        )
    }

    /// Download `url` to `dest`, atomically (write to `.tmp`, rename).
    ///
    /// Transport errors and non-404/non-2xx statuses are retried up to
    /// `max_retries` times with a doubling delay. Local storage errors are
    /// not retried — a full disk does not improve on the second attempt.
    pub fn download(&self, url: &str, dest: &Path) -> Result<DownloadOutcome, FetchError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }

            match self.http.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Ok(DownloadOutcome::NotFound);
                    }

                    if !status.is_success() {
                        last_error = Some(FetchError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                        continue;
                    }

                    match write_body(resp, dest) {
                        Ok(()) => return Ok(DownloadOutcome::Downloaded),
                        Err(e @ FetchError::Storage(_)) => return Err(e),
                        Err(e) => {
                            last_error = Some(e);
                            continue;
                        }
                    }
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(FetchError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(FetchError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| FetchError::NetworkUnreachable("max retries exceeded".into())))
    }
}

/// Stream a response body to `dest.tmp`, then rename into place.
fn write_body(mut resp: reqwest::blocking::Response, dest: &Path) -> Result<(), FetchError> {
    let tmp = dest.with_extension("gz.tmp");

    let mut file = fs::File::create(&tmp)
        .map_err(|e| FetchError::Storage(format!("create {}: {e}", tmp.display())))?;

    if let Err(e) = resp.copy_to(&mut file) {
        drop(file);
        let _ = fs::remove_file(&tmp);
        return Err(FetchError::NetworkUnreachable(format!(
            "body read for {}: {e}",
            dest.display()
        )));
    }

    fs::rename(&tmp, dest).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        FetchError::Storage(format!("atomic rename to {}: {e}", dest.display()))
    })
}
