//! End-to-end tests for the fetch pipeline against a mock exchange.
//!
//! Every test pins `today` to 2024-09-20, so the backward walk starts at
//! 2024-08 (50 days before).

use candlefetch_core::{
    run_walk, sync_all, ArchiveClient, ArchiveStore, FetchConfig, FetchError, FetchProgress,
    MonthKey, NullProgress, StopReason, Timeframe,
};
use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_output() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "candlefetch_pipeline_{}_{id}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 20).unwrap()
}

fn test_config(server_url: &str, output: &Path) -> FetchConfig {
    FetchConfig {
        api_base: server_url.to_string(),
        archive_base: server_url.to_string(),
        output_dir: output.to_path_buf(),
        quote_assets: vec!["USDT".to_string()],
        timeframes: vec![Timeframe::D1],
        symbol_workers: 2,
        timeframe_workers: 2,
        history_offset_days: 50,
        floor: MonthKey::new(2024, 1),
        max_retries: 0,
        retry_base_delay_ms: 1,
    }
}

fn gzip_bytes(payload: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

fn mock_discovery(server: &mut mockito::Server, ids: &[&str]) -> mockito::Mock {
    let body: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| serde_json::json!({ "id": id, "trade_status": "tradable" }))
        .collect();
    server
        .mock("GET", "/spot/currency_pairs")
        .match_query(mockito::Matcher::UrlEncoded(
            "settle".into(),
            "usdt".into(),
        ))
        .with_header("content-type", "application/json")
        .with_body(serde_json::Value::Array(body).to_string())
        .create()
}

fn archive_route(symbol: &str, yyyymm: &str) -> String {
    format!("/spot/candlesticks_1d/{yyyymm}/{symbol}-{yyyymm}.csv.gz")
}

#[test]
fn walk_downloads_until_first_not_found() {
    let mut server = mockito::Server::new();
    let output = temp_output();

    let _discovery = mock_discovery(&mut server, &["AAA_USDT"]);
    let m_aug = server
        .mock("GET", archive_route("AAA_USDT", "202408").as_str())
        .with_body(gzip_bytes(b"august\n"))
        .expect(1)
        .create();
    let m_jul = server
        .mock("GET", archive_route("AAA_USDT", "202407").as_str())
        .with_body(gzip_bytes(b"july\n"))
        .expect(1)
        .create();
    let m_jun = server
        .mock("GET", archive_route("AAA_USDT", "202406").as_str())
        .with_status(404)
        .expect(1)
        .create();
    // The walk must stop at the 404 — never requesting further back.
    let m_may = server
        .mock("GET", archive_route("AAA_USDT", "202405").as_str())
        .expect(0)
        .create();

    let config = test_config(&server.url(), &output);
    let client = ArchiveClient::new(&config);
    let store = ArchiveStore::new(&config.output_dir);
    let cancel = AtomicBool::new(false);

    let summary = sync_all(&config, &client, &store, today(), &NullProgress, &cancel).unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.months_downloaded, 2);

    let aug = store.archive_path("AAA_USDT", Timeframe::D1, MonthKey::new(2024, 8));
    let jul = store.archive_path("AAA_USDT", Timeframe::D1, MonthKey::new(2024, 7));
    let jun = store.archive_path("AAA_USDT", Timeframe::D1, MonthKey::new(2024, 6));
    assert!(aug.exists());
    assert!(jul.exists());
    assert!(!jun.exists());

    m_aug.assert();
    m_jul.assert();
    m_jun.assert();
    m_may.assert();

    let _ = std::fs::remove_dir_all(&output);
}

#[test]
fn second_run_downloads_nothing() {
    let mut server = mockito::Server::new();
    let output = temp_output();

    let _discovery = mock_discovery(&mut server, &["AAA_USDT"]);
    // The archive body is served exactly once across both runs: the second
    // run validates the local file instead of re-downloading.
    let m_aug = server
        .mock("GET", archive_route("AAA_USDT", "202408").as_str())
        .with_body(gzip_bytes(b"august\n"))
        .expect(1)
        .create();
    let m_jul = server
        .mock("GET", archive_route("AAA_USDT", "202407").as_str())
        .with_status(404)
        .expect(2)
        .create();

    let config = test_config(&server.url(), &output);
    let client = ArchiveClient::new(&config);
    let store = ArchiveStore::new(&config.output_dir);
    let cancel = AtomicBool::new(false);

    for _ in 0..2 {
        let summary =
            sync_all(&config, &client, &store, today(), &NullProgress, &cancel).unwrap();
        assert_eq!(summary.succeeded, 1);
    }

    m_aug.assert();
    m_jul.assert();

    let _ = std::fs::remove_dir_all(&output);
}

#[test]
fn corrupt_file_is_replaced_once_and_then_validates() {
    let mut server = mockito::Server::new();
    let output = temp_output();

    let _discovery = mock_discovery(&mut server, &["AAA_USDT"]);
    let m_aug = server
        .mock("GET", archive_route("AAA_USDT", "202408").as_str())
        .with_body(gzip_bytes(b"fresh august\n"))
        .expect(1)
        .create();
    let m_jul = server
        .mock("GET", archive_route("AAA_USDT", "202407").as_str())
        .with_status(404)
        .expect(2)
        .create();

    let config = test_config(&server.url(), &output);
    let client = ArchiveClient::new(&config);
    let store = ArchiveStore::new(&config.output_dir);
    let cancel = AtomicBool::new(false);

    // Plant a present-but-invalid file where 2024-08 belongs.
    let aug = store.archive_path("AAA_USDT", Timeframe::D1, MonthKey::new(2024, 8));
    std::fs::create_dir_all(aug.parent().unwrap()).unwrap();
    std::fs::write(&aug, b"not a gzip stream").unwrap();

    let summary = sync_all(&config, &client, &store, today(), &NullProgress, &cancel).unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.months_repaired, 1);
    assert!(candlefetch_core::store::gzip_is_valid(&aug));

    // Second run: the replacement validates, no further download.
    let summary = sync_all(&config, &client, &store, today(), &NullProgress, &cancel).unwrap();
    assert_eq!(summary.succeeded, 1);

    m_aug.assert();
    m_jul.assert();

    let _ = std::fs::remove_dir_all(&output);
}

#[test]
fn ineligible_symbol_produces_no_files() {
    let mut server = mockito::Server::new();
    let output = temp_output();

    let _discovery = mock_discovery(&mut server, &["AAA_USDT", "BBB_XYZ"]);
    let _m_aug = server
        .mock("GET", archive_route("AAA_USDT", "202408").as_str())
        .with_status(404)
        .create();

    let config = test_config(&server.url(), &output);
    let client = ArchiveClient::new(&config);
    let store = ArchiveStore::new(&config.output_dir);
    let cancel = AtomicBool::new(false);

    let summary = sync_all(&config, &client, &store, today(), &NullProgress, &cancel).unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 1);
    assert!(!output.join("BBB_XYZ").exists());

    let _ = std::fs::remove_dir_all(&output);
}

#[test]
fn discovery_failure_aborts_the_run() {
    let mut server = mockito::Server::new();
    let output = temp_output();

    let _discovery = server
        .mock("GET", "/spot/currency_pairs")
        .match_query(mockito::Matcher::Any)
        .with_status(500)
        .create();

    let config = test_config(&server.url(), &output);
    let client = ArchiveClient::new(&config);
    let store = ArchiveStore::new(&config.output_dir);
    let cancel = AtomicBool::new(false);

    let result = sync_all(&config, &client, &store, today(), &NullProgress, &cancel);
    match result {
        Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, 500),
        other => panic!("expected HttpStatus error, got: {other:?}"),
    }

    let _ = std::fs::remove_dir_all(&output);
}

#[test]
fn failed_walk_does_not_abort_siblings() {
    let mut server = mockito::Server::new();
    let output = temp_output();

    let _discovery = mock_discovery(&mut server, &["AAA_USDT", "CCC_USDT"]);
    // AAA's archive host misbehaves; CCC is healthy.
    let _m_aaa = server
        .mock("GET", archive_route("AAA_USDT", "202408").as_str())
        .with_status(500)
        .create();
    let _m_ccc_aug = server
        .mock("GET", archive_route("CCC_USDT", "202408").as_str())
        .with_body(gzip_bytes(b"ccc august\n"))
        .create();
    let _m_ccc_jul = server
        .mock("GET", archive_route("CCC_USDT", "202407").as_str())
        .with_status(404)
        .create();

    let config = test_config(&server.url(), &output);
    let client = ArchiveClient::new(&config);
    let store = ArchiveStore::new(&config.output_dir);
    let cancel = AtomicBool::new(false);

    let summary = sync_all(&config, &client, &store, today(), &NullProgress, &cancel).unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].0, "AAA_USDT");

    let ccc = store.archive_path("CCC_USDT", Timeframe::D1, MonthKey::new(2024, 8));
    assert!(ccc.exists());

    let _ = std::fs::remove_dir_all(&output);
}

#[test]
fn walk_stops_at_the_floor() {
    let mut server = mockito::Server::new();
    let output = temp_output();

    let _m_aug = server
        .mock("GET", archive_route("AAA_USDT", "202408").as_str())
        .with_body(gzip_bytes(b"august\n"))
        .expect(1)
        .create();
    let m_jul = server
        .mock("GET", archive_route("AAA_USDT", "202407").as_str())
        .with_body(gzip_bytes(b"july\n"))
        .expect(1)
        .create();
    // Below the floor: must never be requested even though it would succeed.
    let m_jun = server
        .mock("GET", archive_route("AAA_USDT", "202406").as_str())
        .with_body(gzip_bytes(b"june\n"))
        .expect(0)
        .create();

    let config = FetchConfig {
        floor: MonthKey::new(2024, 7),
        ..test_config(&server.url(), &output)
    };
    let client = ArchiveClient::new(&config);
    let store = ArchiveStore::new(&config.output_dir);
    let cancel = AtomicBool::new(false);

    let stats = run_walk(
        &client,
        &store,
        &config,
        "AAA_USDT",
        Timeframe::D1,
        today(),
        &NullProgress,
        &cancel,
    )
    .unwrap();

    assert_eq!(stats.stop, StopReason::FloorReached);
    assert_eq!(stats.downloaded, 2);

    m_jul.assert();
    m_jun.assert();

    let _ = std::fs::remove_dir_all(&output);
}

#[test]
fn floor_after_start_month_is_rejected() {
    let mut server = mockito::Server::new();
    let output = temp_output();

    // A misconfigured floor must fail loudly before any request is made,
    // never pass as a run where every walk silently does nothing.
    let discovery = server
        .mock("GET", "/spot/currency_pairs")
        .match_query(mockito::Matcher::Any)
        .expect(0)
        .create();

    let config = FetchConfig {
        floor: MonthKey::new(2030, 1),
        ..test_config(&server.url(), &output)
    };
    let client = ArchiveClient::new(&config);
    let store = ArchiveStore::new(&config.output_dir);
    let cancel = AtomicBool::new(false);

    let result = sync_all(&config, &client, &store, today(), &NullProgress, &cancel);
    match result {
        Err(FetchError::InvalidConfig(msg)) => assert!(msg.contains("floor")),
        other => panic!("expected InvalidConfig error, got: {other:?}"),
    }

    discovery.assert();

    let _ = std::fs::remove_dir_all(&output);
}

/// Flips the cancel flag as soon as the first archive lands.
struct CancelAfterFirstDownload {
    cancel: Arc<AtomicBool>,
}

impl FetchProgress for CancelAfterFirstDownload {
    fn on_symbol_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_symbol_done(&self, _symbol: &str, _result: &Result<(), FetchError>) {}
    fn on_symbol_skipped(&self, _symbol: &str) {}
    fn on_month_downloaded(&self, _symbol: &str, _timeframe: Timeframe, _month: MonthKey) {
        self.cancel.store(true, Ordering::SeqCst);
    }
    fn on_corrupt_repaired(&self, _symbol: &str, _timeframe: Timeframe, _month: MonthKey) {}
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _skipped: usize, _total: usize) {
    }
}

#[test]
fn mid_symbol_cancel_is_not_counted_as_success() {
    let mut server = mockito::Server::new();
    let output = temp_output();

    let _discovery = mock_discovery(&mut server, &["AAA_USDT"]);
    let _m_1d_aug = server
        .mock("GET", archive_route("AAA_USDT", "202408").as_str())
        .with_body(gzip_bytes(b"august\n"))
        .create();
    // The single inner worker walks 1d first; cancellation after its first
    // download means the 5m walk is never claimed.
    let m_5m_aug = server
        .mock("GET", "/spot/candlesticks_5m/202408/AAA_USDT-202408.csv.gz")
        .expect(0)
        .create();

    let config = FetchConfig {
        timeframes: vec![Timeframe::D1, Timeframe::M5],
        symbol_workers: 1,
        timeframe_workers: 1,
        ..test_config(&server.url(), &output)
    };
    let client = ArchiveClient::new(&config);
    let store = ArchiveStore::new(&config.output_dir);
    let cancel = Arc::new(AtomicBool::new(false));
    let progress = CancelAfterFirstDownload {
        cancel: cancel.clone(),
    };

    let summary = sync_all(&config, &client, &store, today(), &progress, &cancel).unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.interrupted, 1);
    assert_eq!(summary.months_downloaded, 1);

    m_5m_aug.assert();

    let _ = std::fs::remove_dir_all(&output);
}

#[test]
fn preset_cancel_claims_no_work() {
    let mut server = mockito::Server::new();
    let output = temp_output();

    let _discovery = mock_discovery(&mut server, &["AAA_USDT", "CCC_USDT"]);
    let m_aug = server
        .mock("GET", archive_route("AAA_USDT", "202408").as_str())
        .expect(0)
        .create();

    let config = test_config(&server.url(), &output);
    let client = ArchiveClient::new(&config);
    let store = ArchiveStore::new(&config.output_dir);
    let cancel = AtomicBool::new(true);

    let summary = sync_all(&config, &client, &store, today(), &NullProgress, &cancel).unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded + summary.failed + summary.skipped, 0);

    m_aug.assert();

    let _ = std::fs::remove_dir_all(&output);
}

#[test]
fn skipped_symbol_is_still_present_in_discovery_result() {
    let mut server = mockito::Server::new();
    let output = temp_output();

    let mock = mock_discovery(&mut server, &["AAA_USDT", "BBB_XYZ"]);

    let config = test_config(&server.url(), &output);
    let client = ArchiveClient::new(&config);

    let symbols =
        candlefetch_core::discover_symbols(client.http(), &config).unwrap();
    assert_eq!(symbols, vec!["AAA_USDT", "BBB_XYZ"]);
    mock.assert();

    let _ = std::fs::remove_dir_all(&output);
}
