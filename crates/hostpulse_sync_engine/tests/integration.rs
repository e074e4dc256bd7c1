//! Integration tests for the sync engine over a file-backed store.

use chrono::{DateTime, TimeZone, Utc};
use hostpulse_store::{CounterStore, FileBackend, Identity, IntervalRecord, Location};
use hostpulse_sync_engine::{
    DrainOutcome, HttpClient, HttpCollector, MockCollector, SyncConfig, SyncEngine, SyncError,
    SyncResult, WindowOutcome,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::tempdir;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

fn window(elapsed: u32, day: u32) -> IntervalRecord {
    let mut record = IntervalRecord::fresh(Identity::unknown(), Location::default(), at(day, 9));
    record.elapsed = elapsed;
    record
}

/// An HTTP client that plays the collector in-process.
struct ScriptedCollector {
    statuses: Mutex<Vec<u16>>,
    received: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl HttpClient for ScriptedCollector {
    fn post_json(&self, url: &str, body: Vec<u8>) -> SyncResult<u16> {
        let value = serde_json::from_slice(&body).map_err(|e| SyncError::Codec(e.to_string()))?;
        self.received.lock().push((url.to_string(), value));
        let mut statuses = self.statuses.lock();
        Ok(if statuses.is_empty() { 200 } else { statuses.remove(0) })
    }

    fn get(&self, _url: &str) -> SyncResult<u16> {
        Ok(204)
    }
}

#[test]
fn backlog_survives_failed_drain_and_reopen() {
    let temp = tempdir().unwrap();

    {
        let mut store = CounterStore::new(FileBackend::open(temp.path()).unwrap(), 5);
        store.load(at(14, 9)).unwrap();
        store.append_backlog(window(3, 13).complete(at(14, 0))).unwrap();

        let collector = MockCollector::new();
        collector.set_bulk_status(502);
        let engine = SyncEngine::new(SyncConfig::default(), collector);

        let outcome = engine.flush(&mut store, &window(5, 14));
        assert!(matches!(outcome.drain, DrainOutcome::Failed(_)));
    }

    let mut store = CounterStore::new(FileBackend::open(temp.path()).unwrap(), 5);
    let state = store.load(at(14, 10)).unwrap();
    assert_eq!(state.backlog.len(), 1);
    assert_eq!(state.backlog.records[0].total_time, 3);

    let engine = SyncEngine::new(SyncConfig::default(), MockCollector::new());
    assert_eq!(engine.drain(&mut store), DrainOutcome::Delivered(1));
    assert!(store.load_backlog().unwrap().is_empty());
}

#[test]
fn http_collector_end_to_end() {
    let temp = tempdir().unwrap();
    let mut store = CounterStore::new(FileBackend::open(temp.path()).unwrap(), 5);
    store.load(at(15, 9)).unwrap();
    store.append_backlog(window(4, 13).complete(at(14, 0))).unwrap();
    store.append_backlog(window(2, 14).complete(at(15, 0))).unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let client = ScriptedCollector {
        statuses: Mutex::new(Vec::new()),
        received: Arc::clone(&received),
    };
    let config = SyncConfig::new("https://collector.example.com");
    let collector = HttpCollector::new(&config, client);
    let engine = SyncEngine::new(config, collector);

    let outcome = engine.flush(&mut store, &window(5, 15));
    assert!(outcome.is_success());
    assert_eq!(outcome.window, WindowOutcome::Sent);
    assert!(store.load_backlog().unwrap().is_empty());

    let received = received.lock();
    assert_eq!(received.len(), 2);
    assert!(received[0].0.ends_with("/api/tracking/bulk-sync"));
    assert_eq!(received[0].1["records"][0]["total_time"], 4);
    assert_eq!(received[0].1["records"][1]["date"], "2026-03-14");
    assert!(received[1].0.ends_with("/api/tracking/sync"));
    assert_eq!(received[1].1["active_time"], 5);
}

#[test]
fn rejected_bulk_is_resent_whole() {
    let temp = tempdir().unwrap();
    let mut store = CounterStore::new(FileBackend::open(temp.path()).unwrap(), 5);
    store.load(at(15, 9)).unwrap();
    store.append_backlog(window(4, 13).complete(at(14, 0))).unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let client = ScriptedCollector {
        statuses: Mutex::new(vec![500]),
        received: Arc::clone(&received),
    };
    let config = SyncConfig::default();
    let engine = SyncEngine::new(config.clone(), HttpCollector::new(&config, client));

    assert!(matches!(engine.drain(&mut store), DrainOutcome::Failed(_)));
    store.append_backlog(window(1, 14).complete(at(15, 0))).unwrap();
    assert_eq!(engine.drain(&mut store), DrainOutcome::Delivered(2));

    let received = received.lock();
    assert_eq!(received[0].1["records"].as_array().unwrap().len(), 1);
    assert_eq!(received[1].1["records"].as_array().unwrap().len(), 2);
}
