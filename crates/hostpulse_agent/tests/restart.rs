//! Restart behavior of the agent over a real data directory.

use chrono::{Duration, TimeZone, Utc};
use hostpulse_agent::{Agent, AgentError, ManualClock, StaticIdentity};
use hostpulse_store::{
    CounterStore, FileBackend, Identity, Location, StoreError, INTERVAL_DOCUMENT,
};
use hostpulse_sync_engine::{MockCollector, SyncConfig, SyncEngine};
use std::path::Path;
use tempfile::tempdir;

fn open(dir: &Path, clock: &ManualClock, collector: MockCollector) -> Result<Agent<FileBackend, MockCollector>, AgentError> {
    let backend = FileBackend::open(dir)?;
    Agent::open(
        CounterStore::new(backend, 5),
        SyncEngine::new(SyncConfig::default(), collector),
        Box::new(StaticIdentity::new(Identity::unknown(), Location::default())),
        Box::new(clock.clone()),
    )
}

#[test]
fn elapsed_survives_restart() {
    let temp = tempdir().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap());

    {
        let mut agent = open(temp.path(), &clock, MockCollector::offline()).unwrap();
        for _ in 0..3 {
            clock.advance(Duration::minutes(1));
            agent.tick().unwrap();
        }
    }

    let mut agent = open(temp.path(), &clock, MockCollector::offline()).unwrap();
    assert!(agent.repairs().is_empty());
    assert_eq!(agent.record().elapsed, 3);

    agent.tick().unwrap();
    assert_eq!(agent.record().elapsed, 4);
}

#[test]
fn second_agent_is_locked_out() {
    let temp = tempdir().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap());

    let _first = open(temp.path(), &clock, MockCollector::new()).unwrap();
    let second = open(temp.path(), &clock, MockCollector::new());
    assert!(matches!(
        second,
        Err(AgentError::Store(StoreError::Locked(_)))
    ));
}

#[test]
fn failed_flushes_survive_restart_and_date_change() {
    let temp = tempdir().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 22, 0, 0).unwrap());

    {
        let mut agent = open(temp.path(), &clock, MockCollector::offline()).unwrap();
        for _ in 0..5 {
            agent.tick().unwrap();
        }
        // the collector was unreachable at the rollover
        assert_eq!(agent.record().elapsed, 5);
    }

    clock.advance(Duration::hours(3));
    let mut agent = open(temp.path(), &clock, MockCollector::new()).unwrap();
    assert_eq!(agent.record().elapsed, 5);

    let outcome = agent.tick().unwrap();
    assert_eq!(outcome.date_rollover, Some(1));
    assert_eq!(outcome.elapsed, 1);

    let finalized = agent.finalize().unwrap();
    assert!(finalized.drain.is_some());
    assert!(agent.backlog().unwrap().is_empty());

    let bulk = agent.engine().collector().bulk_requests();
    assert_eq!(bulk.len(), 1);
    assert_eq!(bulk[0].records[0].total_time, 5);
}

#[test]
fn deleted_directory_is_recreated_on_next_tick() {
    let temp = tempdir().unwrap();
    let data = temp.path().join("state");
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap());

    let mut agent = open(&data, &clock, MockCollector::offline()).unwrap();
    agent.tick().unwrap();

    std::fs::remove_dir_all(&data).unwrap();
    agent.tick().unwrap();
    assert!(data.join(INTERVAL_DOCUMENT).exists());
}
