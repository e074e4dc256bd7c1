//! Crash and write-failure scenarios.
//!
//! Each test stops the agent at an awkward point (or makes the store refuse
//! writes) and checks what the next agent sees.

use hostpulse_store::{Repair, BACKLOG_DOCUMENT, INTERVAL_DOCUMENT};
use hostpulse_sync_engine::DrainOutcome;
use hostpulse_testkit::prelude::*;

#[test]
fn crash_then_next_day_start_moves_window_to_backlog() {
    let mut agent = TestAgent::on_disk(60);
    agent.collector().set_connected(false);
    for _ in 0..9 {
        agent.advance_minutes(1);
        agent.tick().unwrap();
    }

    agent.advance_days(1);
    agent.restart().unwrap();
    assert_eq!(agent.record().elapsed, 9);

    agent.tick().unwrap();
    let backlog = agent.backlog().unwrap();
    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog.records[0].total_time, 9);
    assert_eq!(backlog.records[0].identity.username, "tester");
}

#[test]
fn stale_temp_file_is_ignored() {
    let mut agent = TestAgent::on_disk(5);
    agent.tick().unwrap();
    agent.tick().unwrap();

    agent
        .while_stopped(|path| {
            let temp = path.unwrap().join(format!("{INTERVAL_DOCUMENT}.tmp"));
            std::fs::write(temp, b"{\"elapsed\": 4, \"trunc").unwrap();
        })
        .unwrap();

    assert!(agent.repairs().is_empty());
    assert_eq!(agent.record().elapsed, 2);
    agent.tick().unwrap();
    assert_eq!(agent.record().elapsed, 3);
}

#[test]
fn truncated_backlog_is_replaced_and_window_kept() {
    let mut agent = TestAgent::on_disk(5);
    agent.tick().unwrap();

    agent
        .while_stopped(|path| {
            std::fs::write(path.unwrap().join(BACKLOG_DOCUMENT), b"{\"records\": [").unwrap();
        })
        .unwrap();

    assert_eq!(agent.repairs().len(), 1);
    assert!(matches!(agent.repairs()[0], Repair::BacklogUnreadable(_)));
    assert_eq!(agent.record().elapsed, 1);
    assert!(agent.backlog().unwrap().is_empty());
}

#[test]
fn deleted_backlog_is_recreated_by_integrity_check() {
    let mut agent = TestAgent::on_disk(5);
    agent.tick().unwrap();

    let path = agent.path().unwrap().join(BACKLOG_DOCUMENT);
    std::fs::remove_file(&path).unwrap();

    let report = agent.verify_files().unwrap();
    assert_eq!(report.recreated, vec![BACKLOG_DOCUMENT]);
    assert!(path.exists());
    assert!(agent.verify_files().unwrap().is_clean());
}

#[test]
fn failed_save_loses_only_unsaved_ticks() {
    let mut agent = TestAgent::memory(10);
    agent.tick().unwrap();
    agent.tick().unwrap();

    let backend = agent.backend();
    backend.set_fail_writes(true);
    assert!(agent.tick().is_err());
    assert_eq!(agent.record().elapsed, 3);

    // crash before any write gets through
    agent.restart().unwrap();
    assert_eq!(agent.record().elapsed, 2);

    backend.set_fail_writes(false);
    agent.tick().unwrap();
    agent.restart().unwrap();
    assert_eq!(agent.record().elapsed, 3);
}

#[test]
fn failed_backlog_append_is_retried_once() {
    let mut agent = TestAgent::memory(10);
    for _ in 0..4 {
        agent.tick().unwrap();
    }
    agent.advance_days(1);

    let backend = agent.backend();
    backend.set_fail_writes(true);
    assert!(agent.tick().is_err());
    assert_eq!(agent.record().elapsed, 4);

    backend.set_fail_writes(false);
    let outcome = agent.tick().unwrap();
    assert_eq!(outcome.date_rollover, Some(1));
    assert_eq!(outcome.elapsed, 1);

    agent.tick().unwrap();
    assert_eq!(agent.backlog().unwrap().len(), 1);
}

#[test]
fn unreadable_backlog_during_date_change_keeps_pending_windows() {
    let mut agent = TestAgent::memory(100);
    agent.tick().unwrap();
    agent.advance_days(1);
    agent.tick().unwrap();
    assert_eq!(agent.backlog().unwrap().len(), 1);

    agent.advance_days(1);
    let backend = agent.backend();
    backend.set_fail_reads(true);
    assert!(agent.tick().is_err());
    backend.set_fail_reads(false);
    assert_eq!(agent.backlog().unwrap().len(), 1);

    let outcome = agent.tick().unwrap();
    assert_eq!(outcome.date_rollover, Some(2));
    assert_eq!(agent.backlog().unwrap().len(), 2);
}

#[test]
fn delivered_but_uncleared_backlog_is_resent() {
    let mut agent = TestAgent::memory(100);
    agent.tick().unwrap();
    agent.advance_days(1);
    agent.tick().unwrap();
    assert_eq!(agent.backlog().unwrap().len(), 1);

    let backend = agent.backend();
    backend.set_fail_writes(true);
    assert!(matches!(agent.drain(), DrainOutcome::Failed(_)));
    assert_eq!(agent.backlog().unwrap().len(), 1);

    backend.set_fail_writes(false);
    assert_eq!(agent.drain(), DrainOutcome::Delivered(1));

    let bulk = agent.collector().bulk_requests();
    assert_eq!(bulk.len(), 2);
    assert_eq!(bulk[0], bulk[1]);
}

#[test]
fn finalize_drains_backlog_before_exit() {
    let mut agent = TestAgent::on_disk(100);
    agent.collector().set_connected(false);
    agent.tick().unwrap();
    agent.advance_days(1);
    agent.tick().unwrap();

    agent.collector().set_connected(true);
    let finalized = agent.finalize().unwrap();
    assert_eq!(finalized.drain, Some(DrainOutcome::Delivered(1)));
    assert_eq!(finalized.tick.elapsed, 2);

    agent.restart().unwrap();
    assert!(agent.backlog().unwrap().is_empty());
    assert_eq!(agent.record().elapsed, 2);
}
