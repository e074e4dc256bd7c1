//! Tick logic: counting, date rollover and window rollover.

use crate::error::AgentResult;
use crate::identity::IdentityProvider;
use chrono::{DateTime, Utc};
use hostpulse_store::{CounterStore, DocumentBackend, IntervalRecord};
use hostpulse_sync_engine::{Collector, FlushOutcome, SyncEngine};
use tracing::{debug, error, info};

/// Where the current window is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    /// Counting ticks.
    Accumulating,
    /// Reached the window size; a flush is in progress.
    RolledOver,
}

/// Everything the accumulator owns between ticks.
#[derive(Debug, Clone)]
pub struct AccumulatorState {
    /// The window being accumulated. Mirrors the stored document after
    /// every successful tick.
    pub record: IntervalRecord,
    /// Lifecycle phase.
    pub phase: WindowPhase,
    /// Window-size contributions confirmed by a successful flush.
    pub completed_windows: u64,
    /// Time of the last successful rollover flush.
    pub last_sync: Option<DateTime<Utc>>,
}

/// Result of one tick.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// `elapsed` after the tick.
    pub elapsed: u32,
    /// Backlog length after a date change appended the previous window.
    pub date_rollover: Option<usize>,
    /// Flush triggered by reaching the window size.
    pub flush: Option<FlushOutcome>,
}

impl TickOutcome {
    /// Returns true if this tick attempted a flush.
    pub fn flushed(&self) -> bool {
        self.flush.is_some()
    }
}

/// Advances the current window by one tick at a time.
#[derive(Debug)]
pub struct Accumulator {
    state: AccumulatorState,
    window_size: u32,
}

impl Accumulator {
    /// Resumes accumulation from `record`.
    pub fn new(record: IntervalRecord, window_size: u32) -> Self {
        Self {
            state: AccumulatorState {
                record,
                phase: WindowPhase::Accumulating,
                completed_windows: 0,
                last_sync: None,
            },
            window_size,
        }
    }

    /// Returns the owned state.
    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    /// Returns the current window.
    pub fn record(&self) -> &IntervalRecord {
        &self.state.record
    }

    /// Returns the window size.
    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// Replaces the current window, e.g. after an operator reset.
    pub fn replace(&mut self, record: IntervalRecord) {
        self.state.record = record;
        self.state.phase = WindowPhase::Accumulating;
    }

    /// Runs one tick.
    ///
    /// 1. A window dated before today is closed into the backlog (if it
    ///    counted anything) and a fresh one is opened.
    /// 2. `elapsed` is incremented.
    /// 3. At the window size the engine flushes; success restarts the count
    ///    at 1, failure leaves `elapsed` to grow so the next tick retries.
    /// 4. Identity and location are refreshed and the window is saved.
    ///
    /// # Errors
    ///
    /// Returns a store error if the backlog append or the final save fails.
    /// A failed append leaves the in-memory window untouched so the next tick
    /// retries the rollover; a failed final save keeps the in-memory window
    /// advanced and the next successful save persists it.
    pub fn tick<B, C, I>(
        &mut self,
        store: &mut CounterStore<B>,
        engine: &SyncEngine<C>,
        identity: &I,
        now: DateTime<Utc>,
    ) -> AgentResult<TickOutcome>
    where
        B: DocumentBackend,
        C: Collector,
        I: IdentityProvider + ?Sized,
    {
        let today = now.date_naive();
        let mut date_rollover = None;

        if !self.state.record.is_dated(today) {
            let previous = &self.state.record;
            let fresh = IntervalRecord::fresh(
                previous.identity.clone(),
                previous.location.clone(),
                now,
            );

            if previous.elapsed > 0 {
                let completed = previous.complete(now);
                let len = store.append_backlog(completed)?;
                info!(
                    date = %previous.window_date,
                    total_time = previous.elapsed,
                    backlog = len,
                    "date changed, window moved to backlog"
                );
                date_rollover = Some(len);
                self.state.record = fresh;
                // the backlog now holds the old window; persist the new one
                // before anything else can fail
                if let Err(e) = store.save_interval(&self.state.record) {
                    error!(error = %e, "could not persist new window after date change");
                }
            } else {
                debug!(from = %previous.window_date, to = %today, "re-dating empty window");
                self.state.record = fresh;
            }
        }

        let mut next = self.state.record.clone();
        next.elapsed = next.elapsed.saturating_add(1);

        let mut flush = None;
        if next.elapsed >= self.window_size {
            self.state.phase = WindowPhase::RolledOver;
            let outcome = engine.flush(store, &next);
            if outcome.is_success() {
                info!(elapsed = next.elapsed, "window flushed");
                next.elapsed = 1;
                self.state.completed_windows += 1;
                self.state.last_sync = Some(now);
            } else {
                debug!(
                    elapsed = next.elapsed,
                    reachable = outcome.reachable,
                    "window flush failed, will retry next tick"
                );
            }
            self.state.phase = WindowPhase::Accumulating;
            flush = Some(outcome);
        }

        next.identity = identity.identity();
        next.location = identity.geolocation();
        next.last_updated = now;

        let elapsed = next.elapsed;
        self.state.record = next;
        store.save_interval(&self.state.record)?;

        Ok(TickOutcome {
            elapsed,
            date_rollover,
            flush,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use chrono::{NaiveDate, TimeZone};
    use hostpulse_store::{Identity, InMemoryBackend, Location, INTERVAL_DOCUMENT};
    use hostpulse_sync_engine::{MockCollector, SyncConfig};

    struct Harness {
        backend: InMemoryBackend,
        store: CounterStore<InMemoryBackend>,
        engine: SyncEngine<MockCollector>,
        identity: StaticIdentity,
        accumulator: Accumulator,
    }

    impl Harness {
        fn new(elapsed: u32, now: DateTime<Utc>) -> Self {
            let backend = InMemoryBackend::new();
            let store = CounterStore::new(backend.clone(), 5);
            let mut record = IntervalRecord::fresh(Identity::unknown(), Location::default(), now);
            record.elapsed = elapsed;
            Self {
                backend,
                store,
                engine: SyncEngine::new(SyncConfig::default(), MockCollector::new()),
                identity: StaticIdentity::new(
                    Identity {
                        system_id: "abc123def456".into(),
                        ..Identity::unknown()
                    },
                    Location::new(18.5, 73.8, "Pune"),
                ),
                accumulator: Accumulator::new(record, 5),
            }
        }

        fn tick(&mut self, now: DateTime<Utc>) -> AgentResult<TickOutcome> {
            self.accumulator
                .tick(&mut self.store, &self.engine, &self.identity, now)
        }

        fn stored(&self) -> IntervalRecord {
            serde_json::from_slice(&self.backend.raw(INTERVAL_DOCUMENT).unwrap()).unwrap()
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn tick_increments_and_persists() {
        let mut h = Harness::new(0, at(14, 9, 0));
        let outcome = h.tick(at(14, 9, 1)).unwrap();

        assert_eq!(outcome.elapsed, 1);
        assert!(!outcome.flushed());
        assert_eq!(h.stored().elapsed, 1);
        assert_eq!(h.stored().identity.system_id, "abc123def456");
        assert_eq!(h.stored().last_updated, at(14, 9, 1));
    }

    #[test]
    fn reaching_window_size_flushes_and_restarts_at_one() {
        let mut h = Harness::new(4, at(14, 9, 0));
        let outcome = h.tick(at(14, 9, 1)).unwrap();

        assert!(outcome.flush.as_ref().unwrap().is_success());
        assert_eq!(outcome.elapsed, 1);
        assert_eq!(h.stored().elapsed, 1);
        assert_eq!(h.accumulator.state().completed_windows, 1);
        assert_eq!(h.accumulator.state().last_sync, Some(at(14, 9, 1)));

        let sent = h.engine.collector().window_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].active_time, 5);
    }

    #[test]
    fn failed_flush_keeps_growing() {
        let mut h = Harness::new(4, at(14, 9, 0));
        h.engine.collector().set_connected(false);

        assert_eq!(h.tick(at(14, 9, 1)).unwrap().elapsed, 5);
        assert_eq!(h.stored().elapsed, 5);

        let outcome = h.tick(at(14, 9, 2)).unwrap();
        assert_eq!(outcome.elapsed, 6);
        assert!(outcome.flushed());
        assert!(h.store.load_backlog().unwrap().is_empty());

        h.engine.collector().set_connected(true);
        assert_eq!(h.tick(at(14, 9, 3)).unwrap().elapsed, 1);
    }

    #[test]
    fn date_change_moves_window_to_backlog() {
        let mut h = Harness::new(3, at(14, 23, 0));
        let outcome = h.tick(at(15, 0, 1)).unwrap();

        assert_eq!(outcome.date_rollover, Some(1));
        assert_eq!(outcome.elapsed, 1);

        let backlog = h.store.load_backlog().unwrap();
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog.records[0].total_time, 3);
        assert_eq!(
            backlog.records[0].window_date,
            NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
        );

        let stored = h.stored();
        assert_eq!(stored.window_date, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
        assert_eq!(stored.elapsed, 1);
        assert_eq!(stored.created_at, at(15, 0, 1));
    }

    #[test]
    fn empty_window_is_redated_without_backlog_entry() {
        let mut h = Harness::new(0, at(14, 23, 0));
        let outcome = h.tick(at(16, 8, 0)).unwrap();

        assert_eq!(outcome.date_rollover, None);
        assert!(h.store.load_backlog().unwrap().is_empty());
        assert_eq!(
            h.stored().window_date,
            NaiveDate::from_ymd_opt(2026, 3, 16).unwrap()
        );
    }

    #[test]
    fn failed_append_retries_rollover_next_tick() {
        let mut h = Harness::new(3, at(14, 23, 0));
        h.backend.set_fail_writes(true);
        assert!(h.tick(at(15, 0, 1)).is_err());
        assert_eq!(h.accumulator.record().elapsed, 3);
        assert_eq!(
            h.accumulator.record().window_date,
            NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
        );

        h.backend.set_fail_writes(false);
        let outcome = h.tick(at(15, 0, 2)).unwrap();
        assert_eq!(outcome.date_rollover, Some(1));
        assert_eq!(h.store.load_backlog().unwrap().records[0].total_time, 3);
    }

    #[test]
    fn failed_save_keeps_count_in_memory() {
        let mut h = Harness::new(1, at(14, 9, 0));
        h.backend.set_fail_writes(true);
        assert!(h.tick(at(14, 9, 1)).is_err());
        assert_eq!(h.accumulator.record().elapsed, 2);

        h.backend.set_fail_writes(false);
        assert_eq!(h.tick(at(14, 9, 2)).unwrap().elapsed, 3);
        assert_eq!(h.stored().elapsed, 3);
    }

    #[test]
    fn date_change_at_window_size_flushes_new_window_only() {
        let mut h = Harness::new(5, at(14, 23, 0));
        h.engine.collector().set_connected(false);
        let outcome = h.tick(at(15, 0, 0)).unwrap();

        assert_eq!(outcome.date_rollover, Some(1));
        assert_eq!(outcome.elapsed, 1);
        assert!(!outcome.flushed());
        assert_eq!(h.store.load_backlog().unwrap().records[0].total_time, 5);
    }
}
