//! Test fixtures and agent helpers.
//!
//! Provides an agent wired to fakes that outlive it, so a test can stop the
//! agent, poke at its state and start it again.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hostpulse_agent::{Agent, AgentResult, ManualClock, StaticIdentity};
use hostpulse_store::{
    CounterStore, DocumentBackend, FileBackend, Identity, InMemoryBackend, IntervalRecord,
    Location, StoreResult,
};
use hostpulse_sync_engine::{MockCollector, SyncConfig, SyncEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Starting instant of every fixture clock: 2026-03-14 09:00 UTC.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0)
        .single()
        .expect("valid epoch")
}

/// The identity every fixture agent reports.
pub fn fixed_identity() -> StaticIdentity {
    StaticIdentity::new(
        Identity {
            system_id: "a1b2c3d4e5f6".to_string(),
            username: "tester".to_string(),
            mac_address: "02:00:00:00:00:01".to_string(),
            serial_number: "SN-0001".to_string(),
        },
        Location::new(18.52, 73.86, "Pune, Maharashtra, India"),
    )
}

/// A window opened at `opened` holding `elapsed` ticks.
pub fn window_at(opened: DateTime<Utc>, elapsed: u32) -> IntervalRecord {
    let mut record = IntervalRecord::fresh(Identity::unknown(), Location::default(), opened);
    record.elapsed = elapsed;
    record
}

type BackendOpener<B> = Box<dyn Fn() -> StoreResult<B> + Send>;

/// An agent over fake collaborators that survive restarts.
///
/// The collector and clock are shared with every agent instance this fixture
/// opens; the backend is reopened from the same place.
pub struct TestAgent<B: DocumentBackend> {
    agent: Option<Agent<B, MockCollector>>,
    open_backend: BackendOpener<B>,
    collector: Arc<MockCollector>,
    clock: ManualClock,
    window_size: u32,
    path: Option<PathBuf>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestAgent<InMemoryBackend> {
    /// Creates an agent over a fresh in-memory store.
    pub fn memory(window_size: u32) -> Self {
        Self::with_memory(InMemoryBackend::new(), window_size)
    }

    /// Creates an agent over `backend`, which may hold seeded documents.
    pub fn with_memory(backend: InMemoryBackend, window_size: u32) -> Self {
        let opener: BackendOpener<InMemoryBackend> = Box::new(move || Ok(backend.clone()));
        Self::build(opener, window_size, None, None)
    }

    /// Returns a handle sharing the agent's documents.
    pub fn backend(&self) -> InMemoryBackend {
        self.agent().store().backend().clone()
    }
}

impl TestAgent<FileBackend> {
    /// Creates an agent over a temporary data directory.
    pub fn on_disk(window_size: u32) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("state");
        let opener_path = path.clone();
        let opener: BackendOpener<FileBackend> = Box::new(move || FileBackend::open(&opener_path));
        Self::build(opener, window_size, Some(path), Some(temp_dir))
    }
}

impl<B: DocumentBackend> TestAgent<B> {
    fn build(
        open_backend: BackendOpener<B>,
        window_size: u32,
        path: Option<PathBuf>,
        temp_dir: Option<TempDir>,
    ) -> Self {
        let mut fixture = Self {
            agent: None,
            open_backend,
            collector: Arc::new(MockCollector::new()),
            clock: ManualClock::new(epoch()),
            window_size,
            path,
            _temp_dir: temp_dir,
        };
        fixture.start().expect("Failed to open test agent");
        fixture
    }

    fn start(&mut self) -> AgentResult<()> {
        let backend = (self.open_backend)()?;
        let engine = SyncEngine::with_shared(
            SyncConfig::default().with_window_size(self.window_size),
            Arc::clone(&self.collector),
        );
        let agent = Agent::open(
            CounterStore::new(backend, self.window_size),
            engine,
            Box::new(fixed_identity()),
            Box::new(self.clock.clone()),
        )?;
        self.agent = Some(agent);
        Ok(())
    }

    /// Drops the running agent without finalizing it and opens a new one
    /// over the same state, as after a crash.
    ///
    /// # Errors
    ///
    /// Returns the error from reopening; the fixture is then stopped.
    pub fn restart(&mut self) -> AgentResult<()> {
        self.agent = None;
        self.start()
    }

    /// Runs `f` while no agent is open, then restarts.
    ///
    /// # Errors
    ///
    /// Returns the error from reopening.
    pub fn while_stopped<F: FnOnce(Option<&Path>)>(&mut self, f: F) -> AgentResult<()> {
        self.agent = None;
        f(self.path.as_deref());
        self.start()
    }

    /// Returns the running agent.
    pub fn agent(&self) -> &Agent<B, MockCollector> {
        self.agent.as_ref().expect("test agent is stopped")
    }

    /// Returns the running agent mutably.
    pub fn agent_mut(&mut self) -> &mut Agent<B, MockCollector> {
        self.agent.as_mut().expect("test agent is stopped")
    }

    /// Returns the scripted collector.
    pub fn collector(&self) -> &MockCollector {
        &self.collector
    }

    /// Returns the clock shared with the agent.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Returns the window size.
    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// Returns the data directory for on-disk fixtures.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Moves the clock forward by `minutes`.
    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }

    /// Moves the clock forward by `days`.
    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }
}

impl<B: DocumentBackend> std::ops::Deref for TestAgent<B> {
    type Target = Agent<B, MockCollector>;

    fn deref(&self) -> &Self::Target {
        self.agent()
    }
}

impl<B: DocumentBackend> std::ops::DerefMut for TestAgent<B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.agent_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostpulse_store::INTERVAL_DOCUMENT;

    #[test]
    fn memory_agent_survives_restart() {
        let mut agent = TestAgent::memory(5);
        agent.collector().set_connected(false);
        agent.tick().unwrap();
        agent.tick().unwrap();

        agent.restart().unwrap();
        assert_eq!(agent.record().elapsed, 2);
        assert_eq!(agent.record().identity.username, "tester");
    }

    #[test]
    fn disk_agent_can_be_stopped_and_edited() {
        let mut agent = TestAgent::on_disk(5);
        agent.tick().unwrap();

        agent
            .while_stopped(|path| {
                let path = path.unwrap().join(INTERVAL_DOCUMENT);
                std::fs::write(path, b"garbage").unwrap();
            })
            .unwrap();

        assert_eq!(agent.record().elapsed, 0);
        assert_eq!(agent.repairs().len(), 1);
    }

    #[test]
    fn window_at_sets_date_and_count() {
        let record = window_at(epoch(), 3);
        assert_eq!(record.elapsed, 3);
        assert_eq!(record.window_date, epoch().date_naive());
    }
}
