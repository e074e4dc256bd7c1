//! The agent: store, engine, accumulator and probes wired together.

use crate::accumulator::{Accumulator, AccumulatorState, TickOutcome};
use crate::clock::{Clock, SystemClock};
use crate::config::AgentConfig;
use crate::error::AgentResult;
use crate::identity::{IdentityProvider, SystemIdentity};
use hostpulse_store::{
    Backlog, CounterStore, DocumentBackend, FileBackend, IntegrityReport, IntervalRecord, Repair,
};
use hostpulse_sync_engine::{
    Collector, DrainOutcome, FlushOutcome, HttpCollector, SyncEngine, UreqClient,
};
use tracing::{info, warn};

/// The production agent type.
pub type SystemAgent = Agent<FileBackend, HttpCollector<UreqClient>>;

/// Result of [`Agent::finalize`].
#[derive(Debug, Clone)]
pub struct Finalized {
    /// The last tick.
    pub tick: TickOutcome,
    /// Backlog drain, run when the last tick did not flush.
    pub drain: Option<DrainOutcome>,
}

/// One agent instance. Not internally synchronized; wrap it in a mutex to
/// share it.
pub struct Agent<B: DocumentBackend, C: Collector> {
    store: CounterStore<B>,
    engine: SyncEngine<C>,
    identity: Box<dyn IdentityProvider>,
    clock: Box<dyn Clock>,
    accumulator: Accumulator,
    repairs: Vec<Repair>,
}

impl SystemAgent {
    /// Opens the agent described by `config` with the system probes.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or is locked
    /// by another agent, or if the stored state cannot be repaired.
    pub fn from_config(config: &AgentConfig) -> AgentResult<Self> {
        config.validate()?;
        let backend = FileBackend::open(&config.data_dir)?;
        let client = UreqClient::new(config.sync.request_timeout);
        let collector = HttpCollector::new(&config.sync, client);
        let identity = SystemIdentity::new(config.sync.request_timeout, config.location_ttl);

        Self::open(
            CounterStore::new(backend, config.sync.window_size),
            SyncEngine::new(config.sync.clone(), collector),
            Box::new(identity),
            Box::new(SystemClock),
        )
    }
}

impl<B: DocumentBackend, C: Collector> Agent<B, C> {
    /// Loads (and heals) the stored state and resumes accumulation.
    ///
    /// # Errors
    ///
    /// Returns an error if a repaired document cannot be written back.
    pub fn open(
        mut store: CounterStore<B>,
        engine: SyncEngine<C>,
        identity: Box<dyn IdentityProvider>,
        clock: Box<dyn Clock>,
    ) -> AgentResult<Self> {
        let loaded = store.load(clock.now())?;
        if loaded.was_repaired() {
            warn!(repairs = ?loaded.repairs, "stored state repaired on load");
        }
        info!(
            elapsed = loaded.interval.elapsed,
            date = %loaded.interval.window_date,
            backlog = loaded.backlog.len(),
            "agent state loaded"
        );

        let accumulator = Accumulator::new(loaded.interval, store.window_size());
        Ok(Self {
            store,
            engine,
            identity,
            clock,
            accumulator,
            repairs: loaded.repairs,
        })
    }

    /// Runs one accumulator tick at the clock's current time.
    ///
    /// # Errors
    ///
    /// Returns a store error; see [`Accumulator::tick`].
    pub fn tick(&mut self) -> AgentResult<TickOutcome> {
        let now = self.clock.now();
        self.accumulator
            .tick(&mut self.store, &self.engine, self.identity.as_ref(), now)
    }

    /// Standalone flush of the backlog and the current window.
    ///
    /// Leaves `elapsed` alone whatever the outcome.
    pub fn sync(&mut self) -> FlushOutcome {
        let outcome = self.engine.flush(&mut self.store, self.accumulator.record());
        if outcome.is_success() {
            info!(drain = ?outcome.drain, "scheduled sync succeeded");
        } else {
            warn!(
                reachable = outcome.reachable,
                drain = ?outcome.drain,
                window = ?outcome.window,
                "scheduled sync failed"
            );
        }
        outcome
    }

    /// Drains the backlog without sending the current window.
    pub fn drain(&mut self) -> DrainOutcome {
        self.engine.drain(&mut self.store)
    }

    /// Recreates any state document that disappeared.
    ///
    /// # Errors
    ///
    /// Returns a store error if a document cannot be recreated.
    pub fn verify_files(&mut self) -> AgentResult<IntegrityReport> {
        let report = self.store.verify(self.accumulator.record())?;
        if !report.is_clean() {
            warn!(recreated = ?report.recreated, "state documents recreated");
        }
        Ok(report)
    }

    /// Final tick plus, if that tick did not flush, a backlog drain.
    ///
    /// The drain is attempted even if the tick failed.
    ///
    /// # Errors
    ///
    /// Returns the tick's error after the drain has run.
    pub fn finalize(&mut self) -> AgentResult<Finalized> {
        let tick = self.tick();
        let drain = match &tick {
            Ok(outcome) if outcome.flushed() => None,
            _ => Some(self.drain()),
        };
        info!(?drain, "agent finalized");
        Ok(Finalized { tick: tick?, drain })
    }

    /// Discards the current window and the backlog.
    ///
    /// # Errors
    ///
    /// Returns a store error if either document cannot be written.
    pub fn reset(&mut self) -> AgentResult<IntervalRecord> {
        let fresh = self.store.reset(self.clock.now())?;
        self.accumulator.replace(fresh.clone());
        warn!("agent state reset");
        Ok(fresh)
    }

    /// Returns the accumulator state.
    pub fn state(&self) -> &AccumulatorState {
        self.accumulator.state()
    }

    /// Returns the current window.
    pub fn record(&self) -> &IntervalRecord {
        self.accumulator.record()
    }

    /// Returns the stored backlog.
    ///
    /// # Errors
    ///
    /// Returns a store error if the backlog cannot be read.
    pub fn backlog(&self) -> AgentResult<Backlog> {
        Ok(self.store.load_backlog()?)
    }

    /// Repairs made when the agent was opened.
    pub fn repairs(&self) -> &[Repair] {
        &self.repairs
    }

    /// Returns the sync engine.
    pub fn engine(&self) -> &SyncEngine<C> {
        &self.engine
    }

    /// Returns the store.
    pub fn store(&self) -> &CounterStore<B> {
        &self.store
    }
}
