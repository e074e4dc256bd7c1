//! Periodic driver for the agent.
//!
//! Runs on a single-threaded tokio runtime. Every agent operation is sent to
//! the blocking pool and awaited before the next one is dispatched, so
//! operations never overlap.

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::error::AgentResult;
use hostpulse_store::DocumentBackend;
use hostpulse_sync_engine::{Collector, RetryConfig};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How long the runtime waits for an abandoned blocking operation on exit.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Periods and limits driving the scheduler.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Accumulator tick period.
    pub tick_period: Duration,
    /// Standalone sync period.
    pub sync_period: Duration,
    /// Integrity check period.
    pub integrity_period: Duration,
    /// Upper bound on the final tick and drain.
    pub shutdown_timeout: Duration,
    /// Retry policy for failed scheduled syncs.
    pub retry: RetryConfig,
}

impl Schedule {
    /// Takes the periods from an agent configuration.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            tick_period: config.tick_period,
            sync_period: config.sync.sync_interval,
            integrity_period: config.integrity_period,
            shutdown_timeout: config.shutdown_timeout,
            retry: config.sync.retry.clone(),
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// What the scheduler did before it stopped.
#[derive(Debug, Clone, Default)]
pub struct SchedulerReport {
    /// Ticks completed.
    pub ticks: u64,
    /// Ticks that returned an error.
    pub tick_failures: u64,
    /// Scheduled sync attempts, retries included.
    pub syncs: u64,
    /// Retries of failed scheduled syncs.
    pub sync_retries: u64,
    /// Integrity checks completed.
    pub integrity_checks: u64,
    /// Whether the final tick finished within the shutdown timeout.
    pub finalized: bool,
}

/// Drives an [`Agent`] on fixed periods until shutdown.
pub struct Scheduler<B: DocumentBackend, C: Collector> {
    agent: Arc<Mutex<Agent<B, C>>>,
    schedule: Schedule,
}

impl<B, C> Scheduler<B, C>
where
    B: DocumentBackend + 'static,
    C: Collector + 'static,
{
    /// Creates a scheduler owning `agent`.
    pub fn new(agent: Agent<B, C>, schedule: Schedule) -> Self {
        Self {
            agent: Arc::new(Mutex::new(agent)),
            schedule,
        }
    }

    /// Returns a handle to the agent.
    pub fn agent(&self) -> Arc<Mutex<Agent<B, C>>> {
        Arc::clone(&self.agent)
    }

    /// Builds a current-thread runtime and runs until `shutdown` resolves.
    ///
    /// An operation still running when the shutdown timeout expires is
    /// abandoned rather than waited for.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built.
    pub fn block_on<F>(self, shutdown: F) -> AgentResult<SchedulerReport>
    where
        F: Future<Output = ()>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let report = runtime.block_on(self.run(shutdown));
        runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
        Ok(report)
    }

    /// Runs until `shutdown` resolves, then finalizes within the timeout.
    pub async fn run<F>(self, shutdown: F) -> SchedulerReport
    where
        F: Future<Output = ()>,
    {
        let mut report = SchedulerReport::default();
        let start = Instant::now();

        let mut ticks = interval_at(start + self.schedule.tick_period, self.schedule.tick_period);
        let mut syncs = interval_at(start + self.schedule.sync_period, self.schedule.sync_period);
        let mut checks = interval_at(
            start + self.schedule.integrity_period,
            self.schedule.integrity_period,
        );
        for timer in [&mut ticks, &mut syncs, &mut checks] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        // next retry deadline and the attempt it will be
        let mut retry: Option<(Instant, u32)> = None;

        info!(
            tick = ?self.schedule.tick_period,
            sync = ?self.schedule.sync_period,
            integrity = ?self.schedule.integrity_period,
            "scheduler started"
        );

        tokio::pin!(shutdown);
        loop {
            let retry_at = retry.map_or_else(Instant::now, |(at, _)| at);

            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                _ = ticks.tick() => self.tick(&mut report).await,

                _ = sleep_until(retry_at), if retry.is_some() => {
                    let attempt = retry.map_or(0, |(_, attempt)| attempt);
                    report.sync_retries += 1;
                    retry = self.sync(attempt, &mut report).await;
                }

                _ = syncs.tick() => {
                    if retry.is_some() {
                        debug!("sync retry pending, skipping scheduled sync");
                    } else {
                        retry = self.sync(0, &mut report).await;
                    }
                }

                _ = checks.tick() => self.verify(&mut report).await,
            }
        }

        info!("shutdown requested, finalizing");
        let finalize = self.dispatch(|agent| agent.finalize());
        match tokio::time::timeout(self.schedule.shutdown_timeout, finalize).await {
            Ok(Some(Ok(finalized))) => {
                debug!(elapsed = finalized.tick.elapsed, "final tick persisted");
                report.finalized = true;
            }
            Ok(Some(Err(e))) => error!(error = %e, "final tick failed"),
            Ok(None) => {}
            Err(_) => warn!(
                timeout = ?self.schedule.shutdown_timeout,
                "shutdown timed out, exiting anyway"
            ),
        }

        info!(
            ticks = report.ticks,
            syncs = report.syncs,
            finalized = report.finalized,
            "scheduler stopped"
        );
        report
    }

    async fn tick(&self, report: &mut SchedulerReport) {
        match self.dispatch(|agent| agent.tick()).await {
            Some(Ok(outcome)) => {
                report.ticks += 1;
                debug!(elapsed = outcome.elapsed, "tick");
            }
            Some(Err(e)) => {
                report.tick_failures += 1;
                error!(error = %e, "tick abandoned");
            }
            None => report.tick_failures += 1,
        }
    }

    /// Runs sync attempt `attempt` (0-indexed) and returns the next retry, if
    /// any.
    async fn sync(&self, attempt: u32, report: &mut SchedulerReport) -> Option<(Instant, u32)> {
        report.syncs += 1;
        let succeeded = self
            .dispatch(|agent| agent.sync().is_success())
            .await
            .unwrap_or(false);
        if succeeded {
            return None;
        }

        let next = attempt + 1;
        if next >= self.schedule.retry.max_attempts {
            warn!(attempts = next, "scheduled sync gave up until next period");
            return None;
        }
        let delay = self.schedule.retry.delay_for_attempt(next);
        debug!(attempt = next, ?delay, "scheduled sync will retry");
        Some((Instant::now() + delay, next))
    }

    async fn verify(&self, report: &mut SchedulerReport) {
        match self.dispatch(|agent| agent.verify_files()).await {
            Some(Ok(_)) => report.integrity_checks += 1,
            Some(Err(e)) => error!(error = %e, "integrity check failed"),
            None => {}
        }
    }

    async fn dispatch<T, F>(&self, op: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Agent<B, C>) -> T + Send + 'static,
    {
        let agent = Arc::clone(&self.agent);
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = agent.lock();
            op(&mut guard)
        });
        match task.await {
            Ok(value) => Some(value),
            Err(e) => {
                error!(error = %e, "agent operation panicked");
                None
            }
        }
    }
}

/// Resolves on Ctrl-C, or on SIGTERM on Unix.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
