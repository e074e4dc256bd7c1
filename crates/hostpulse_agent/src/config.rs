//! Agent configuration.

use crate::error::{AgentError, AgentResult};
use directories::ProjectDirs;
use hostpulse_sync_engine::{RetryConfig, SyncConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the agent and its scheduler.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Directory holding the window and backlog documents.
    pub data_dir: PathBuf,

    /// Period of the accumulator tick.
    pub tick_period: Duration,

    /// Period of the storage integrity check.
    pub integrity_period: Duration,

    /// Upper bound on the final tick and drain at shutdown.
    pub shutdown_timeout: Duration,

    /// How long a resolved geolocation is reused before probing again.
    pub location_ttl: Duration,

    /// Collector endpoints, window size, sync interval and retry policy.
    pub sync: SyncConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            tick_period: Duration::from_secs(60),
            integrity_period: Duration::from_secs(5 * 60),
            shutdown_timeout: Duration::from_secs(5),
            location_ttl: Duration::from_secs(30 * 60),
            sync: SyncConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Sets the tick period.
    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Sets the integrity check period.
    #[must_use]
    pub fn with_integrity_period(mut self, period: Duration) -> Self {
        self.integrity_period = period;
        self
    }

    /// Sets the shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the geolocation cache lifetime.
    #[must_use]
    pub fn with_location_ttl(mut self, ttl: Duration) -> Self {
        self.location_ttl = ttl;
        self
    }

    /// Sets the sync configuration.
    #[must_use]
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Loads defaults overlaid with the JSON file at `path`.
    ///
    /// Every key in the file is optional; durations are in seconds.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read or parsed, or if the
    /// result fails [`validate`](Self::validate).
    pub fn from_json_file(path: &Path) -> AgentResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AgentError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Loads defaults overlaid with a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `Config` on malformed JSON, unknown keys or invalid values.
    pub fn from_json_str(text: &str) -> AgentResult<Self> {
        let file: ConfigFile =
            serde_json::from_str(text).map_err(|e| AgentError::config(e.to_string()))?;
        let config = file.apply(Self::default());
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the agent cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `Config` naming the first offending field.
    pub fn validate(&self) -> AgentResult<()> {
        if self.sync.window_size == 0 {
            return Err(AgentError::config("window_size must be at least 1"));
        }
        for (name, value) in [
            ("tick_period", self.tick_period),
            ("integrity_period", self.integrity_period),
            ("sync_interval", self.sync.sync_interval),
            ("request_timeout", self.sync.request_timeout),
        ] {
            if value.is_zero() {
                return Err(AgentError::config(format!("{name} must be non-zero")));
            }
        }
        if self.sync.retry.max_attempts == 0 {
            return Err(AgentError::config("retry max_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Platform local-data directory for the agent, or `./hostpulse-data` when
/// the platform has none.
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "hostpulse")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("hostpulse-data"))
}

/// On-disk configuration file. Absent keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    collector_url: Option<String>,
    bulk_url: Option<String>,
    single_url: Option<String>,
    connectivity_url: Option<String>,
    window_size: Option<u32>,
    tick_seconds: Option<u64>,
    sync_seconds: Option<u64>,
    integrity_seconds: Option<u64>,
    shutdown_timeout_seconds: Option<u64>,
    request_timeout_seconds: Option<u64>,
    location_ttl_seconds: Option<u64>,
    retry: Option<RetryFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryFile {
    max_attempts: Option<u32>,
    initial_delay_seconds: Option<u64>,
    max_delay_seconds: Option<u64>,
    jitter: Option<bool>,
}

impl ConfigFile {
    fn apply(self, mut config: AgentConfig) -> AgentConfig {
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }

        // the base URL resets both endpoints; explicit URLs then override
        let mut sync = match self.collector_url {
            Some(base) => SyncConfig::new(base)
                .with_connectivity_url(config.sync.connectivity_url.clone())
                .with_timeout(config.sync.request_timeout)
                .with_window_size(config.sync.window_size)
                .with_sync_interval(config.sync.sync_interval)
                .with_retry(config.sync.retry.clone()),
            None => config.sync.clone(),
        };
        if let Some(url) = self.bulk_url {
            sync = sync.with_bulk_url(url);
        }
        if let Some(url) = self.single_url {
            sync = sync.with_single_url(url);
        }
        if let Some(url) = self.connectivity_url {
            sync = sync.with_connectivity_url(url);
        }
        if let Some(size) = self.window_size {
            sync = sync.with_window_size(size);
        }
        if let Some(secs) = self.sync_seconds {
            sync = sync.with_sync_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.request_timeout_seconds {
            sync = sync.with_timeout(Duration::from_secs(secs));
        }
        if let Some(retry) = self.retry {
            let base = sync.retry.clone();
            sync = sync.with_retry(retry.apply(base));
        }
        config.sync = sync;

        if let Some(secs) = self.tick_seconds {
            config.tick_period = Duration::from_secs(secs);
        }
        if let Some(secs) = self.integrity_seconds {
            config.integrity_period = Duration::from_secs(secs);
        }
        if let Some(secs) = self.shutdown_timeout_seconds {
            config.shutdown_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.location_ttl_seconds {
            config.location_ttl = Duration::from_secs(secs);
        }
        config
    }
}

impl RetryFile {
    fn apply(self, mut retry: RetryConfig) -> RetryConfig {
        if let Some(attempts) = self.max_attempts {
            retry.max_attempts = attempts;
        }
        if let Some(secs) = self.initial_delay_seconds {
            retry = retry.with_initial_delay(Duration::from_secs(secs));
        }
        if let Some(secs) = self.max_delay_seconds {
            retry = retry.with_max_delay(Duration::from_secs(secs));
        }
        if let Some(jitter) = self.jitter {
            retry = retry.with_jitter(jitter);
        }
        retry
    }
}
