//! Reset command implementation.

use chrono::Utc;
use hostpulse_agent::AgentConfig;
use hostpulse_store::{CounterStore, FileBackend};
use tracing::warn;

/// Runs the reset command.
///
/// Refuses to touch anything without `--yes`.
pub fn run(config: &AgentConfig, yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !yes {
        return Err("reset discards unsent usage; pass --yes to confirm".into());
    }

    let discarded = reset(config)?;
    println!(
        "✓ Reset {:?}: discarded {} backlog window(s)",
        config.data_dir, discarded
    );
    Ok(())
}

/// Discards all state and returns how many backlog windows were dropped.
pub fn reset(config: &AgentConfig) -> Result<usize, Box<dyn std::error::Error>> {
    let backend = FileBackend::open(&config.data_dir)?;
    let mut store = CounterStore::new(backend, config.sync.window_size);

    // an unreadable backlog is discarded all the same
    let discarded = store.load_backlog().map(|b| b.len()).unwrap_or(0);
    if discarded > 0 {
        warn!(windows = discarded, "discarding unsent backlog");
    }
    store.reset(Utc::now())?;
    Ok(discarded)
}
