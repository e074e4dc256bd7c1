//! Verify command implementation.

use chrono::Utc;
use hostpulse_agent::AgentConfig;
use hostpulse_store::{CounterStore, FileBackend, Repair};
use tracing::warn;

/// Runs the verify command.
///
/// Takes the agent lock, so it fails while an agent is running.
pub fn run(config: &AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let repairs = verify(config)?;

    if repairs.is_empty() {
        println!("✓ State at {:?} is healthy", config.data_dir);
    } else {
        println!("Repaired {} problem(s):", repairs.len());
        for repair in &repairs {
            println!("  - {}", describe(repair));
        }
    }
    Ok(())
}

/// Loads and repairs the state under the configured data directory.
pub fn verify(config: &AgentConfig) -> Result<Vec<Repair>, Box<dyn std::error::Error>> {
    let backend = FileBackend::open(&config.data_dir)?;
    let mut store = CounterStore::new(backend, config.sync.window_size);

    let loaded = store.load(Utc::now())?;
    // load writes back what it repaired; verify catches anything else missing
    let report = store.verify(&loaded.interval)?;
    if !report.is_clean() {
        warn!(recreated = ?report.recreated, "documents recreated after load");
    }

    Ok(loaded.repairs)
}

fn describe(repair: &Repair) -> String {
    match repair {
        Repair::IntervalMissing => "current window missing, recreated".to_string(),
        Repair::IntervalUnreadable(e) => format!("current window unreadable ({}), reset", e),
        Repair::IntervalOutOfRange { elapsed } => {
            format!("current window elapsed {} out of range, reset", elapsed)
        }
        Repair::BacklogMissing => "backlog missing, recreated empty".to_string(),
        Repair::BacklogUnreadable(e) => format!("backlog unreadable ({}), reset", e),
    }
}
