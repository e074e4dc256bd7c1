//! Sync command implementation.

use hostpulse_agent::{AgentConfig, SystemAgent};
use hostpulse_sync_engine::{DrainOutcome, WindowOutcome};

/// Runs one standalone flush and reports what happened.
pub fn run(config: &AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut agent = SystemAgent::from_config(config)?;
    let outcome = agent.sync();

    if !outcome.reachable {
        println!("✗ Collector unreachable; nothing sent");
        return Err("collector unreachable".into());
    }

    match &outcome.drain {
        DrainOutcome::Empty => println!("Backlog:  empty"),
        DrainOutcome::Delivered(n) => println!("Backlog:  {} window(s) delivered", n),
        DrainOutcome::Failed(e) => println!("Backlog:  failed ({})", e),
        DrainOutcome::Skipped => println!("Backlog:  skipped"),
    }
    match &outcome.window {
        WindowOutcome::Sent => println!("Window:   sent"),
        WindowOutcome::Failed(e) => println!("Window:   failed ({})", e),
        WindowOutcome::Skipped => println!("Window:   skipped"),
    }
    println!("Duration: {:?}", outcome.duration);

    if outcome.is_success() {
        println!("✓ Sync succeeded");
        Ok(())
    } else {
        println!("✗ Sync failed");
        Err("sync failed".into())
    }
}
