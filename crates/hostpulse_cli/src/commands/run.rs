//! Run command implementation.

use hostpulse_agent::{shutdown_signal, AgentConfig, Schedule, Scheduler, SystemAgent};
use tracing::info;

/// Runs the agent until a shutdown signal arrives.
pub fn run(config: &AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let agent = SystemAgent::from_config(config)?;
    info!(
        data_dir = %config.data_dir.display(),
        collector = %config.sync.single_url,
        window_size = config.sync.window_size,
        "agent starting"
    );

    let scheduler = Scheduler::new(agent, Schedule::from_config(config));
    let report = scheduler.block_on(shutdown_signal())?;

    info!(
        ticks = report.ticks,
        tick_failures = report.tick_failures,
        syncs = report.syncs,
        integrity_checks = report.integrity_checks,
        "agent stopped"
    );
    if !report.finalized {
        return Err("final tick did not complete before the shutdown timeout".into());
    }
    Ok(())
}
