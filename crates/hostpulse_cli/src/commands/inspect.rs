//! Inspect command implementation.

use chrono::{DateTime, NaiveDate, Utc};
use hostpulse_agent::AgentConfig;
use hostpulse_store::{
    CompletedWindow, CounterStore, FileBackend, IntervalRecord, BACKLOG_DOCUMENT,
    INTERVAL_DOCUMENT,
};
use serde::Serialize;
use std::path::Path;

/// Agent state as shown to the operator.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data directory.
    pub data_dir: String,
    /// Window size in ticks.
    pub window_size: u32,
    /// The current window, if readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<WindowView>,
    /// Why the current window could not be shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_error: Option<String>,
    /// Number of pending backlog entries.
    pub backlog_len: usize,
    /// Active time pending in the backlog, `HH:MM:SS`.
    pub backlog_active: String,
    /// Most recent backlog entries, newest first.
    pub backlog: Vec<EntryView>,
}

/// The current window.
#[derive(Debug, Serialize)]
pub struct WindowView {
    /// Window date.
    pub date: NaiveDate,
    /// Ticks accumulated.
    pub elapsed: u32,
    /// Active time, `HH:MM:SS`.
    pub active: String,
    /// Opening time.
    pub created_at: DateTime<Utc>,
    /// Last mutation.
    pub last_updated: DateTime<Utc>,
    /// Machine identifier.
    pub system_id: String,
    /// User name.
    pub username: String,
    /// Place name, if resolved.
    pub location_name: Option<String>,
}

/// One backlog entry.
#[derive(Debug, Serialize)]
pub struct EntryView {
    /// Window date.
    pub date: NaiveDate,
    /// Ticks accumulated.
    pub total_time: u32,
    /// Active time, `HH:MM:SS`.
    pub active: String,
    /// When the window was closed.
    pub completed_at: DateTime<Utc>,
}

/// Runs the inspect command.
///
/// Reads without taking the agent lock, so it works while the agent runs.
pub fn run(
    config: &AgentConfig,
    format: &str,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(&config.data_dir, config, limit)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Collects the state under `data_dir`.
pub fn inspect(
    data_dir: &Path,
    config: &AgentConfig,
    limit: usize,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !data_dir.join(INTERVAL_DOCUMENT).exists() && !data_dir.join(BACKLOG_DOCUMENT).exists() {
        return Err(format!("No agent state found at {:?}", data_dir).into());
    }

    let tick_secs = config.tick_period.as_secs();
    let store = CounterStore::new(FileBackend::open_shared(data_dir)?, config.sync.window_size);

    let (current, current_error) = match store.load_interval() {
        Ok(Some(record)) => (Some(window_view(&record, tick_secs)), None),
        Ok(None) => (None, Some("missing".to_string())),
        Err(e) => (None, Some(e.to_string())),
    };

    let backlog = store.load_backlog()?;
    let entries = backlog
        .records
        .iter()
        .rev()
        .take(limit)
        .map(|entry| entry_view(entry, tick_secs))
        .collect();

    Ok(InspectResult {
        data_dir: data_dir.display().to_string(),
        window_size: config.sync.window_size,
        current,
        current_error,
        backlog_len: backlog.len(),
        backlog_active: format_duration(backlog.total_time() * tick_secs),
        backlog: entries,
    })
}

fn window_view(record: &IntervalRecord, tick_secs: u64) -> WindowView {
    WindowView {
        date: record.window_date,
        elapsed: record.elapsed,
        active: format_duration(u64::from(record.elapsed) * tick_secs),
        created_at: record.created_at,
        last_updated: record.last_updated,
        system_id: record.identity.system_id.clone(),
        username: record.identity.username.clone(),
        location_name: record.location.location_name.clone(),
    }
}

fn entry_view(entry: &CompletedWindow, tick_secs: u64) -> EntryView {
    EntryView {
        date: entry.window_date,
        total_time: entry.total_time,
        active: format_duration(u64::from(entry.total_time) * tick_secs),
        completed_at: entry.completed_at,
    }
}

/// Formats seconds as `HH:MM:SS`; hours are not wrapped.
pub fn format_duration(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn print_text_output(result: &InspectResult) {
    println!("Agent State: {}", result.data_dir);
    println!("═══════════════════════════════════════");
    println!();

    println!("Current Window (size {} ticks):", result.window_size);
    match (&result.current, &result.current_error) {
        (Some(window), _) => {
            println!("  Date:         {}", window.date);
            println!("  Elapsed:      {} ({})", window.elapsed, window.active);
            println!("  Opened:       {}", window.created_at);
            println!("  Last updated: {}", window.last_updated);
            println!("  System ID:    {}", window.system_id);
            println!("  User:         {}", window.username);
            println!(
                "  Location:     {}",
                window.location_name.as_deref().unwrap_or("-")
            );
        }
        (None, Some(error)) => println!("  unreadable: {}", error),
        (None, None) => println!("  -"),
    }
    println!();

    println!(
        "Backlog: {} entries, {} pending",
        result.backlog_len, result.backlog_active
    );
    if !result.backlog.is_empty() {
        println!("  {:<12} {:>6} {:>10}  Completed", "Date", "Ticks", "Active");
        println!("  {}", "─".repeat(50));
        for entry in &result.backlog {
            println!(
                "  {:<12} {:>6} {:>10}  {}",
                entry.date.to_string(),
                entry.total_time,
                entry.active,
                entry.completed_at
            );
        }
        if result.backlog.len() < result.backlog_len {
            println!("  ... {} older", result.backlog_len - result.backlog.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hostpulse_store::{Identity, Location};
    use tempfile::tempdir;

    #[test]
    fn durations_are_hh_mm_ss() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(300), "00:05:00");
        assert_eq!(format_duration(3661), "01:01:01");
        assert_eq!(format_duration(360_000), "100:00:00");
    }

    #[test]
    fn inspect_lists_newest_first() {
        let temp = tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 16, 9, 0, 0).unwrap();
        {
            let mut store = CounterStore::new(FileBackend::open(temp.path()).unwrap(), 5);
            store.load(now).unwrap();
            for (day, total) in [(13, 2), (14, 4), (15, 3)] {
                let opened = Utc.with_ymd_and_hms(2026, 3, day, 8, 0, 0).unwrap();
                let mut record =
                    IntervalRecord::fresh(Identity::unknown(), Location::default(), opened);
                record.elapsed = total;
                store.append_backlog(record.complete(now)).unwrap();
            }
        }

        let config = AgentConfig::default();
        let result = inspect(temp.path(), &config, 2).unwrap();
        assert_eq!(result.backlog_len, 3);
        assert_eq!(result.backlog.len(), 2);
        assert_eq!(result.backlog[0].total_time, 3);
        assert_eq!(result.backlog[0].active, "00:03:00");
        assert_eq!(result.backlog_active, "00:09:00");
        assert_eq!(result.current.unwrap().elapsed, 0);
    }

    #[test]
    fn inspect_reports_out_of_range_window() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join(INTERVAL_DOCUMENT),
            r#"{"elapsed": 999, "date": "2026-03-14",
                "created_at": "2026-03-14T08:00:00Z", "last_updated": "2026-03-14T08:00:00Z"}"#,
        )
        .unwrap();

        let result = inspect(temp.path(), &AgentConfig::default(), 10).unwrap();
        assert!(result.current.is_none());
        assert!(result.current_error.unwrap().contains("999"));
        assert_eq!(result.backlog_len, 0);
    }

    #[test]
    fn inspect_without_state_fails() {
        let temp = tempdir().unwrap();
        assert!(inspect(temp.path(), &AgentConfig::default(), 10).is_err());
    }
}
