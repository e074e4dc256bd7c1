//! Record types persisted by the store.
//!
//! Identity and location are flattened into both record kinds so that the
//! backlog document and the bulk sync payload share one flat JSON shape:
//!
//! ```text
//! { "system_id": "...", "username": "...", "latitude": 1.0, ...,
//!   "total_time": 5, "date": "2026-10-16", ... }
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel used for identity fields that could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// Machine identity snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    /// Stable machine identifier.
    pub system_id: String,
    /// Logged-in user name.
    pub username: String,
    /// First non-loopback MAC address.
    pub mac_address: String,
    /// Hardware serial number.
    pub serial_number: String,
}

impl Identity {
    /// Returns an identity with every field set to [`UNKNOWN`].
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            system_id: UNKNOWN.to_string(),
            username: UNKNOWN.to_string(),
            mac_address: UNKNOWN.to_string(),
            serial_number: UNKNOWN.to_string(),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Resolved geolocation. Every field is nullable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Free-text place name, e.g. "Pune, Maharashtra, India".
    pub location_name: Option<String>,
}

impl Location {
    /// Creates a resolved location.
    pub fn new(latitude: f64, longitude: f64, name: impl Into<String>) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            location_name: Some(name.into()),
        }
    }

    /// Returns true if coordinates are present.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// The single mutable row representing the window being accumulated now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalRecord {
    /// Identity snapshot from the last tick.
    #[serde(flatten)]
    pub identity: Identity,
    /// Location snapshot from the last tick.
    #[serde(flatten)]
    pub location: Location,
    /// Whole ticks accumulated in this window.
    pub elapsed: u32,
    /// UTC calendar date the window belongs to.
    #[serde(rename = "date")]
    pub window_date: NaiveDate,
    /// When the window was opened.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub last_updated: DateTime<Utc>,
}

impl IntervalRecord {
    /// Opens a new window for `now`'s date with `elapsed = 0`.
    #[must_use]
    pub fn fresh(identity: Identity, location: Location, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            location,
            elapsed: 0,
            window_date: now.date_naive(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Returns true if the window belongs to `today`.
    #[must_use]
    pub fn is_dated(&self, today: NaiveDate) -> bool {
        self.window_date == today
    }

    /// Closes this window into a backlog entry.
    #[must_use]
    pub fn complete(&self, now: DateTime<Utc>) -> CompletedWindow {
        CompletedWindow {
            identity: self.identity.clone(),
            location: self.location.clone(),
            total_time: self.elapsed,
            window_date: self.window_date,
            created_at: self.created_at,
            last_updated: self.last_updated,
            completed_at: now,
        }
    }
}

/// A finished window waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedWindow {
    /// Identity snapshot at completion.
    #[serde(flatten)]
    pub identity: Identity,
    /// Location snapshot at completion.
    #[serde(flatten)]
    pub location: Location,
    /// Ticks accumulated when the window closed.
    pub total_time: u32,
    /// UTC calendar date the window belonged to.
    #[serde(rename = "date")]
    pub window_date: NaiveDate,
    /// When the window was opened.
    pub created_at: DateTime<Utc>,
    /// Last mutation of the window before it closed.
    pub last_updated: DateTime<Utc>,
    /// When the window was moved into the backlog.
    pub completed_at: DateTime<Utc>,
}

/// Ordered completed windows, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Backlog {
    /// Entries in append order.
    #[serde(default)]
    pub records: Vec<CompletedWindow>,
}

impl Backlog {
    /// Creates an empty backlog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends an entry at the tail.
    pub fn push(&mut self, entry: CompletedWindow) {
        self.records.push(entry);
    }

    /// Sum of `total_time` across all entries.
    #[must_use]
    pub fn total_time(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.total_time)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn fresh_record_starts_empty_on_today() {
        let now = at(2026, 3, 14, 23);
        let record = IntervalRecord::fresh(Identity::unknown(), Location::default(), now);
        assert_eq!(record.elapsed, 0);
        assert_eq!(record.window_date, NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
        assert!(record.is_dated(now.date_naive()));
        assert!(!record.is_dated(at(2026, 3, 15, 0).date_naive()));
    }

    #[test]
    fn complete_carries_elapsed_and_date() {
        let opened = at(2026, 3, 14, 8);
        let mut record = IntervalRecord::fresh(Identity::unknown(), Location::default(), opened);
        record.elapsed = 3;

        let closed = at(2026, 3, 15, 0);
        let entry = record.complete(closed);
        assert_eq!(entry.total_time, 3);
        assert_eq!(entry.window_date, record.window_date);
        assert_eq!(entry.created_at, opened);
        assert_eq!(entry.completed_at, closed);
    }

    #[test]
    fn json_shape_is_flat() {
        let now = at(2026, 3, 14, 8);
        let record = IntervalRecord::fresh(
            Identity::unknown(),
            Location::new(18.5, 73.8, "Pune, Maharashtra, India"),
            now,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["system_id"], "Unknown");
        assert_eq!(value["latitude"], 18.5);
        assert_eq!(value["date"], "2026-03-14");
        assert_eq!(value["elapsed"], 0);
        assert!(value.get("identity").is_none());
    }

    #[test]
    fn missing_location_reads_as_nulls() {
        let json = r#"{
            "system_id": "abc123def456",
            "elapsed": 2,
            "date": "2026-03-14",
            "created_at": "2026-03-14T08:00:00Z",
            "last_updated": "2026-03-14T08:02:00Z"
        }"#;
        let record: IntervalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.identity.system_id, "abc123def456");
        assert_eq!(record.identity.username, UNKNOWN);
        assert!(!record.location.is_resolved());
        assert_eq!(record.elapsed, 2);
    }

    #[test]
    fn backlog_total_time() {
        let now = at(2026, 3, 14, 8);
        let mut backlog = Backlog::new();
        assert!(backlog.is_empty());

        let mut record = IntervalRecord::fresh(Identity::unknown(), Location::default(), now);
        record.elapsed = 4;
        backlog.push(record.complete(now));
        record.elapsed = 2;
        backlog.push(record.complete(now));

        assert_eq!(backlog.len(), 2);
        assert_eq!(backlog.total_time(), 6);
    }
}
