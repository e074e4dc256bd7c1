//! Wire payloads for the collector endpoints.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, NaiveDate, Utc};
use hostpulse_store::{CompletedWindow, IntervalRecord};
use serde::{Deserialize, Serialize};

/// Body of `POST <bulk-url>`: the whole backlog, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSyncRequest {
    /// Completed windows in backlog order.
    pub records: Vec<CompletedWindow>,
}

impl BulkSyncRequest {
    /// Creates a bulk request.
    pub fn new(records: Vec<CompletedWindow>) -> Self {
        Self { records }
    }

    /// Encodes the request as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if serialization fails.
    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SyncError::Codec(e.to_string()))
    }
}

/// Body of `POST <single-url>`: the current window, normalized.
///
/// `active_time` is always the window size, not the raw elapsed counter, so
/// the collector receives discrete window-sized increments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleSyncRequest {
    /// Logged-in user name.
    pub username: String,
    /// Stable machine identifier.
    pub system_id: String,
    /// First non-loopback MAC address.
    pub mac_address: String,
    /// Hardware serial number.
    pub serial_number: String,
    /// Always the configured window size.
    pub active_time: u32,
    /// Latitude, if resolved.
    pub latitude: Option<f64>,
    /// Longitude, if resolved.
    pub longitude: Option<f64>,
    /// Place name, if resolved.
    pub location_name: Option<String>,
    /// Window date.
    pub date: NaiveDate,
    /// Last mutation of the window.
    pub last_updated: DateTime<Utc>,
}

impl SingleSyncRequest {
    /// Builds the payload for `record`, reporting `window_size` as active time.
    pub fn from_window(record: &IntervalRecord, window_size: u32) -> Self {
        Self {
            username: record.identity.username.clone(),
            system_id: record.identity.system_id.clone(),
            mac_address: record.identity.mac_address.clone(),
            serial_number: record.identity.serial_number.clone(),
            active_time: window_size,
            latitude: record.location.latitude,
            longitude: record.location.longitude,
            location_name: record.location.location_name.clone(),
            date: record.window_date,
            last_updated: record.last_updated,
        }
    }

    /// Encodes the request as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if serialization fails.
    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SyncError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hostpulse_store::{Identity, Location};

    fn record(elapsed: u32) -> IntervalRecord {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
        let mut record = IntervalRecord::fresh(
            Identity {
                system_id: "a1b2c3d4e5f6".into(),
                username: "asha".into(),
                mac_address: "3c:22:fb:10:aa:01".into(),
                serial_number: "PF3XK9".into(),
            },
            Location::new(18.52, 73.85, "Pune, Maharashtra, India"),
            now,
        );
        record.elapsed = elapsed;
        record
    }

    #[test]
    fn single_request_normalizes_active_time() {
        let request = SingleSyncRequest::from_window(&record(17), 5);
        assert_eq!(request.active_time, 5);
        assert_eq!(request.username, "asha");
        assert_eq!(request.location_name.as_deref(), Some("Pune, Maharashtra, India"));
    }

    #[test]
    fn single_request_wire_fields() {
        let body = SingleSyncRequest::from_window(&record(5), 5).encode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        for key in [
            "username",
            "system_id",
            "mac_address",
            "serial_number",
            "active_time",
            "latitude",
            "longitude",
            "location_name",
            "date",
            "last_updated",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["date"], "2026-03-14");
    }

    #[test]
    fn bulk_request_wraps_records() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 0, 1, 0).unwrap();
        let request = BulkSyncRequest::new(vec![record(3).complete(now)]);
        let value: serde_json::Value = serde_json::from_slice(&request.encode().unwrap()).unwrap();

        let records = value["records"].as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["total_time"], 3);
        assert_eq!(records[0]["system_id"], "a1b2c3d4e5f6");
    }

    #[test]
    fn unresolved_location_encodes_nulls() {
        let mut window = record(5);
        window.location = Location::default();
        let value: serde_json::Value =
            serde_json::from_slice(&SingleSyncRequest::from_window(&window, 5).encode().unwrap())
                .unwrap();
        assert!(value["latitude"].is_null());
        assert!(value["location_name"].is_null());
    }
}
