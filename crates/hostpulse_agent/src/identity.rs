//! Machine identity and geolocation probing.
//!
//! Every probe is best-effort: a failure yields [`UNKNOWN`] (or null
//! coordinates) and is logged at `debug`, never returned as an error.

use hostpulse_store::{Identity, Location, UNKNOWN};
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::debug;

/// Place name reported when no geolocation service answered.
pub const LOCATION_UNKNOWN: &str = "Location Unknown";

/// Serial numbers firmware vendors leave in place of a real one.
const SERIAL_PLACEHOLDERS: &[&str] = &[
    "To be filled by O.E.M.",
    "Default string",
    "System Serial Number",
    "Not Specified",
    "None",
    "0",
];

/// Resolves machine identity and location.
///
/// Implementations must not fail; they substitute sentinels instead.
pub trait IdentityProvider: Send {
    /// Stable machine identifier.
    fn system_id(&self) -> String;

    /// Logged-in user name.
    fn username(&self) -> String;

    /// First non-loopback MAC address.
    fn mac_address(&self) -> String;

    /// Hardware serial number.
    fn serial_number(&self) -> String;

    /// Current geolocation.
    fn geolocation(&self) -> Location;

    /// All identity fields at once.
    fn identity(&self) -> Identity {
        Identity {
            system_id: self.system_id(),
            username: self.username(),
            mac_address: self.mac_address(),
            serial_number: self.serial_number(),
        }
    }
}

/// A provider returning fixed values.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    identity: Identity,
    location: Location,
}

impl StaticIdentity {
    /// Creates a provider that always answers `identity` and `location`.
    pub fn new(identity: Identity, location: Location) -> Self {
        Self { identity, location }
    }
}

impl IdentityProvider for StaticIdentity {
    fn system_id(&self) -> String {
        self.identity.system_id.clone()
    }

    fn username(&self) -> String {
        self.identity.username.clone()
    }

    fn mac_address(&self) -> String {
        self.identity.mac_address.clone()
    }

    fn serial_number(&self) -> String {
        self.identity.serial_number.clone()
    }

    fn geolocation(&self) -> Location {
        self.location.clone()
    }

    fn identity(&self) -> Identity {
        self.identity.clone()
    }
}

/// Public IP geolocation services, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoService {
    /// ipapi.co
    IpApiCo,
    /// ip-api.com
    IpApiCom,
    /// ipinfo.io
    IpInfo,
}

impl GeoService {
    /// The default chain.
    pub const CHAIN: [GeoService; 3] = [GeoService::IpApiCo, GeoService::IpApiCom, GeoService::IpInfo];

    /// Lookup URL for the caller's own address.
    pub fn url(self) -> &'static str {
        match self {
            GeoService::IpApiCo => "https://ipapi.co/json/",
            GeoService::IpApiCom => "http://ip-api.com/json/",
            GeoService::IpInfo => "https://ipinfo.io/json",
        }
    }

    /// Extracts a location from the service's JSON answer.
    ///
    /// Returns `None` unless both coordinates are present.
    pub fn parse(self, body: &Value) -> Option<Location> {
        let text = |key: &str| body.get(key).and_then(Value::as_str);
        let (latitude, longitude, parts) = match self {
            GeoService::IpApiCo => (
                body.get("latitude")?.as_f64()?,
                body.get("longitude")?.as_f64()?,
                [text("city"), text("region"), text("country_name")],
            ),
            GeoService::IpApiCom => (
                body.get("lat")?.as_f64()?,
                body.get("lon")?.as_f64()?,
                [text("city"), text("regionName"), text("country")],
            ),
            GeoService::IpInfo => {
                let (lat, lon) = text("loc")?.split_once(',')?;
                (
                    lat.trim().parse().ok()?,
                    lon.trim().parse().ok()?,
                    [text("city"), text("region"), text("country")],
                )
            }
        };
        Some(Location::new(latitude, longitude, place_name(&parts)))
    }
}

/// Joins the non-empty parts with `", "`.
fn place_name(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The location reported when every service failed.
pub fn unknown_location() -> Location {
    Location {
        latitude: None,
        longitude: None,
        location_name: Some(LOCATION_UNKNOWN.to_string()),
    }
}

/// Identity fields that do not change while the process runs.
#[derive(Debug, Clone)]
struct HostFacts {
    system_id: String,
    mac_address: String,
    serial_number: String,
}

/// The default provider, probing the local machine and public IP services.
///
/// Host facts are probed once per process. Geolocation is cached for
/// `location_ttl`, failures included, so an offline tick never waits on the
/// whole service chain more than once per TTL.
pub struct SystemIdentity {
    http: ureq::Agent,
    location_ttl: Duration,
    host: OnceLock<HostFacts>,
    location: Mutex<Option<(Instant, Location)>>,
}

impl SystemIdentity {
    /// Creates a provider whose geolocation requests time out after
    /// `request_timeout` each and whose answer is reused for `location_ttl`.
    pub fn new(request_timeout: Duration, location_ttl: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(request_timeout))
            .build();
        Self {
            http: ureq::Agent::new_with_config(config),
            location_ttl,
            host: OnceLock::new(),
            location: Mutex::new(None),
        }
    }

    fn host(&self) -> &HostFacts {
        self.host.get_or_init(|| HostFacts {
            system_id: probe_system_id(),
            mac_address: probe_mac_address().unwrap_or_else(|| UNKNOWN.to_string()),
            serial_number: probe_serial_number().unwrap_or_else(|| UNKNOWN.to_string()),
        })
    }

    fn lookup(&self, service: GeoService) -> Option<Location> {
        let response = match self.http.get(service.url()).call() {
            Ok(response) => response,
            Err(e) => {
                debug!(service = service.url(), error = %e, "geolocation request failed");
                return None;
            }
        };
        let body: Value = match response.into_body().read_json() {
            Ok(body) => body,
            Err(e) => {
                debug!(service = service.url(), error = %e, "geolocation answer unreadable");
                return None;
            }
        };
        let location = service.parse(&body);
        if location.is_none() {
            debug!(service = service.url(), "geolocation answer incomplete");
        }
        location
    }

    fn resolve_location(&self) -> Location {
        GeoService::CHAIN
            .iter()
            .find_map(|&service| self.lookup(service))
            .unwrap_or_else(|| {
                debug!("all geolocation services failed");
                unknown_location()
            })
    }
}

impl IdentityProvider for SystemIdentity {
    fn system_id(&self) -> String {
        self.host().system_id.clone()
    }

    fn username(&self) -> String {
        current_username()
    }

    fn mac_address(&self) -> String {
        self.host().mac_address.clone()
    }

    fn serial_number(&self) -> String {
        self.host().serial_number.clone()
    }

    fn geolocation(&self) -> Location {
        if let Some((at, location)) = self.location.lock().as_ref() {
            if at.elapsed() < self.location_ttl {
                return location.clone();
            }
        }

        // resolved without the lock held; ticks are serialized anyway
        let location = self.resolve_location();
        *self.location.lock() = Some((Instant::now(), location.clone()));
        location
    }
}

/// First 12 hex characters of SHA-256 over `parts` joined by `|`.
pub fn fingerprint(parts: &[&str]) -> String {
    let digest = Sha256::digest(parts.join("|").as_bytes());
    digest
        .iter()
        .take(6)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn probe_system_id() -> String {
    use sysinfo::System;

    let mut sys = System::new();
    sys.refresh_cpu_all();
    sys.refresh_memory();

    let hostname = System::host_name().unwrap_or_else(|| UNKNOWN.to_string());
    let cpu = sys
        .cpus()
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let memory = sys.total_memory().to_string();

    fingerprint(&[
        &hostname,
        std::env::consts::OS,
        std::env::consts::ARCH,
        &cpu,
        &memory,
    ])
}

fn probe_mac_address() -> Option<String> {
    let networks = sysinfo::Networks::new_with_refreshed_list();
    let mut interfaces: Vec<_> = networks
        .list()
        .iter()
        .filter(|(name, _)| !name.starts_with("lo"))
        .filter(|(_, data)| !data.mac_address().is_unspecified())
        .collect();
    interfaces.sort_by(|a, b| a.0.cmp(b.0));

    let found = interfaces
        .first()
        .map(|(_, data)| data.mac_address().to_string());
    if found.is_none() {
        debug!("no interface with a hardware address");
    }
    found
}

/// Returns `raw` trimmed, unless it is empty or a firmware placeholder.
pub fn clean_serial(raw: &str) -> Option<String> {
    let serial = raw.trim();
    if serial.is_empty() || SERIAL_PLACEHOLDERS.iter().any(|p| p.eq_ignore_ascii_case(serial)) {
        None
    } else {
        Some(serial.to_string())
    }
}

#[cfg(target_os = "linux")]
fn probe_serial_number() -> Option<String> {
    const SOURCES: &[&str] = &[
        "/sys/class/dmi/id/product_serial",
        "/sys/class/dmi/id/board_serial",
        "/sys/class/dmi/id/chassis_serial",
    ];
    let serial = SOURCES.iter().find_map(|path| match std::fs::read_to_string(path) {
        Ok(raw) => clean_serial(&raw),
        Err(e) => {
            debug!(path, error = %e, "serial source unreadable");
            None
        }
    });
    if serial.is_none() {
        debug!("no usable serial number");
    }
    serial
}

#[cfg(target_os = "windows")]
fn probe_serial_number() -> Option<String> {
    const COMMANDS: &[(&str, &[&str])] = &[
        ("wmic", &["bios", "get", "serialnumber"]),
        ("wmic", &["csproduct", "get", "identifyingnumber"]),
    ];
    COMMANDS.iter().find_map(|(program, args)| {
        let output = std::process::Command::new(program).args(*args).output().ok()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        // first line is the column header
        stdout.lines().skip(1).find_map(clean_serial)
    })
}

#[cfg(target_os = "macos")]
fn probe_serial_number() -> Option<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-c", "IOPlatformExpertDevice", "-d", "2"])
        .output()
        .ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find(|line| line.contains("IOPlatformSerialNumber"))
        .and_then(|line| line.rsplit('"').nth(1))
        .and_then(clean_serial)
}

#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
fn probe_serial_number() -> Option<String> {
    None
}

/// `USERNAME`, then `USER`, then [`UNKNOWN`].
fn current_username() -> String {
    ["USERNAME", "USER"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}
