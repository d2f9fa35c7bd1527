//! Data model: [`AccessPointRecord`], [`GlobalPreferences`], [`ScannedNode`]
//! and the small value types they're built from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::SystemTime;

pub const SSID_MAX_LEN: usize = 32;

/// 6-byte hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    pub fn parse(s: &str) -> Option<MacAddr> {
        let mut out = [0u8; 6];
        let mut parts = s.split(':');
        for slot in out.iter_mut() {
            let part = parts.next()?;
            if part.len() != 2 {
                return None;
            }
            *slot = u8::from_str_radix(part, 16).ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(MacAddr(out))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Authentication mode an [`AccessPointRecord`] expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMode {
    None,
    Wep,
    Wpa,
}

/// MAC address policy this station presents when joining a given AP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationMacPolicy {
    Default,
    Fixed(MacAddr),
    RandomOui,
}

/// IPv4 addressing policy for an AP record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ipv4Policy {
    None,
    Dhcp,
    Static {
        addr: Ipv4Addr,
        mask: Ipv4Addr,
        gateway: Option<Ipv4Addr>,
    },
}

/// IPv6 addressing policy for an AP record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ipv6Policy {
    None,
    Static {
        addr: Ipv6Addr,
        mask: Ipv6Addr,
        gateway: Option<Ipv6Addr>,
    },
}

/// Observed state of an AP, stamped onto a record during a scan match.
/// Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObservedApInfo {
    pub bssid: Option<MacAddr>,
    pub rssi: i32,
    pub max_rssi: i32,
    pub last_seen_unix: u64,
}

/// The persistent record for one named access point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPointRecord {
    pub ssid: String,
    pub auth_mode: AuthMode,
    pub key: Vec<u8>,
    pub pinned_bssid: Option<MacAddr>,
    pub station_mac_policy: StationMacPolicy,
    pub ipv4_policy: Ipv4Policy,
    pub ipv6_policy: Ipv6Policy,

    #[serde(skip)]
    pub observed: ObservedApInfoSerde,
}

/// `ObservedApInfo` isn't `Eq`/serde-friendly because of the rssi ints being
/// transient scratch; keep it as a thin wrapper so `AccessPointRecord` can
/// still derive the traits it needs for store round-trips.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObservedApInfoSerde(pub Option<ObservedApInfo>);

impl AccessPointRecord {
    pub fn new(ssid: impl Into<String>) -> AccessPointRecord {
        AccessPointRecord {
            ssid: ssid.into(),
            auth_mode: AuthMode::None,
            key: Vec::new(),
            pinned_bssid: None,
            station_mac_policy: StationMacPolicy::Default,
            ipv4_policy: Ipv4Policy::None,
            ipv6_policy: Ipv6Policy::None,
            observed: ObservedApInfoSerde(None),
        }
    }

    /// Validates the invariants from the data model: non-empty/short SSID,
    /// gateway implies address+mask, and key length per auth mode.
    pub fn validate(&self) -> Result<(), String> {
        if self.ssid.is_empty() {
            return Err("ssid must not be empty".into());
        }
        if self.ssid.len() > SSID_MAX_LEN {
            return Err(format!("ssid exceeds {SSID_MAX_LEN} bytes"));
        }
        match self.auth_mode {
            AuthMode::None => {}
            AuthMode::Wep => validate_wep_key(&self.key)?,
            AuthMode::Wpa => validate_wpa_key(&self.key)?,
        }
        Ok(())
    }
}

fn validate_wep_key(key: &[u8]) -> Result<(), String> {
    if key.iter().any(|&b| b == b',') {
        let parts: Vec<&[u8]> = key.split(|&b| b == b',').collect();
        if parts.len() != 4 {
            return Err("comma-separated WEP key form requires exactly 4 keys".into());
        }
        for part in parts {
            validate_wep_single(part)?;
        }
        return Ok(());
    }
    validate_wep_single(key)
}

fn validate_wep_single(key: &[u8]) -> Result<(), String> {
    let key = key
        .strip_prefix(b"0x")
        .or_else(|| key.strip_prefix(b"0X"))
        .unwrap_or(key);
    match key.len() {
        5 | 13 => Ok(()),
        10 | 26 if key.iter().all(u8::is_ascii_hexdigit) => Ok(()),
        _ => Err("WEP key must be 5/13 ASCII bytes or 10/26 hex digits".into()),
    }
}

fn validate_wpa_key(key: &[u8]) -> Result<(), String> {
    if key.len() == 64 && key.iter().all(u8::is_ascii_hexdigit) {
        return Ok(());
    }
    if (8..=63).contains(&key.len()) {
        return Ok(());
    }
    Err("WPA key must be an 8-63 byte passphrase or a 64-hex-digit raw PSK".into())
}

/// Per-interface global preferences.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalPreferences {
    pub randomize_mac: bool,
    pub ap_order: Vec<String>,
    pub scan_interval_sec: u32,
    pub rssi_scan_interval_sec: u32,
}

impl Default for GlobalPreferences {
    fn default() -> Self {
        GlobalPreferences {
            randomize_mac: false,
            ap_order: Vec::new(),
            scan_interval_sec: 60,
            rssi_scan_interval_sec: 10,
        }
    }
}

/// Wireless capability bits reported by a scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub ess: bool,
    pub ibss: bool,
    pub privacy: bool,
}

/// One AP observation from a single scan. Short-lived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedNode {
    pub ssid: String,
    pub bssid: MacAddr,
    pub channel: u8,
    pub rssi: i32,
    pub max_rssi: i32,
    pub capabilities: Capabilities,
}

impl ScannedNode {
    /// Normalized RSSI: `rssi * 100 / max_rssi` when `max_rssi > 0`, else raw `rssi`.
    pub fn normalized_rssi(&self) -> i32 {
        if self.max_rssi > 0 {
            self.rssi * 100 / self.max_rssi
        } else {
            self.rssi
        }
    }
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wep_validation_accepts_0x_prefixed_hex_forms() {
        let mut rec = AccessPointRecord::new("office");
        rec.auth_mode = AuthMode::Wep;
        rec.key = b"0xAABBCCDDEE".to_vec();
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn wep_validation_accepts_0x_prefixed_comma_form() {
        let mut rec = AccessPointRecord::new("office");
        rec.auth_mode = AuthMode::Wep;
        rec.key = b"0xAABBCCDDEE,0x1122334455,abcde,fghij".to_vec();
        assert!(rec.validate().is_ok());
    }
}
