//! Fixed-layout on-disk encoding of [`AccessPointRecord`].
//!
//! The original stores AP records as a packed C struct (`ifscand.h`'s
//! `struct ap`) copied byte-for-byte into NDBM. We keep the same idea: a
//! `#[repr(C)]` raw struct with only fixed-size fields, reinterpreted via
//! `bytemuck` instead of `memcpy`. Native endianness is acceptable — the
//! store is never shared across machines, only across local processes.

use crate::error::StoreError;
use crate::model::{
    AccessPointRecord, AuthMode, Ipv4Policy, Ipv6Policy, MacAddr, ObservedApInfoSerde,
    StationMacPolicy,
};
use bytemuck::{Pod, Zeroable};
use std::net::{Ipv4Addr, Ipv6Addr};

const SSID_BUF: usize = 32;
const KEY_BUF: usize = 128;

const FLAG_PINNED_BSSID: u32 = 1 << 0;
const FLAG_IPV4_STATIC: u32 = 1 << 1;
const FLAG_IPV4_DHCP: u32 = 1 << 2;
const FLAG_IPV4_GATEWAY: u32 = 1 << 3;
const FLAG_IPV6_STATIC: u32 = 1 << 4;
const FLAG_IPV6_GATEWAY: u32 = 1 << 5;

const AUTH_NONE: u32 = 0;
const AUTH_WEP: u32 = 1;
const AUTH_WPA: u32 = 2;

const MAC_DEFAULT: u32 = 0;
const MAC_FIXED: u32 = 1;
const MAC_RANDOM_OUI: u32 = 2;

/// Raw on-disk layout. Every field is either a `u32` or a fixed byte array,
/// so the struct has no implicit padding and is safely `Pod`.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct RawRecord {
    flags: u32,
    auth_mode: u32,
    mac_policy: u32,
    ssid_len: u32,
    ssid: [u8; SSID_BUF],
    key_len: u32,
    key: [u8; KEY_BUF],
    pinned_bssid: [u8; 6],
    fixed_station_mac: [u8; 6],
    ipv4_addr: [u8; 4],
    ipv4_mask: [u8; 4],
    ipv4_gw: [u8; 4],
    ipv6_addr: [u8; 16],
    ipv6_mask: [u8; 16],
    ipv6_gw: [u8; 16],
}

pub fn encode(record: &AccessPointRecord) -> Result<Vec<u8>, StoreError> {
    if record.ssid.len() > SSID_BUF {
        return Err(StoreError::InvalidRecord(format!(
            "ssid {:?} exceeds on-disk limit of {SSID_BUF} bytes",
            record.ssid
        )));
    }
    if record.key.len() > KEY_BUF {
        return Err(StoreError::InvalidRecord(format!(
            "key for ssid {:?} exceeds on-disk limit of {KEY_BUF} bytes",
            record.ssid
        )));
    }

    let mut raw = RawRecord::zeroed();

    raw.ssid_len = record.ssid.len() as u32;
    raw.ssid[..record.ssid.len()].copy_from_slice(record.ssid.as_bytes());

    raw.key_len = record.key.len() as u32;
    raw.key[..record.key.len()].copy_from_slice(&record.key);

    raw.auth_mode = match record.auth_mode {
        AuthMode::None => AUTH_NONE,
        AuthMode::Wep => AUTH_WEP,
        AuthMode::Wpa => AUTH_WPA,
    };

    match record.station_mac_policy {
        StationMacPolicy::Default => raw.mac_policy = MAC_DEFAULT,
        StationMacPolicy::Fixed(mac) => {
            raw.mac_policy = MAC_FIXED;
            raw.fixed_station_mac = mac.0;
        }
        StationMacPolicy::RandomOui => raw.mac_policy = MAC_RANDOM_OUI,
    }

    if let Some(bssid) = record.pinned_bssid {
        raw.flags |= FLAG_PINNED_BSSID;
        raw.pinned_bssid = bssid.0;
    }

    match &record.ipv4_policy {
        Ipv4Policy::None => {}
        Ipv4Policy::Dhcp => raw.flags |= FLAG_IPV4_DHCP,
        Ipv4Policy::Static { addr, mask, gateway } => {
            raw.flags |= FLAG_IPV4_STATIC;
            raw.ipv4_addr = addr.octets();
            raw.ipv4_mask = mask.octets();
            if let Some(gw) = gateway {
                raw.flags |= FLAG_IPV4_GATEWAY;
                raw.ipv4_gw = gw.octets();
            }
        }
    }

    match &record.ipv6_policy {
        Ipv6Policy::None => {}
        Ipv6Policy::Static { addr, mask, gateway } => {
            raw.flags |= FLAG_IPV6_STATIC;
            raw.ipv6_addr = addr.octets();
            raw.ipv6_mask = mask.octets();
            if let Some(gw) = gateway {
                raw.flags |= FLAG_IPV6_GATEWAY;
                raw.ipv6_gw = gw.octets();
            }
        }
    }

    Ok(bytemuck::bytes_of(&raw).to_vec())
}

pub fn decode(ssid_hint: &str, bytes: &[u8]) -> Result<AccessPointRecord, StoreError> {
    let raw: &RawRecord = bytemuck::try_from_bytes(bytes)
        .map_err(|_| StoreError::CorruptRecord(ssid_hint.to_string()))?;

    let ssid_len = raw.ssid_len as usize;
    if ssid_len > SSID_BUF {
        return Err(StoreError::CorruptRecord(ssid_hint.to_string()));
    }
    let ssid = std::str::from_utf8(&raw.ssid[..ssid_len])
        .map_err(|_| StoreError::CorruptRecord(ssid_hint.to_string()))?
        .to_string();

    let key_len = raw.key_len as usize;
    if key_len > KEY_BUF {
        return Err(StoreError::CorruptRecord(ssid_hint.to_string()));
    }
    let key = raw.key[..key_len].to_vec();

    let auth_mode = match raw.auth_mode {
        AUTH_NONE => AuthMode::None,
        AUTH_WEP => AuthMode::Wep,
        AUTH_WPA => AuthMode::Wpa,
        _ => return Err(StoreError::CorruptRecord(ssid_hint.to_string())),
    };

    let station_mac_policy = match raw.mac_policy {
        MAC_DEFAULT => StationMacPolicy::Default,
        MAC_FIXED => StationMacPolicy::Fixed(MacAddr(raw.fixed_station_mac)),
        MAC_RANDOM_OUI => StationMacPolicy::RandomOui,
        _ => return Err(StoreError::CorruptRecord(ssid_hint.to_string())),
    };

    let pinned_bssid = (raw.flags & FLAG_PINNED_BSSID != 0).then_some(MacAddr(raw.pinned_bssid));

    let ipv4_policy = if raw.flags & FLAG_IPV4_STATIC != 0 {
        let gateway = (raw.flags & FLAG_IPV4_GATEWAY != 0).then(|| Ipv4Addr::from(raw.ipv4_gw));
        Ipv4Policy::Static {
            addr: Ipv4Addr::from(raw.ipv4_addr),
            mask: Ipv4Addr::from(raw.ipv4_mask),
            gateway,
        }
    } else if raw.flags & FLAG_IPV4_DHCP != 0 {
        Ipv4Policy::Dhcp
    } else {
        Ipv4Policy::None
    };

    let ipv6_policy = if raw.flags & FLAG_IPV6_STATIC != 0 {
        let gateway = (raw.flags & FLAG_IPV6_GATEWAY != 0).then(|| Ipv6Addr::from(raw.ipv6_gw));
        Ipv6Policy::Static {
            addr: Ipv6Addr::from(raw.ipv6_addr),
            mask: Ipv6Addr::from(raw.ipv6_mask),
            gateway,
        }
    } else {
        Ipv6Policy::None
    };

    Ok(AccessPointRecord {
        ssid,
        auth_mode,
        key,
        pinned_bssid,
        station_mac_policy,
        ipv4_policy,
        ipv6_policy,
        observed: ObservedApInfoSerde(None),
    })
}
