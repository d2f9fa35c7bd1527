//! Command parsing and the textual AP-record format shared by `add` and
//! `list`.
//!
//! Grounded in `original_source/ifscand/cmds.c`'s `Commands`/`Add_kw` tables
//! and their `parse_in4mask`/`parse_in6mask`/`parse_mac` keyword parsers.

use crate::error::ControlError;
use crate::model::{AccessPointRecord, AuthMode, Ipv4Policy, Ipv6Policy, MacAddr, StationMacPolicy};
use std::net::{Ipv4Addr, Ipv6Addr};

const MAX_ADD_ARGS: usize = 16;

#[derive(Debug, PartialEq, Eq)]
pub enum GetKey {
    All,
    RandMac,
    ApOrder,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Add(AccessPointRecord),
    Del(String),
    List { json: bool },
    Scan { json: bool },
    SetRandMac(bool),
    SetApOrder(Vec<String>),
    Get(GetKey),
    Down,
}

pub fn parse(tokens: &[String]) -> Result<Command, ControlError> {
    let (name, args) = tokens
        .split_first()
        .ok_or_else(|| ControlError::BadCommand("empty command".into()))?;

    match name.as_str() {
        "add" => parse_add(args).map(Command::Add),
        "del" => {
            let ssid = args
                .first()
                .ok_or_else(|| ControlError::BadCommand("insufficient arguments to 'del'".into()))?;
            Ok(Command::Del(ssid.clone()))
        }
        "list" => parse_json_flag(args, "list").map(|json| Command::List { json }),
        "scan" => parse_json_flag(args, "scan").map(|json| Command::Scan { json }),
        "down" => Ok(Command::Down),
        "set" => parse_set(args),
        "get" => parse_get(args),
        other => Err(ControlError::BadCommand(format!("unknown command {other}"))),
    }
}

fn parse_json_flag(args: &[String], cmd: &str) -> Result<bool, ControlError> {
    match args {
        [] => Ok(false),
        [only] if only == "json" => Ok(true),
        [only] => Err(ControlError::BadCommand(format!("unknown format {only} for '{cmd}'"))),
        _ => Err(ControlError::BadCommand(format!("too many arguments to '{cmd}'"))),
    }
}

fn parse_set(args: &[String]) -> Result<Command, ControlError> {
    let (sub, rest) = args
        .split_first()
        .ok_or_else(|| ControlError::BadCommand("insufficient arguments to 'set'".into()))?;

    match sub.as_str() {
        "randmac" => {
            let val = rest
                .first()
                .ok_or_else(|| ControlError::BadCommand("insufficient arguments to 'set randmac'".into()))?;
            Ok(Command::SetRandMac(parse_bool(val)?))
        }
        "ap-order" => {
            if rest.is_empty() {
                return Err(ControlError::BadCommand("insufficient arguments to 'ap-order'".into()));
            }
            Ok(Command::SetApOrder(rest.to_vec()))
        }
        other => Err(ControlError::BadCommand(format!("unknown 'set {other}'"))),
    }
}

fn parse_get(args: &[String]) -> Result<Command, ControlError> {
    let key = args
        .first()
        .ok_or_else(|| ControlError::BadCommand("too few arguments to 'get'".into()))?;
    match key.as_str() {
        "all" => Ok(Command::Get(GetKey::All)),
        "randmac" => Ok(Command::Get(GetKey::RandMac)),
        "ap-order" => Ok(Command::Get(GetKey::ApOrder)),
        other => Err(ControlError::BadCommand(format!("unknown get subcommand '{other}'"))),
    }
}

fn parse_bool(s: &str) -> Result<bool, ControlError> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(ControlError::BadCommand(format!("unknown boolean value '{other}'"))),
    }
}

/// `add nwid AP [lladdr MAC|random] [wpakey KEY | nwkey KEY] [bssid MAC]
/// [inet dhcp|IP/MASK] [gw IP] [inet6 IP6/MASK6] [gw6 IP]`
fn parse_add(args: &[String]) -> Result<AccessPointRecord, ControlError> {
    if args.is_empty() {
        return Err(ControlError::BadCommand("insufficient arguments to 'add'".into()));
    }
    if args.len() > MAX_ADD_ARGS {
        return Err(ControlError::BadCommand("too many arguments to 'add'".into()));
    }
    if args.len() % 2 != 0 {
        return Err(ControlError::BadCommand("incomplete arguments to 'add'".into()));
    }

    let mut ssid: Option<String> = None;
    let mut station_mac_policy = StationMacPolicy::Default;
    let mut auth_mode = AuthMode::None;
    let mut key = Vec::new();
    let mut pinned_bssid = None;
    let mut ipv4_policy = Ipv4Policy::None;
    let mut ipv6_policy = Ipv6Policy::None;
    let mut gw4: Option<Ipv4Addr> = None;
    let mut gw6: Option<Ipv6Addr> = None;
    let mut saw_wep = false;
    let mut saw_wpa = false;

    for pair in args.chunks(2) {
        let (kw, val) = (pair[0].as_str(), pair[1].as_str());
        match kw {
            "nwid" => ssid = Some(val.to_string()),
            "lladdr" => {
                station_mac_policy = if val == "random" {
                    StationMacPolicy::RandomOui
                } else {
                    let mac = MacAddr::parse(val)
                        .ok_or_else(|| ControlError::BadCommand(format!("malformed value {val} for lladdr in 'add'")))?;
                    StationMacPolicy::Fixed(mac)
                };
            }
            "wpakey" => {
                auth_mode = AuthMode::Wpa;
                key = val.as_bytes().to_vec();
                saw_wpa = true;
            }
            "nwkey" => {
                auth_mode = AuthMode::Wep;
                key = val.as_bytes().to_vec();
                saw_wep = true;
            }
            "bssid" => {
                pinned_bssid = Some(
                    MacAddr::parse(val)
                        .ok_or_else(|| ControlError::BadCommand(format!("malformed value {val} for bssid in 'add'")))?,
                );
            }
            "inet" => {
                ipv4_policy = if val == "dhcp" {
                    Ipv4Policy::Dhcp
                } else {
                    let (addr, mask) = parse_ipv4_addr_mask(val)?;
                    Ipv4Policy::Static { addr, mask, gateway: None }
                };
            }
            "inet6" => {
                let (addr, mask) = parse_ipv6_addr_mask(val)?;
                ipv6_policy = Ipv6Policy::Static { addr, mask, gateway: None };
            }
            "gw" => {
                gw4 = Some(
                    val.parse()
                        .map_err(|_| ControlError::BadCommand(format!("malformed value {val} for gw in 'add'")))?,
                );
            }
            "gw6" => {
                gw6 = Some(
                    val.parse()
                        .map_err(|_| ControlError::BadCommand(format!("malformed value {val} for gw6 in 'add'")))?,
                );
            }
            other => return Err(ControlError::BadCommand(format!("unknown keyword {other} in 'add'"))),
        }
    }

    let ssid = ssid.ok_or_else(|| ControlError::BadCommand("missing AP name".into()))?;
    if saw_wep && saw_wpa {
        return Err(ControlError::BadCommand("only one of WPA or WEP is needed".into()));
    }

    if let Some(gw) = gw4 {
        match &mut ipv4_policy {
            Ipv4Policy::Static { gateway, .. } => *gateway = Some(gw),
            _ => return Err(ControlError::BadCommand("default-gateway needs an IPv4 address/mask".into())),
        }
    }
    if let Some(gw) = gw6 {
        match &mut ipv6_policy {
            Ipv6Policy::Static { gateway, .. } => *gateway = Some(gw),
            _ => return Err(ControlError::BadCommand("default-gateway needs IPv6 address/mask".into())),
        }
    }

    let mut record = AccessPointRecord::new(ssid);
    record.auth_mode = auth_mode;
    record.key = key;
    record.pinned_bssid = pinned_bssid;
    record.station_mac_policy = station_mac_policy;
    record.ipv4_policy = ipv4_policy;
    record.ipv6_policy = ipv6_policy;
    record.validate().map_err(ControlError::BadCommand)?;
    Ok(record)
}

fn parse_ipv4_addr_mask(s: &str) -> Result<(Ipv4Addr, Ipv4Addr), ControlError> {
    let bad = || ControlError::BadCommand(format!("malformed value {s} for inet in 'add'"));
    match s.split_once('/') {
        Some((addr, mask)) => {
            let addr: Ipv4Addr = addr.parse().map_err(|_| bad())?;
            let mask = mask.parse::<Ipv4Addr>().or_else(|_| {
                mask.parse::<u32>()
                    .ok()
                    .filter(|v| *v <= 32)
                    .map(ipv4_mask_from_prefix)
                    .ok_or_else(bad)
            })?;
            Ok((addr, mask))
        }
        None => {
            let addr: Ipv4Addr = s.parse().map_err(|_| bad())?;
            Ok((addr, Ipv4Addr::new(255, 255, 255, 255)))
        }
    }
}

fn parse_ipv6_addr_mask(s: &str) -> Result<(Ipv6Addr, Ipv6Addr), ControlError> {
    let bad = || ControlError::BadCommand(format!("malformed value {s} for inet6 in 'add'"));
    match s.split_once('/') {
        Some((addr, mask)) => {
            let addr: Ipv6Addr = addr.parse().map_err(|_| bad())?;
            let mask = mask.parse::<Ipv6Addr>().or_else(|_| {
                mask.parse::<u32>()
                    .ok()
                    .filter(|v| *v <= 128)
                    .map(ipv6_mask_from_prefix)
                    .ok_or_else(bad)
            })?;
            Ok((addr, mask))
        }
        None => {
            let addr: Ipv6Addr = s.parse().map_err(|_| bad())?;
            Ok((addr, ipv6_mask_from_prefix(128)))
        }
    }
}

fn ipv4_mask_from_prefix(prefix: u32) -> Ipv4Addr {
    let bits: u32 = if prefix == 0 { 0 } else { !((1u32 << (32 - prefix)) - 1) };
    Ipv4Addr::from(bits)
}

fn ipv6_mask_from_prefix(prefix: u32) -> Ipv6Addr {
    let mut bytes = [0u8; 16];
    let mut remaining = prefix;
    for byte in bytes.iter_mut() {
        if remaining >= 8 {
            *byte = 0xff;
            remaining -= 8;
        } else if remaining > 0 {
            *byte = 0xff_u8 << (8 - remaining);
            remaining = 0;
        } else {
            break;
        }
    }
    Ipv6Addr::from(bytes)
}

/// Renders a record in the same keyword-value form `add` accepts, omitting
/// the leading `add` keyword (the caller prefixes it if needed).
pub fn format_record_line(record: &AccessPointRecord) -> String {
    let mut parts = vec![format!("nwid {}", record.ssid)];

    match record.station_mac_policy {
        StationMacPolicy::Default => {}
        StationMacPolicy::Fixed(mac) => parts.push(format!("lladdr {mac}")),
        StationMacPolicy::RandomOui => parts.push("lladdr random".to_string()),
    }

    match record.auth_mode {
        AuthMode::None => {}
        AuthMode::Wep => parts.push(format!("nwkey {}", key_to_string(&record.key))),
        AuthMode::Wpa => parts.push(format!("wpakey {}", key_to_string(&record.key))),
    }

    if let Some(bssid) = record.pinned_bssid {
        parts.push(format!("bssid {bssid}"));
    }

    match &record.ipv4_policy {
        Ipv4Policy::None => {}
        Ipv4Policy::Dhcp => parts.push("inet dhcp".to_string()),
        Ipv4Policy::Static { addr, mask, gateway } => {
            parts.push(format!("inet {addr}/{mask}"));
            if let Some(gw) = gateway {
                parts.push(format!("gw {gw}"));
            }
        }
    }

    match &record.ipv6_policy {
        Ipv6Policy::None => {}
        Ipv6Policy::Static { addr, mask, gateway } => {
            parts.push(format!("inet6 {addr}/{mask}"));
            if let Some(gw) = gateway {
                parts.push(format!("gw6 {gw}"));
            }
        }
    }

    parts.join(" ")
}

fn key_to_string(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) if !s.is_empty() => s.to_string(),
        _ => hex::encode(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::tokenizer::tokenize;

    fn toks(line: &str) -> Vec<String> {
        tokenize(line).unwrap()
    }

    #[test]
    fn parses_minimal_add() {
        let cmd = parse(&toks("add nwid homenet")).unwrap();
        match cmd {
            Command::Add(rec) => assert_eq!(rec.ssid, "homenet"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rejects_both_wep_and_wpa() {
        let err = parse(&toks("add nwid homenet wpakey longpassword123 nwkey abcde")).unwrap_err();
        assert!(matches!(err, ControlError::BadCommand(_)));
    }

    #[test]
    fn gw_without_static_v4_is_an_error() {
        let err = parse(&toks("add nwid homenet gw 10.0.0.1")).unwrap_err();
        assert!(matches!(err, ControlError::BadCommand(_)));
    }

    #[test]
    fn parses_static_v4_with_prefix_len_mask_and_gateway() {
        let cmd = parse(&toks("add nwid homenet inet 10.0.0.5/24 gw 10.0.0.1")).unwrap();
        let Command::Add(rec) = cmd else { panic!() };
        match rec.ipv4_policy {
            Ipv4Policy::Static { addr, mask, gateway } => {
                assert_eq!(addr, Ipv4Addr::new(10, 0, 0, 5));
                assert_eq!(mask, Ipv4Addr::new(255, 255, 255, 0));
                assert_eq!(gateway, Some(Ipv4Addr::new(10, 0, 0, 1)));
            }
            _ => panic!("expected static policy"),
        }
    }

    #[test]
    fn format_record_line_round_trips_through_add() {
        let mut rec = AccessPointRecord::new("office");
        rec.auth_mode = AuthMode::Wpa;
        rec.key = b"correcthorsebatterystaple".to_vec();
        rec.ipv4_policy = Ipv4Policy::Static {
            addr: Ipv4Addr::new(192, 168, 1, 10),
            mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Some(Ipv4Addr::new(192, 168, 1, 1)),
        };

        let line = format_record_line(&rec);
        let add_line = format!("add {line}");
        let reparsed = parse(&toks(&add_line)).unwrap();
        match reparsed {
            Command::Add(rec2) => assert_eq!(rec, rec2),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn list_and_scan_accept_json_flag() {
        assert_eq!(parse(&toks("list json")).unwrap(), Command::List { json: true });
        assert_eq!(parse(&toks("scan")).unwrap(), Command::Scan { json: false });
    }

    #[test]
    fn set_randmac_parses_boolean_spellings() {
        assert_eq!(parse(&toks("set randmac yes")).unwrap(), Command::SetRandMac(true));
        assert_eq!(parse(&toks("set randmac 0")).unwrap(), Command::SetRandMac(false));
    }

    #[test]
    fn accepts_a_fully_specified_add_with_all_eight_keyword_pairs() {
        let line = concat!(
            "add nwid homenet lladdr random wpakey correcthorsebatterystaple ",
            "bssid aa:bb:cc:dd:ee:ff inet 10.0.0.5/24 gw 10.0.0.1 ",
            "inet6 fe80::1/64 gw6 fe80::fe"
        );
        let cmd = parse(&toks(line)).unwrap();
        assert!(matches!(cmd, Command::Add(_)));
    }
}
