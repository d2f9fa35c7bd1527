//! Preference-ordered ranking of scan results against known records.
//!
//! Grounded in `original_source/ifscand/db.c`'s `db_filter_ap`: for each
//! scanned node, look up the matching `ap.<ssid>` record; reject pinned-BSSID
//! mismatches with a warning; stamp the transient observed fields onto a copy
//! of the record; then reorder so every SSID named in `ap_order` leads, in
//! that order, followed by whatever else matched in scan order.

use crate::model::{AccessPointRecord, ObservedApInfo, ObservedApInfoSerde, ScannedNode};
use log::warn;

/// Filters `scanned` down to nodes whose SSID has a known record (and whose
/// BSSID doesn't contradict a pinned one), stamps the transient observed
/// fields, and orders the result per `ap_order` with scan-order fallback.
pub fn filter_and_rank(
    scanned: &[ScannedNode],
    known: &[AccessPointRecord],
    ap_order: &[String],
) -> Vec<AccessPointRecord> {
    let matched = match_and_stamp(scanned, known);

    let mut used = vec![false; matched.len()];
    let mut out = Vec::with_capacity(matched.len());

    for wanted_ssid in ap_order {
        for (idx, rec) in matched.iter().enumerate() {
            if !used[idx] && &rec.ssid == wanted_ssid {
                used[idx] = true;
                out.push(rec.clone());
            }
        }
    }

    for (idx, rec) in matched.into_iter().enumerate() {
        if !used[idx] {
            out.push(rec);
        }
    }

    out
}

/// Matches each scanned node against the known catalog, dropping BSSID
/// mismatches for pinned records and stamping the survivors' transient
/// observed-AP fields. Preserves scan order.
fn match_and_stamp(scanned: &[ScannedNode], known: &[AccessPointRecord]) -> Vec<AccessPointRecord> {
    let mut out = Vec::new();

    for node in scanned {
        let Some(record) = known.iter().find(|r| r.ssid == node.ssid) else {
            continue;
        };

        if let Some(pinned) = record.pinned_bssid {
            if pinned != node.bssid {
                warn!(
                    "AP {}: BSSID mismatch; expected {pinned}, saw {}",
                    record.ssid, node.bssid
                );
                continue;
            }
        }

        let mut stamped = record.clone();
        stamped.observed = ObservedApInfoSerde(Some(ObservedApInfo {
            bssid: Some(node.bssid),
            rssi: node.rssi,
            max_rssi: node.max_rssi,
            last_seen_unix: crate::model::now_unix(),
        }));
        out.push(stamped);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Capabilities, MacAddr};

    fn node(ssid: &str, bssid: &str, rssi: i32) -> ScannedNode {
        ScannedNode {
            ssid: ssid.to_string(),
            bssid: MacAddr::parse(bssid).unwrap(),
            channel: 6,
            rssi,
            max_rssi: 100,
            capabilities: Capabilities::default(),
        }
    }

    #[test]
    fn honors_ap_order_before_scan_order() {
        let scanned = vec![
            node("b", "00:00:00:00:00:01", 10),
            node("a", "00:00:00:00:00:02", 20),
            node("c", "00:00:00:00:00:03", 5),
        ];
        let known = vec![
            AccessPointRecord::new("a"),
            AccessPointRecord::new("b"),
            AccessPointRecord::new("c"),
        ];
        let order = vec!["c".to_string(), "a".to_string()];

        let ranked = filter_and_rank(&scanned, &known, &order);
        let ssids: Vec<&str> = ranked.iter().map(|r| r.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["c", "a", "b"]);
    }

    #[test]
    fn drops_unknown_ssids() {
        let scanned = vec![
            node("unknown", "00:00:00:00:00:01", 10),
            node("a", "00:00:00:00:00:02", 20),
        ];
        let known = vec![AccessPointRecord::new("a")];

        let ranked = filter_and_rank(&scanned, &known, &[]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].ssid, "a");
    }

    #[test]
    fn empty_ap_order_falls_back_to_scan_order() {
        let scanned = vec![
            node("b", "00:00:00:00:00:01", 10),
            node("a", "00:00:00:00:00:02", 20),
        ];
        let known = vec![AccessPointRecord::new("a"), AccessPointRecord::new("b")];

        let ranked = filter_and_rank(&scanned, &known, &[]);
        let ssids: Vec<&str> = ranked.iter().map(|r| r.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["b", "a"]);
    }

    #[test]
    fn rejects_pinned_bssid_mismatch() {
        let scanned = vec![node("office", "77:77:77:77:77:77", -40)];
        let mut rec = AccessPointRecord::new("office");
        rec.pinned_bssid = MacAddr::parse("11:22:33:44:55:66");
        let known = vec![rec];

        let ranked = filter_and_rank(&scanned, &known, &[]);
        assert!(ranked.is_empty());
    }

    #[test]
    fn accepts_pinned_bssid_that_matches() {
        let scanned = vec![node("office", "11:22:33:44:55:66", -40)];
        let mut rec = AccessPointRecord::new("office");
        rec.pinned_bssid = MacAddr::parse("11:22:33:44:55:66");
        let known = vec![rec];

        let ranked = filter_and_rank(&scanned, &known, &[]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(
            ranked[0].observed.0.as_ref().unwrap().bssid,
            MacAddr::parse("11:22:33:44:55:66")
        );
    }

    #[test]
    fn stamps_observed_rssi_onto_the_matched_copy() {
        let scanned = vec![node("a", "00:00:00:00:00:02", -55)];
        let known = vec![AccessPointRecord::new("a")];

        let ranked = filter_and_rank(&scanned, &known, &[]);
        assert_eq!(ranked[0].observed.0.as_ref().unwrap().rssi, -55);
    }
}
