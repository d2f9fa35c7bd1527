//! Scan/Associate Scheduler: the central state machine that owns the
//! interface's lifecycle from Disassociated through Associated and back.
//!
//! Grounded in `original_source/ifscand/ifscand.c`'s main loop (`poll`/
//! `select` driving `ifstate_timeout`) and `scan.c`'s `ap_connect`/
//! `ap_disconnect`: this rewrite keeps the same tick ordering but expresses
//! each step as a call into one of the other components instead of inline C.

use crate::error::{DriverError, StoreError};
use crate::ipconfig::IpConfigurator;
use crate::model::{AccessPointRecord, GlobalPreferences, ObservedApInfo, StationMacPolicy};
use crate::rssi::RssiWindow;
use crate::store::{filter_and_rank, PrefStore};
use crate::wireless::{self, WirelessDriver};

const MAX_CONSECUTIVE_SCAN_ERRORS: u32 = 5;

/// `prefs.<name>` keys used by the global-preferences block (`spec.md` §4.1).
const PREF_RANDMAC: &str = "randmac";
const PREF_SCAN_INT: &str = "scan-int";
const PREF_RSSI_SCAN_INT: &str = "rssi-scan-int";

/// Reads the four global preferences out of the store, applying the
/// documented defaults to anything that comes back `None` (`spec.md` §4.1's
/// resolved Open Question: unset is distinct from an explicit zero).
pub fn load_global_preferences(store: &dyn PrefStore) -> Result<GlobalPreferences, StoreError> {
    let defaults = GlobalPreferences::default();
    let randomize_mac = match store.get_pref(PREF_RANDMAC)? {
        Some(v) => matches!(v.as_str(), "1" | "true" | "yes"),
        None => defaults.randomize_mac,
    };
    let scan_interval_sec = match store.get_pref(PREF_SCAN_INT)? {
        Some(v) => v.parse().unwrap_or(defaults.scan_interval_sec),
        None => defaults.scan_interval_sec,
    };
    let rssi_scan_interval_sec = match store.get_pref(PREF_RSSI_SCAN_INT)? {
        Some(v) => v.parse().unwrap_or(defaults.rssi_scan_interval_sec),
        None => defaults.rssi_scan_interval_sec,
    };
    let ap_order = store.get_ap_order()?;
    Ok(GlobalPreferences {
        randomize_mac,
        ap_order,
        scan_interval_sec,
        rssi_scan_interval_sec,
    })
}

pub fn save_randomize_mac(store: &dyn PrefStore, value: bool) -> Result<(), StoreError> {
    store.set_pref(PREF_RANDMAC, if value { "1" } else { "0" })
}

/// Interface state the Scheduler drives between.
#[derive(Debug)]
pub enum InterfaceState {
    Disassociated,
    Associated {
        record: AccessPointRecord,
        current_ap: ObservedApInfo,
    },
}

/// Outcome of a single tick, returned mainly so tests and the daemon's log
/// lines can observe what happened without re-deriving it from state.
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    StayAssociated,
    StayDisassociated,
    Associated { ssid: String },
    Disassociated,
    AssociationFailed,
    ScanFailed,
    AbortedTooManyScanErrors,
}

pub struct Scheduler {
    ifname: String,
    state: InterfaceState,
    rssi_window: RssiWindow,
    consecutive_scan_errors: u32,
    pub next_timeout_sec: u32,
}

impl Scheduler {
    pub fn new(ifname: impl Into<String>, initial_scan_interval_sec: u32) -> Scheduler {
        Scheduler {
            ifname: ifname.into(),
            state: InterfaceState::Disassociated,
            rssi_window: RssiWindow::new(),
            consecutive_scan_errors: 0,
            next_timeout_sec: initial_scan_interval_sec,
        }
    }

    pub fn state(&self) -> &InterfaceState {
        &self.state
    }

    pub fn is_associated(&self) -> bool {
        matches!(self.state, InterfaceState::Associated { .. })
    }

    /// Runs one tick of the algorithm in `spec.md` §4.6. Returns
    /// [`TickOutcome::AbortedTooManyScanErrors`] when the consecutive scan
    /// error counter has exhausted its budget; the caller (the daemon main
    /// loop) is expected to exit non-zero on that outcome per §7.
    pub fn tick(
        &mut self,
        driver: &mut dyn WirelessDriver,
        ip: &mut IpConfigurator,
        store: &dyn PrefStore,
        prefs: &GlobalPreferences,
    ) -> Result<TickOutcome, StoreError> {
        // Step 1: DHCP liveness check, only while associated to a DHCP AP.
        if let InterfaceState::Associated { record, .. } = &self.state {
            if matches!(record.ipv4_policy, crate::model::Ipv4Policy::Dhcp) {
                ip.check_dhcp();
            }
        }

        // Step 2: RSSI sampling against the current association.
        let mut low_rssi = false;
        if let InterfaceState::Associated { record, current_ap } = &self.state {
            match driver.get_rssi(&record.ssid, current_ap.bssid) {
                Ok(sample) => self.rssi_window.add(sample),
                Err(e) => log::warn!("rssi sample failed on {}: {e}", self.ifname),
            }
            match self.rssi_window.mean() {
                None => return Ok(TickOutcome::StayAssociated),
                Some(mean) if mean >= crate::rssi::LOW_THRESHOLD => {
                    return Ok(TickOutcome::StayAssociated)
                }
                Some(_) => low_rssi = true,
            }
        }

        // Step 3: scan, then filter/rank against the known catalog.
        let scanned = match driver.scan() {
            Ok(nodes) => {
                self.consecutive_scan_errors = 0;
                nodes
            }
            Err(e) => {
                self.consecutive_scan_errors += 1;
                log::warn!(
                    "scan failed on {} ({}/{}): {e}",
                    self.ifname,
                    self.consecutive_scan_errors,
                    MAX_CONSECUTIVE_SCAN_ERRORS
                );
                if self.consecutive_scan_errors >= MAX_CONSECUTIVE_SCAN_ERRORS {
                    return Ok(TickOutcome::AbortedTooManyScanErrors);
                }
                return Ok(TickOutcome::ScanFailed);
            }
        };

        let known = store.list_aps()?;
        let ranked = filter_and_rank(&scanned, &known, &prefs.ap_order);

        // Step 4: nothing matched.
        if ranked.is_empty() {
            if self.is_associated() {
                self.disassociate(driver, ip, prefs.scan_interval_sec);
            } else {
                self.next_timeout_sec = prefs.scan_interval_sec;
            }
            return Ok(TickOutcome::StayDisassociated);
        }

        // Step 5/6: pick the target, honoring stickiness.
        let top = &ranked[0];
        let target = if let InterfaceState::Associated { record, .. } = &self.state {
            if top.ssid == record.ssid {
                if !low_rssi || ranked.len() == 1 {
                    return Ok(TickOutcome::StayAssociated);
                }
                &ranked[1]
            } else {
                top
            }
        } else {
            top
        };

        if self.is_associated() {
            self.tear_down_current(driver, ip);
        }

        // Step 7/8: drive the association.
        Ok(self.associate_to(driver, ip, prefs, target.clone()))
    }

    fn associate_to(
        &mut self,
        driver: &mut dyn WirelessDriver,
        ip: &mut IpConfigurator,
        prefs: &GlobalPreferences,
        mut target: AccessPointRecord,
    ) -> TickOutcome {
        if prefs.randomize_mac && target.station_mac_policy == StationMacPolicy::Default {
            target.station_mac_policy = StationMacPolicy::RandomOui;
        }

        match wireless::associate(driver, &target) {
            Ok(observed) => {
                if let Err(e) = ip.apply(&target.ipv4_policy, &target.ipv6_policy) {
                    log::warn!("ip configuration failed for {}: {e}", target.ssid);
                }
                self.rssi_window.reset();
                self.rssi_window.add(observed.rssi);
                self.next_timeout_sec = prefs.rssi_scan_interval_sec;
                let ssid = target.ssid.clone();
                self.state = InterfaceState::Associated {
                    record: target,
                    current_ap: observed,
                };
                TickOutcome::Associated { ssid }
            }
            Err(DriverError::LinkNotReady) => {
                log::info!("link for {} never became ready", target.ssid);
                self.state = InterfaceState::Disassociated;
                self.next_timeout_sec = prefs.scan_interval_sec;
                TickOutcome::AssociationFailed
            }
            Err(e) => {
                log::warn!("associate({}) failed: {e}", target.ssid);
                self.state = InterfaceState::Disassociated;
                self.next_timeout_sec = prefs.scan_interval_sec;
                TickOutcome::AssociationFailed
            }
        }
    }

    /// Disassociate transition (`spec.md` §4.7): clear driver state, stop
    /// DHCP or bring the link down depending on the prior IP policy, zero
    /// `currentAp`, and switch cadence back to the scan interval.
    fn disassociate(&mut self, driver: &mut dyn WirelessDriver, ip: &mut IpConfigurator, scan_interval_sec: u32) {
        self.tear_down_current(driver, ip);
        self.next_timeout_sec = scan_interval_sec;
    }

    fn tear_down_current(&mut self, driver: &mut dyn WirelessDriver, ip: &mut IpConfigurator) {
        let was_dhcp = matches!(
            &self.state,
            InterfaceState::Associated { record, .. } if matches!(record.ipv4_policy, crate::model::Ipv4Policy::Dhcp)
        );

        if let Err(e) = wireless::unconfig(driver) {
            log::warn!("unconfig({}) failed: {e}", self.ifname);
        }

        if was_dhcp {
            ip.teardown();
        } else if let Err(e) = driver.bring_down() {
            log::warn!("bring_down({}) failed: {e}", self.ifname);
        }

        self.rssi_window.reset();
        self.state = InterfaceState::Disassociated;
    }
}
