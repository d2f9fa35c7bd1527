//! IP Configurator: applies an [`Ipv4Policy`]/[`Ipv6Policy`] to an interface
//! once it's associated, via the same external `ifconfig`/`route`/DHCP
//! client helpers the original shells out to.
//!
//! Grounded in `original_source/ifscand/scan.c`'s `ifconfig_up`/`start_dhcp`/
//! `stop_dhcp`: the exact argv shapes below (`ifconfig IF inet ADDR/MASK up`,
//! `route add -inet default GW`, `dhclient -d IF`) are copied from there.

use crate::error::IpConfigError;
use crate::model::{Ipv4Policy, Ipv6Policy};
use crate::supervisor;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use std::path::{Path, PathBuf};

/// Failures here are logged and otherwise swallowed by the scheduler — a
/// misconfigured gateway shouldn't tear down an otherwise-good association
/// (`spec.md` §4.3/§9: the source continues as if associated, flagged there
/// as a potential improvement rather than fixed in this rendition).
pub struct IpConfigurator {
    ifname: String,
    ifconfig_path: PathBuf,
    route_path: PathBuf,
    dhcp_client_path: PathBuf,
    dhcp_child: Option<Pid>,
    /// When set, IP configuration is skipped entirely: the interface is
    /// associated but never addressed. Mirrors the `link-only` global flag.
    pub link_only: bool,
}

impl IpConfigurator {
    pub fn new(ifname: impl Into<String>) -> IpConfigurator {
        IpConfigurator {
            ifname: ifname.into(),
            ifconfig_path: PathBuf::from("/sbin/ifconfig"),
            route_path: PathBuf::from("/sbin/route"),
            dhcp_client_path: PathBuf::from("/sbin/dhclient"),
            dhcp_child: None,
            link_only: false,
        }
    }

    pub fn with_helper_paths(
        mut self,
        ifconfig: impl AsRef<Path>,
        route: impl AsRef<Path>,
        dhcp_client: impl AsRef<Path>,
    ) -> IpConfigurator {
        self.ifconfig_path = ifconfig.as_ref().to_path_buf();
        self.route_path = route.as_ref().to_path_buf();
        self.dhcp_client_path = dhcp_client.as_ref().to_path_buf();
        self
    }

    /// Applies both policies for a newly-associated AP. Best-effort: logs
    /// and returns the first helper failure, but the caller keeps the
    /// association regardless (see the error-handling design).
    pub fn apply(&mut self, ipv4: &Ipv4Policy, ipv6: &Ipv6Policy) -> Result<(), IpConfigError> {
        if self.link_only {
            return Ok(());
        }
        self.apply_ipv4(ipv4)?;
        self.apply_ipv6(ipv6)?;
        Ok(())
    }

    fn apply_ipv4(&mut self, policy: &Ipv4Policy) -> Result<(), IpConfigError> {
        match policy {
            Ipv4Policy::None => {
                self.stop_dhcp();
                Ok(())
            }
            Ipv4Policy::Dhcp => {
                self.start_dhcp();
                Ok(())
            }
            Ipv4Policy::Static { addr, mask, gateway } => {
                self.stop_dhcp();
                let target = format!("{addr}/{mask}");
                supervisor::run_once(&self.ifconfig_path, &[&self.ifname, "inet", &target, "up"])?;
                if let Some(gw) = gateway {
                    supervisor::run_once(
                        &self.route_path,
                        &["add", "-inet", "default", &gw.to_string()],
                    )?;
                }
                Ok(())
            }
        }
    }

    fn apply_ipv6(&mut self, policy: &Ipv6Policy) -> Result<(), IpConfigError> {
        match policy {
            Ipv6Policy::None => Ok(()),
            Ipv6Policy::Static { addr, mask, gateway } => {
                let target = format!("{addr}/{mask}");
                supervisor::run_once(&self.ifconfig_path, &[&self.ifname, "inet6", &target, "up"])?;
                if let Some(gw) = gateway {
                    supervisor::run_once(
                        &self.route_path,
                        &["add", "-inet6", "default", &gw.to_string()],
                    )?;
                }
                Ok(())
            }
        }
    }

    /// Starts the DHCP client for this interface. An existing live child is
    /// terminated and reaped first (`spec.md` §4.4), unlike the original's
    /// SIGHUP-to-restart cycle — noted as a deliberate redesign in
    /// `DESIGN.md`.
    fn start_dhcp(&mut self) {
        self.stop_dhcp();
        if let Ok(pid) = supervisor::spawn(&self.dhcp_client_path, &["-d", &self.ifname]) {
            self.dhcp_child = Some(pid);
        }
    }

    fn stop_dhcp(&mut self) {
        if let Some(pid) = self.dhcp_child.take() {
            let _ = supervisor::terminate(pid);
        }
    }

    /// Non-blocking check of the persistent DHCP child, restarting it if it
    /// exited unexpectedly. Called once per scheduler tick.
    pub fn check_dhcp(&mut self) {
        let Some(pid) = self.dhcp_child else {
            return;
        };
        if let Ok(Some(WaitStatus::Exited(..) | WaitStatus::Signaled(..))) =
            supervisor::check_exited(pid)
        {
            log::warn!("dhclient on {} exited unexpectedly; restarting", self.ifname);
            self.dhcp_child = None;
            self.start_dhcp();
        }
    }

    pub fn dhcp_is_running(&self) -> bool {
        self.dhcp_child.is_some()
    }

    /// Tears down whatever addressing is currently active. Used by the
    /// disassociate transition.
    pub fn teardown(&mut self) {
        self.stop_dhcp();
    }
}
