//! UNIX-domain datagram control protocol: tokenize, parse, dispatch, and
//! frame exactly one reply datagram per request.
//!
//! Grounded in `original_source/ifscand/cmds.c`'s `cmd_process` (tokenize,
//! dispatch, `OK`/`ERROR: …` framing) and `ifscand/ifscand.c`'s listening
//! socket setup; the blocking-with-timeout wait is done through `nix::poll`
//! since the rest of the crate already depends on `nix` for everything else
//! that touches a raw fd.

pub mod command;
pub mod tokenizer;

pub use command::{Command, GetKey};

use crate::error::ControlError;
use crate::model::ScannedNode;
use crate::store::PrefStore;
use crate::wireless::WirelessDriver;
use nix::poll::{poll, PollFd, PollFlags};
use std::os::fd::AsFd;
use std::os::unix::net::{SocketAddr, UnixDatagram};
use std::path::{Path, PathBuf};

/// Result of handling one control request that the daemon main loop needs
/// to act on beyond sending the reply.
pub enum Effect {
    None,
    Quit,
}

/// Owns the listening socket; removed from the filesystem on drop so a
/// restart doesn't trip over a stale socket file.
pub struct ControlServer {
    sock: UnixDatagram,
    path: PathBuf,
}

impl ControlServer {
    /// Binds a fresh socket at `path`, mode 0660 (`spec.md` §4.8/§6). Any
    /// stale file left behind by a prior crash is removed first.
    pub fn bind(path: impl AsRef<Path>) -> std::io::Result<ControlServer> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let _ = std::fs::remove_file(&path);
        let sock = UnixDatagram::bind(&path)?;
        sock.set_nonblocking(true)?;
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o660))?;
        Ok(ControlServer { sock, path })
    }

    /// Waits up to `timeout_sec` for a request; `None` means the timer
    /// expired with nothing to read. On a datagram, parses, dispatches, and
    /// sends back exactly one reply datagram before returning.
    pub fn wait_and_handle(
        &self,
        timeout_sec: u32,
        store: &dyn PrefStore,
        driver: &mut dyn WirelessDriver,
    ) -> std::io::Result<Option<Effect>> {
        let mut fds = [PollFd::new(self.sock.as_fd(), PollFlags::POLLIN)];
        let timeout_ms: i32 = timeout_sec.saturating_mul(1000).min(i32::MAX as u32) as i32;
        let n = poll(&mut fds, timeout_ms).map_err(std::io::Error::from)?;
        if n == 0 {
            return Ok(None);
        }

        let mut buf = [0u8; 65536];
        let (len, from) = match self.sock.recv_from(&mut buf) {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e),
        };
        let line = String::from_utf8_lossy(&buf[..len]);
        let (reply, effect) = handle_line(&line, store, driver);
        self.reply_to(&from, &reply)?;
        Ok(Some(effect))
    }

    fn reply_to(&self, addr: &SocketAddr, reply: &str) -> std::io::Result<()> {
        if let Some(path) = addr.as_pathname() {
            self.sock.send_to(reply.as_bytes(), path)?;
        }
        Ok(())
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Parses and dispatches one request line, returning the single reply
/// datagram body and whatever side effect the daemon loop needs to apply.
pub fn handle_line(line: &str, store: &dyn PrefStore, driver: &mut dyn WirelessDriver) -> (String, Effect) {
    match handle_line_inner(line, store, driver) {
        Ok((body, effect)) => (body, effect),
        Err(e) => (format!("ERROR: {e}"), Effect::None),
    }
}

fn handle_line_inner(
    line: &str,
    store: &dyn PrefStore,
    driver: &mut dyn WirelessDriver,
) -> Result<(String, Effect), ControlError> {
    let tokens = tokenizer::tokenize(line)?;
    if tokens.is_empty() {
        return Ok((String::new(), Effect::None));
    }
    let cmd = command::parse(&tokens)?;
    dispatch(cmd, store, driver)
}

fn dispatch(
    cmd: Command,
    store: &dyn PrefStore,
    driver: &mut dyn WirelessDriver,
) -> Result<(String, Effect), ControlError> {
    match cmd {
        Command::Add(record) => {
            store.put_ap(&record)?;
            Ok(("OK".to_string(), Effect::None))
        }
        Command::Del(ssid) => {
            store.delete_ap(&ssid)?;
            Ok(("OK".to_string(), Effect::None))
        }
        Command::List { json } => {
            let records = store.list_aps()?;
            if records.is_empty() {
                return Err(ControlError::BadCommand("No remembered access points".into()));
            }
            let body = if json {
                serde_json::to_string(&records).map_err(|e| ControlError::BadCommand(e.to_string()))?
            } else {
                records.iter().map(command::format_record_line).collect::<Vec<_>>().join("\n")
            };
            Ok((body, Effect::None))
        }
        Command::Scan { json } => {
            let nodes = driver.scan().map_err(|e| ControlError::BadCommand(e.to_string()))?;
            if nodes.is_empty() {
                return Err(ControlError::BadCommand("no access points visible".into()));
            }
            let body = if json {
                serde_json::to_string(&nodes).map_err(|e| ControlError::BadCommand(e.to_string()))?
            } else {
                nodes.iter().map(format_scanned_node).collect::<Vec<_>>().join("\n")
            };
            Ok((body, Effect::None))
        }
        Command::SetRandMac(value) => {
            crate::scheduler::save_randomize_mac(store, value)?;
            Ok(("OK".to_string(), Effect::None))
        }
        Command::SetApOrder(order) => {
            store.set_ap_order(&order)?;
            Ok(("OK".to_string(), Effect::None))
        }
        Command::Get(key) => {
            let prefs = crate::scheduler::load_global_preferences(store)?;
            let body = match key {
                GetKey::All => format!(
                    "randmac {}\n{}",
                    bool_str(prefs.randomize_mac),
                    format_ap_order(&prefs.ap_order)
                ),
                GetKey::RandMac => format!("randmac {}", bool_str(prefs.randomize_mac)),
                GetKey::ApOrder => format_ap_order(&prefs.ap_order),
            };
            Ok((body, Effect::None))
        }
        Command::Down => Ok(("OK".to_string(), Effect::Quit)),
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

fn format_ap_order(order: &[String]) -> String {
    if order.is_empty() {
        return String::new();
    }
    let quoted: Vec<String> = order.iter().map(|s| format!("\"{s}\"")).collect();
    format!("ap-order {}", quoted.join(" "))
}

fn format_scanned_node(node: &ScannedNode) -> String {
    format!(
        "{} {} chan={} rssi={} max_rssi={}",
        node.ssid, node.bssid, node.channel, node.rssi, node.max_rssi
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccessPointRecord;
    use crate::store::SqliteStore;
    use crate::wireless::mock::MockWirelessDriver;

    #[test]
    fn add_then_list_round_trips_the_textual_form() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut driver = MockWirelessDriver::default();

        let (reply, _) = handle_line("add nwid homenet", &store, &mut driver);
        assert_eq!(reply, "OK");

        let (reply, _) = handle_line("list", &store, &mut driver);
        assert_eq!(reply, "nwid homenet");
    }

    #[test]
    fn unknown_command_is_reported_as_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut driver = MockWirelessDriver::default();
        let (reply, _) = handle_line("frobnicate", &store, &mut driver);
        assert!(reply.starts_with("ERROR:"));
    }

    #[test]
    fn down_signals_quit_effect() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut driver = MockWirelessDriver::default();
        let (reply, effect) = handle_line("down", &store, &mut driver);
        assert_eq!(reply, "OK");
        assert!(matches!(effect, Effect::Quit));
    }

    #[test]
    fn del_is_idempotent_and_always_ok() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put_ap(&AccessPointRecord::new("homenet")).unwrap();
        let mut driver = MockWirelessDriver::default();

        let (reply, _) = handle_line("del homenet", &store, &mut driver);
        assert_eq!(reply, "OK");
        let (reply, _) = handle_line("del homenet", &store, &mut driver);
        assert_eq!(reply, "OK");
    }

    #[test]
    fn list_on_empty_store_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut driver = MockWirelessDriver::default();
        let (reply, _) = handle_line("list", &store, &mut driver);
        assert!(reply.starts_with("ERROR:"));
    }

    #[test]
    fn get_all_reports_defaults() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut driver = MockWirelessDriver::default();
        let (reply, _) = handle_line("get all", &store, &mut driver);
        assert!(reply.starts_with("randmac false"));
    }

    #[test]
    fn scan_emits_visible_nodes_in_plain_form() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut driver = MockWirelessDriver {
            scan_queue: vec![vec![crate::model::ScannedNode {
                ssid: "homenet".into(),
                bssid: crate::model::MacAddr::parse("aa:bb:cc:00:00:01").unwrap(),
                channel: 6,
                rssi: -40,
                max_rssi: 100,
                capabilities: Default::default(),
            }]]
            .into(),
            ..Default::default()
        };
        let (reply, _) = handle_line("scan", &store, &mut driver);
        assert!(reply.contains("homenet"));
    }
}
