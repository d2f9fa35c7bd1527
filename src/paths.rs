//! Default filesystem locations (`SPEC_FULL.md` §6 [ADD]).
//!
//! The original hardcodes an install prefix in `common.h`'s `IFSCAND_SOCK`/
//! `IFSCAND_PREFS` macros. This rendition derives sensible per-user defaults
//! from XDG base-directory conventions, each overridable by an environment
//! variable for tests and non-standard deployments.

use std::path::PathBuf;

const ENV_RUNTIME_DIR: &str = "IFSCAND_RUNTIME_DIR";
const ENV_STATE_DIR: &str = "IFSCAND_STATE_DIR";

/// Control socket path for `ifname`: `<runtime-dir>/ifscand.<ifname>`.
pub fn control_socket_path(ifname: &str) -> PathBuf {
    runtime_dir().join(format!("ifscand.{ifname}"))
}

/// Preference store path: `<state-dir>/ifscand/prefs.db`.
pub fn store_path() -> PathBuf {
    state_dir().join("ifscand").join("prefs.db")
}

fn runtime_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_RUNTIME_DIR) {
        return PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from("/var/run")
}

fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        return PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(dir);
    }
    PathBuf::from("/var/lib")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_socket_path_is_named_after_the_interface() {
        std::env::set_var(ENV_RUNTIME_DIR, "/tmp/ifscand-test-runtime");
        assert_eq!(
            control_socket_path("wlan0"),
            PathBuf::from("/tmp/ifscand-test-runtime/ifscand.wlan0")
        );
        std::env::remove_var(ENV_RUNTIME_DIR);
    }

    #[test]
    fn store_path_lives_under_an_ifscand_subdirectory() {
        std::env::set_var(ENV_STATE_DIR, "/tmp/ifscand-test-state");
        assert_eq!(store_path(), PathBuf::from("/tmp/ifscand-test-state/ifscand/prefs.db"));
        std::env::remove_var(ENV_STATE_DIR);
    }
}
