//! Subprocess Supervisor: runs helper programs (`ifconfig`, `route`, a DHCP
//! client) the way a careful daemon runs anything it didn't write — closed
//! file descriptors, a fixed `PATH`, `/dev/null` standard streams, and a
//! working directory that can't vanish under it.
//!
//! Grounded in `original_source/ifscand/ifscand.c`'s process-spawning
//! helpers: the executable-bit check before forking, the explicit fd
//! cleanup, and the synchronous `waitpid` for one-shot helpers versus the
//! SIGINT-then-reap restart cycle for the persistent DHCP child.

use crate::error::SupervisorError;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{chdir, close, execve, fork, ForkResult, Pid};
use std::ffi::CString;
use std::fs::{self, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const HELPER_PATH: &str = "/sbin:/usr/sbin:/bin:/usr/bin";

/// Checks that `path` is a regular file with at least one executable bit
/// set, mirroring the original's `valid_exe_p`.
pub fn is_executable(path: &Path) -> Result<bool, SupervisorError> {
    let meta = fs::metadata(path)?;
    Ok(meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

fn redirect_standard_streams() -> Result<(), SupervisorError> {
    let devnull_r = OpenOptions::new().read(true).open("/dev/null")?;
    let devnull_w = OpenOptions::new().write(true).open("/dev/null")?;
    nix::unistd::dup2(devnull_r.as_raw_fd(), 0)?;
    nix::unistd::dup2(devnull_w.as_raw_fd(), 1)?;
    nix::unistd::dup2(devnull_w.as_raw_fd(), 2)?;
    Ok(())
}

fn close_inherited_fds(keep: &[i32]) {
    // The daemon only ever opens a handful of long-lived descriptors
    // (control socket, store handle, log). Closing a generous range
    // covers them all without needing /proc/self/fd enumeration.
    for fd in 3..256 {
        if !keep.contains(&fd) {
            let _ = close(fd);
        }
    }
}

fn to_cstrings(args: &[&str]) -> Vec<CString> {
    args.iter().map(|a| CString::new(*a).unwrap()).collect()
}

/// Forks, execs `program` with `args`, and blocks until it exits. Used for
/// one-shot helpers (`ifconfig`, `route`).
pub fn run_once(program: &Path, args: &[&str]) -> Result<WaitStatus, SupervisorError> {
    if !is_executable(program)? {
        return Err(SupervisorError::NotExecutable(
            program.display().to_string(),
        ));
    }

    match unsafe { fork()? } {
        ForkResult::Parent { child } => Ok(waitpid(child, None).map_err(SupervisorError::Fork)?),
        ForkResult::Child => {
            exec_helper_or_exit(program, args);
        }
    }
}

/// Forks and execs a long-lived helper (a DHCP client), returning its pid
/// without waiting. The caller reaps it with [`check_exited`] or stops it
/// with [`terminate`].
pub fn spawn(program: &Path, args: &[&str]) -> Result<Pid, SupervisorError> {
    if !is_executable(program)? {
        return Err(SupervisorError::NotExecutable(
            program.display().to_string(),
        ));
    }

    match unsafe { fork()? } {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            exec_helper_or_exit(program, args);
        }
    }
}

fn exec_helper_or_exit(program: &Path, args: &[&str]) -> ! {
    let _ = chdir("/tmp");
    close_inherited_fds(&[]);
    if redirect_standard_streams().is_err() {
        std::process::exit(127);
    }

    let mut argv = vec![program.to_string_lossy().to_string()];
    argv.extend(args.iter().map(|a| a.to_string()));
    let argv_c = to_cstrings(&argv.iter().map(String::as_str).collect::<Vec<_>>());
    let path_c = CString::new(format!("PATH={HELPER_PATH}")).unwrap();
    let program_c = CString::new(program.to_string_lossy().as_ref()).unwrap();

    let _ = execve(&program_c, &argv_c, &[path_c]);
    std::process::exit(127);
}

/// Non-blocking reap of a previously [`spawn`]ed child. `Ok(None)` means
/// it's still running.
pub fn check_exited(pid: Pid) -> Result<Option<WaitStatus>, SupervisorError> {
    match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => Ok(None),
        Ok(status) => Ok(Some(status)),
        Err(nix::errno::Errno::ECHILD) => Ok(Some(WaitStatus::Exited(pid, 0))),
        Err(e) => Err(SupervisorError::Fork(e)),
    }
}

/// Sends `SIGINT` then blocks for the child to exit, matching the
/// original's restart cycle for the DHCP client (give it a chance to
/// release its lease before the harder `SIGKILL` a caller may escalate to).
pub fn terminate(pid: Pid) -> Result<(), SupervisorError> {
    kill(pid, Signal::SIGINT).map_err(SupervisorError::Fork)?;
    waitpid(pid, None).map_err(SupervisorError::Fork)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn rejects_non_executable_file() {
        let file = NamedTempFile::new().unwrap();
        writeln!(file.as_file(), "#!/bin/sh\nexit 0").unwrap();
        assert!(!is_executable(file.path()).unwrap());
    }

    #[test]
    fn run_once_reports_true_success() {
        let status = run_once(Path::new("/bin/true"), &[]).unwrap();
        assert!(matches!(status, WaitStatus::Exited(_, 0)));
    }

    #[test]
    fn run_once_propagates_nonzero_exit() {
        let status = run_once(Path::new("/bin/false"), &[]).unwrap();
        assert!(matches!(status, WaitStatus::Exited(_, code) if code != 0));
    }

    #[test]
    fn spawn_and_terminate_a_long_lived_child() {
        let pid = spawn(Path::new("/bin/sleep"), &["30"]).unwrap();
        assert!(check_exited(pid).unwrap().is_none());
        terminate(pid).unwrap();
    }
}
