//! `ifscanctl`: the unprivileged control program for `ifscand`.
//!
//! Out of scope for the core per `spec.md` §1, but implemented here as a
//! thin binary so the system is runnable end to end. Grounded in
//! `original_source/ifscanctl/ifscanctl.c`: bind an ephemeral local socket,
//! join the trailing argv into one line (quoting tokens that contain
//! whitespace, `arg2str`/`hasws`), send it to the daemon's control socket,
//! print back whatever single reply datagram comes back.

use clap::Parser;
use ifscand::control::tokenizer::join_quoted;
use ifscand::paths;
use std::os::unix::net::UnixDatagram;
use std::process::ExitCode;

/// Send a command to a running `ifscand` and print its reply.
#[derive(Parser, Debug)]
#[command(name = "ifscanctl", about = "Control program for ifscand")]
struct Args {
    /// Interface the target daemon manages, e.g. `wlan0`.
    ifname: String,

    /// Command and its arguments, e.g. `add nwid homenet`.
    #[arg(trailing_var_arg = true, required = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ifscanctl: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> std::io::Result<()> {
    let sock_path = paths::control_socket_path(&args.ifname);

    let local_path = std::env::temp_dir().join(format!(
        "ifscanctl-{}-{}",
        std::process::id(),
        rand::random::<u32>()
    ));
    let sock = UnixDatagram::bind(&local_path)?;
    let cleanup = CleanupOnDrop(local_path);

    let line = join_quoted(&args.command);
    sock.send_to(line.as_bytes(), &sock_path)?;

    let mut buf = [0u8; 65536];
    let len = sock.recv(&mut buf)?;
    let reply = String::from_utf8_lossy(&buf[..len]);
    print!("{reply}");
    if !reply.ends_with('\n') {
        println!();
    }

    drop(cleanup);
    Ok(())
}

struct CleanupOnDrop(std::path::PathBuf);

impl Drop for CleanupOnDrop {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}
