//! `ifscand`: the wireless scan/associate daemon binary.
//!
//! Grounded in `original_source/ifscand/ifscand.c`'s `main()`: option
//! parsing, log setup, the signal handlers that flip a `Quit` flag observed
//! at loop boundaries, the initial scan-before-anything-else, and the
//! `poll`-driven main loop. The library crate (`ifscand::scheduler`,
//! `ifscand::control`, …) does the actual work; this binary only wires it
//! together and owns the process-level concerns (argv, signals,
//! daemonization, logging sink).

use anyhow::{Context, Result};
use clap::Parser;
use ifscand::control::{ControlServer, Effect};
use ifscand::ipconfig::IpConfigurator;
use ifscand::scheduler::{load_global_preferences, Scheduler, TickOutcome};
use ifscand::store::{PrefStore, SqliteStore};
use ifscand::wireless::LinuxWirelessDriver;
use ifscand::{paths, wireless};
use log::LevelFilter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scan for known WiFi access points and automatically join.
#[derive(Parser, Debug)]
#[command(name = "ifscand", about = "Scan for known WiFi access points and automatically join")]
struct Args {
    /// Run in debug mode (extra logs).
    #[arg(short, long)]
    debug: bool,

    /// Don't daemonize into the background.
    #[arg(short, long)]
    foreground: bool,

    /// Don't do any network (IP layer) configuration.
    #[arg(short = 'N', long = "no-network")]
    no_network: bool,

    /// Interface to manage, e.g. `wlan0`.
    ifname: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    if !args.foreground {
        nix::unistd::daemon(false, args.debug).context("can't daemonize")?;
    }

    let quit_signal = Arc::new(AtomicUsize::new(0));
    install_signal_handlers(&quit_signal)?;

    let store_path = paths::store_path();
    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent).context("can't create preference store directory")?;
    }
    let store = SqliteStore::open(&store_path)
        .with_context(|| format!("can't open preference store at {}", store_path.display()))?;

    let mut driver = LinuxWirelessDriver::open(&args.ifname)
        .with_context(|| format!("can't initialize {}", args.ifname))?;

    let sock_path = paths::control_socket_path(&args.ifname);
    let control = ControlServer::bind(&sock_path)
        .with_context(|| format!("can't listen on {}", sock_path.display()))?;

    let mut ip = IpConfigurator::new(args.ifname.as_str());
    ip.link_only = args.no_network;

    let prefs = load_global_preferences(&store).context("can't read global preferences")?;
    let mut sched = Scheduler::new(args.ifname.as_str(), prefs.scan_interval_sec);

    log::info!(
        "starting daemon for {} {} network-config..",
        args.ifname,
        if args.no_network { "WITHOUT" } else { "with" }
    );
    log::info!(
        "listening on {}, prefs in {}",
        sock_path.display(),
        store_path.display()
    );

    // Run the state machine once on startup: scan and settle before the
    // control loop starts waiting on anything (mirrors the original's
    // unconditional `wifi_scan(&ifs)` call before entering its poll loop).
    run_tick(&mut sched, &mut driver, &mut ip, &store, &args.ifname)?;

    loop {
        if quit_signal.load(Ordering::SeqCst) != 0 {
            break;
        }

        let prefs = load_global_preferences(&store).context("can't read global preferences")?;
        let timeout = sched.next_timeout_sec.max(1);
        match control.wait_and_handle(timeout, &store, &mut driver) {
            Ok(Some(Effect::Quit)) => {
                log::info!("received 'down' command; quitting");
                break;
            }
            Ok(Some(Effect::None)) | Ok(None) => {}
            Err(e) => log::warn!("control socket error: {e}"),
        }

        if quit_signal.load(Ordering::SeqCst) != 0 {
            break;
        }

        if run_tick(&mut sched, &mut driver, &mut ip, &store, &args.ifname)? {
            break;
        }
    }

    let sig = quit_signal.load(Ordering::SeqCst);
    if sig != 0 {
        log::info!("caught signal {sig}; quitting..");
    } else {
        log::info!("ending daemon for {}..", args.ifname);
    }

    if let ifscand::scheduler::InterfaceState::Associated { .. } = sched.state() {
        let _ = wireless::unconfig(&mut driver);
    }
    ip.teardown();

    Ok(())
}

/// Runs one scheduler tick, logging the outcome. Returns `true` when the
/// daemon should exit (too many consecutive scan errors, §7).
fn run_tick(
    sched: &mut Scheduler,
    driver: &mut LinuxWirelessDriver,
    ip: &mut IpConfigurator,
    store: &dyn PrefStore,
    ifname: &str,
) -> Result<bool> {
    let prefs = load_global_preferences(store).context("can't read global preferences")?;
    match sched.tick(driver, ip, store, &prefs) {
        Ok(TickOutcome::AbortedTooManyScanErrors) => {
            log::error!("too many consecutive scan errors on {ifname}; aborting");
            Ok(true)
        }
        Ok(outcome) => {
            log::debug!("{ifname}: tick -> {outcome:?}");
            Ok(false)
        }
        Err(e) => {
            // Persistence failures are fatal (§7): the store itself couldn't
            // be read, not just "no record for this SSID".
            Err(e).with_context(|| format!("preference store error on {ifname}"))
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let level = if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    if args.foreground {
        env_logger::Builder::new().filter_level(level).init();
        return Ok(());
    }

    let formatter = syslog::Formatter3164 {
        facility: syslog::Facility::LOG_DAEMON,
        hostname: None,
        process: format!("ifscand.{}", args.ifname),
        pid: std::process::id(),
    };
    let logger = syslog::unix(formatter).context("can't connect to syslog")?;
    log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
        .map(|()| log::set_max_level(level))
        .context("can't install syslog logger")?;
    Ok(())
}

/// Registers SIGINT/SIGTERM/SIGHUP to store their own signal number into
/// `quit_signal` (observed at loop boundaries, `spec.md` §5) and ignores
/// SIGPIPE, mirroring the original's `sighandle`/`sigignore`.
fn install_signal_handlers(quit_signal: &Arc<AtomicUsize>) -> Result<()> {
    for &sig in &[
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGHUP,
    ] {
        signal_hook::flag::register_usize(sig, Arc::clone(quit_signal), sig as usize)
            .with_context(|| format!("can't install handler for signal {sig}"))?;
    }
    unsafe {
        nix::sys::signal::signal(nix::sys::signal::Signal::SIGPIPE, nix::sys::signal::SigHandler::SigIgn)
            .context("can't ignore SIGPIPE")?;
    }
    Ok(())
}
