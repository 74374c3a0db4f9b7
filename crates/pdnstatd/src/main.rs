//! pdnstatd - PowerDNS statistics collector daemon.
//!
//! Periodically queries PowerDNS control sockets and writes the collected
//! statistics to stdout as InfluxDB line protocol.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use pdnstat_core::config::PowerdnsConfig;
use pdnstat_core::input::{Input, InputRegistry};
use pdnstat_core::metric::LineProtocolWriter;
use pdnstat_core::register_inputs;

/// Registry name of the input this daemon runs.
const INPUT: &str = "powerdns";

/// PowerDNS statistics collector daemon.
#[derive(Parser)]
#[command(name = "pdnstatd", about = "PowerDNS statistics collector daemon", version)]
struct Args {
    /// Collection interval in seconds.
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// JSON configuration file, e.g. `{"unix_sockets": ["/var/run/pdns.controlsocket"]}`.
    /// Lines starting with `#` are comments. See --sample-config.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Control socket to query. May be repeated; appended after sockets from --config.
    /// Defaults to /var/run/pdns.controlsocket when no socket is configured.
    #[arg(short = 's', long = "unix-socket", value_name = "PATH")]
    unix_sockets: Vec<String>,

    /// Run a single gather pass and exit.
    #[arg(long)]
    once: bool,

    /// Print a sample configuration and exit.
    #[arg(long)]
    sample_config: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr; stdout carries the metrics.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["pdnstatd", "pdnstat_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Builds the configuration from --config and --unix-socket.
fn load_config(args: &Args) -> Result<PowerdnsConfig, String> {
    let mut config = match &args.config {
        Some(path) => PowerdnsConfig::load(path).map_err(|e| e.to_string())?,
        None => PowerdnsConfig::default(),
    };
    config.extend_sockets(args.unix_sockets.iter().cloned());
    Ok(config)
}

/// Runs one gather pass and writes the records to `out`.
/// Returns `true` if both gathering and writing succeeded.
fn gather_pass<W: Write>(input: &mut dyn Input, out: W, pass: u64) -> bool {
    let started = Instant::now();
    let mut writer = LineProtocolWriter::new(out);

    let result = input.gather(&mut writer);
    let mut ok = true;

    if let Err(e) = &result {
        error!(
            "Pass #{}: gather failed after {} record(s): {}",
            pass,
            writer.written(),
            e
        );
        ok = false;
    }
    if let Some(e) = writer.take_error() {
        error!("Pass #{}: failed to write metrics: {}", pass, e);
        ok = false;
    } else if let Err(e) = writer.flush() {
        error!("Pass #{}: failed to flush metrics: {}", pass, e);
        ok = false;
    }
    if writer.skipped() > 0 {
        warn!(
            "Pass #{}: {} server(s) returned no statistics",
            pass,
            writer.skipped()
        );
    }

    if ok {
        info!(
            "Pass #{}: {} record(s) in {:?}",
            pass,
            writer.written(),
            started.elapsed()
        );
    }
    ok
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let mut registry = InputRegistry::new();
    if let Err(e) = register_inputs(&mut registry) {
        error!("Failed to register inputs: {}", e);
        return ExitCode::FAILURE;
    }

    let mut input = match registry.create(INPUT) {
        Ok(input) => input,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.sample_config {
        print!("{}", input.sample_config());
        return match io::stdout().flush() {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        };
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = input.configure(&config.to_value()) {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    info!("pdnstatd {} starting", env!("CARGO_PKG_VERSION"));
    info!("Input: {} ({})", input.name(), input.description());
    if config.unix_sockets.is_empty() {
        info!("Config: interval={}s, sockets=<default>", args.interval);
    } else {
        info!(
            "Config: interval={}s, sockets={}",
            args.interval,
            config.unix_sockets.join(", ")
        );
    }

    if args.once {
        return if gather_pass(input.as_mut(), io::stdout().lock(), 1) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let interval = Duration::from_secs(args.interval);

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut pass: u64 = 0;
    let mut failed: u64 = 0;

    info!("Starting collection loop");

    while running.load(Ordering::SeqCst) {
        pass += 1;
        if !gather_pass(input.as_mut(), io::stdout().lock(), pass) {
            failed += 1;
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    debug!("{} pass(es), {} failed", pass, failed);
    info!("Shutdown complete");
    ExitCode::SUCCESS
}
