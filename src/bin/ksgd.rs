//! KSG Daemon - KSysGuard sensors for extra AMDGPU clock domains
//!
//! Serves amdgpu sysfs clock readings over the ksysguardd line protocol.
//!
//! # Usage
//!
//! ```bash
//! # Interactive session on stdin/stdout (the default)
//! ksgd
//!
//! # Serve TCP sessions on localhost:2635
//! ksgd --daemon
//!
//! # Serve on another port
//! ksgd --daemon --port 3112
//!
//! # Print current readings and exit
//! ksgd --dump
//! ksgd --dump --json
//!
//! # Read a different card, or a custom sensor table
//! KSGD_DEVICE=/sys/class/drm/card1/device ksgd --dump
//! ksgd --config ~/sensors.toml --daemon
//!
//! # Enable debug logging (logs always go to stderr)
//! RUST_LOG=ksg_server=debug ksgd --daemon
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting connections and exit (daemon mode)

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ksg_core::SensorRegistry;
use ksg_server::config::SensorConfig;
use ksg_server::dump::{render_json, render_table};
use ksg_server::server::{serve_stdio, serve_tcp, DEFAULT_HOST, DEFAULT_PORT};

/// KSysGuard sensor reading for extra AMDGPU clock domains
#[derive(Parser, Debug)]
#[command(name = "ksgd", version, about)]
struct Args {
    /// Run as a daemon, serving TCP connections
    #[arg(long)]
    daemon: bool,

    /// Port to listen on in daemon mode
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Host to listen on in daemon mode
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Just dump the current values and exit
    #[arg(long)]
    dump: bool,

    /// Dump as JSON instead of a table
    #[arg(long, requires = "dump")]
    json: bool,

    /// amdgpu device directory (overrides the config file; env: KSGD_DEVICE)
    #[arg(long)]
    device: Option<PathBuf>,

    /// Sensor table in TOML (env: KSGD_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Initializes logging on stderr so stdout stays free for the protocol.
fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ksgd=info".parse()?)
                .add_directive("ksg_server=info".parse()?)
                .add_directive("ksg_core=info".parse()?)
                .add_directive("ksg_protocol=info".parse()?),
        )
        .init();
    Ok(())
}

/// Loads the sensor table and admits every readable sensor.
fn build_registry(args: &Args) -> Result<SensorRegistry> {
    let config_path = args
        .config
        .clone()
        .or_else(|| env::var_os("KSGD_CONFIG").map(PathBuf::from));
    let device = args
        .device
        .clone()
        .or_else(|| env::var_os("KSGD_DEVICE").map(PathBuf::from));

    let mut config =
        SensorConfig::discover(config_path.as_deref()).context("Failed to load sensor config")?;
    if let Some(device) = device {
        config = config.with_device(device);
    }

    config
        .build_registry()
        .context("Failed to build sensor registry")
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let registry = build_registry(&args)?;

    if args.dump {
        let readings = registry.snapshot();
        if args.json {
            println!("{}", render_json(&readings).context("Failed to serialize readings")?);
        } else {
            print!("{}", render_table(&readings));
        }
        return Ok(());
    }

    let registry = Arc::new(registry);

    if args.daemon {
        run_daemon(&args.host, args.port, registry)
    } else {
        run_interactive(registry)
    }
}

/// Runs the TCP acceptor (async entry point).
#[tokio::main]
async fn run_daemon(host: &str, port: u16, registry: Arc<SensorRegistry>) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        sensors = registry.len(),
        "KSG daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    if let Err(e) = serve_tcp(host, port, registry, cancel_token).await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("KSG daemon stopped");
    Ok(())
}

/// Runs a single session over stdin/stdout.
#[tokio::main(flavor = "current_thread")]
async fn run_interactive(registry: Arc<SensorRegistry>) -> Result<()> {
    match serve_stdio(registry).await {
        Ok(end) => {
            info!(end = ?end, "Session finished");
            Ok(())
        }
        Err(e) => Err(e).context("Interactive session failed"),
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
