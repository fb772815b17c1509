//! `cangate` – CAN motion gate daemon
//!
//! Wires the translator to a CAN interface and runs until Ctrl-C:
//!
//! 1. Loads `~/.cangate/config.toml` (writing defaults on first run) and
//!    applies environment overrides such as `CAN_BUS_ADAPTER_NAME`.
//! 2. Opens the configured adapter: the SocketCAN interface named by
//!    `channel` (default), or the virtual adapter, which reads candump lines
//!    on stdin and prints emitted frames on stdout.
//! 3. Runs the [`Notifier`] loop; on Ctrl-C (or end of stdin in virtual
//!    mode) it sends a final stop command to the motor-control board and
//!    exits.

mod config;
mod console;
mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;

use cangate_kernel::DispatchStats;
use cangate_middleware::{CanAdapter, FrameBus, Notifier, VirtualCanAdapter};
use cangate_types::GateError;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::config::{AdapterKind, Config};

#[tokio::main]
async fn main() -> ExitCode {
    let _guard = telemetry::init_tracing("cangate");

    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => {
            let cfg = Config::default();
            match config::save(&cfg) {
                Ok(()) => info!(path = %config::config_path().display(), "wrote default config"),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            cfg
        }
        Err(e) => {
            error!(error = %e, "config error");
            return ExitCode::FAILURE;
        }
    };
    config::apply_env_overrides(&mut cfg);

    match run(&cfg).await {
        Ok(stats) => {
            info!(?stats, "cangate exited");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "cangate failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: &Config) -> Result<DispatchStats, GateError> {
    info!(
        channel = %cfg.channel,
        adapter = %cfg.adapter,
        bitrate = cfg.bitrate,
        "starting cangate v{}",
        env!("CARGO_PKG_VERSION")
    );

    match cfg.adapter {
        AdapterKind::SocketCan => {
            let adapter = open_socketcan(&cfg.channel)?;
            let notifier = Notifier::connect(adapter, cfg.journal_capacity).await;
            Ok(notifier.run(shutdown_signal()).await)
        }
        AdapterKind::Virtual => run_virtual(cfg).await,
    }
}

/// Run against stdin/stdout instead of a CAN interface.  Ends at Ctrl-C or
/// end of input.
async fn run_virtual(cfg: &Config) -> Result<DispatchStats, GateError> {
    let adapter = Arc::new(VirtualCanAdapter::new(
        Arc::new(FrameBus::default()),
        cfg.channel.clone(),
    ));
    let board = adapter.subscribe_outbound();
    let notifier = Notifier::connect(Arc::clone(&adapter), cfg.journal_capacity).await;
    info!(channel = %cfg.channel, "virtual adapter: candump lines in on stdin, out on stdout");

    console::spawn_stdin_feeder(Arc::clone(&adapter))?;
    let (done_tx, done_rx) = oneshot::channel();
    let printer = tokio::spawn(console::print_frames(board, tokio::io::stdout(), done_rx));

    let stats = notifier.run(shutdown_signal()).await;
    let _ = done_tx.send(());
    if let Err(e) = printer.await {
        warn!(error = %e, "stdout writer failed");
    }
    Ok(stats)
}

#[cfg(feature = "socketcan")]
fn open_socketcan(channel: &str) -> Result<Arc<dyn CanAdapter>, GateError> {
    Ok(Arc::new(cangate_middleware::SocketCanAdapter::open(channel)?))
}

#[cfg(not(feature = "socketcan"))]
fn open_socketcan(_channel: &str) -> Result<Arc<dyn CanAdapter>, GateError> {
    Err(GateError::Config(
        "adapter 'socketcan' requires building with `--features socketcan`".to_string(),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl-C handler; running until the bus closes");
        std::future::pending::<()>().await;
    }
}
