//! Cube Touch heartbeat monitor
//!
//! Usage:
//!   cube-heartbeat                  Monitor the fleet, print a status table
//!   cube-heartbeat --json           Same, one JSON object per update
//!   cube-heartbeat print-config     Show the effective configuration

use clap::Parser;
use cube_heartbeat::cli::{Cli, Command};
use cube_heartbeat::error::{HeartbeatError, Result};
use cube_heartbeat::{config, display, logging, Config, FleetEvent, HeartbeatMonitor};
use std::process::ExitCode;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load(),
    };
    cli.overrides.apply(&mut config);
    config.validate()?;

    match cli.command() {
        Command::PrintConfig => {
            print!("{}", config::to_toml(&config));
            Ok(())
        }
        Command::Run => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|source| HeartbeatError::Runtime { source })?;
            rt.block_on(run_monitor(config, cli.json))
        }
    }
}

async fn run_monitor(config: Config, json: bool) -> Result<()> {
    let mut monitor = HeartbeatMonitor::new(config);
    let mut events = monitor.subscribe();
    monitor.start()?;

    let mut shutdown = std::pin::pin!(shutdown_signal());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => render_event(&event, json),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Display fell behind, skipped {} event(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    monitor.stop().await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = tokio::signal::ctrl_c() => {},
                }
            }
            Err(e) => {
                warn!("Cannot install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn render_event(event: &FleetEvent, json: bool) {
    match event {
        FleetEvent::StatusChanged(snapshot) if json => match display::render_json(snapshot) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Cannot serialize snapshot: {}", e),
        },
        FleetEvent::StatusChanged(snapshot) => {
            println!("{}\n", display::render_table(snapshot));
        }
        // Already logged by the registry
        FleetEvent::DeviceDiscovered(_) | FleetEvent::DeviceOffline(_) => {}
    }
}
