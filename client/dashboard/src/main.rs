#![cfg_attr(feature = "gui", windows_subsystem = "windows")]

mod config;
mod dashboard;
mod envelope;
mod error;
#[cfg(feature = "gui")]
mod gui;
mod ingest;
mod registry;
mod render;
mod view;

use std::{env, io};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter, FmtSubscriber};

use crate::config::{load_config, DashboardConfig};
use crate::ingest::StopSignal;

fn init_tracing(writer: BoxMakeWriter) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg_attr(not(feature = "gui"), allow(dead_code))]
fn should_run_terminal() -> bool {
    env::args().any(|arg| arg == "--terminal")
}

async fn run_terminal_mode(config: DashboardConfig) {
    tracing::info!(endpoint = %config.endpoint, "subscribing to telemetry feed");
    let stop = StopSignal::new();
    let (events_tx, events) = mpsc::unbounded_channel();
    let ingest = ingest::spawn(config.endpoint.clone(), events_tx, stop.clone());

    render::run_terminal(&config, events, stop).await;

    // The ingest task closes its socket on stop; wait so it is never left dangling.
    if let Err(err) = ingest.await {
        tracing::warn!(error = %err, "ingest task failed");
    }
}

#[cfg(feature = "gui")]
fn main() {
    let terminal = should_run_terminal();
    // The terminal grid owns stdout, so logs go to stderr there.
    if terminal {
        init_tracing(BoxMakeWriter::new(io::stderr));
    } else {
        init_tracing(BoxMakeWriter::new(io::stdout));
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load config");
            return;
        }
    };

    if !terminal {
        gui::run(config);
        return;
    }

    match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(run_terminal_mode(config)),
        Err(err) => tracing::error!(error = %err, "tokio runtime"),
    }
}

#[cfg(not(feature = "gui"))]
#[tokio::main]
async fn main() {
    init_tracing(BoxMakeWriter::new(io::stderr));

    // Load config from file and env; env wins.
    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load config");
            return;
        }
    };

    run_terminal_mode(config).await;
}
