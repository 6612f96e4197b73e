pub mod config;
pub mod link;
pub mod mirror;

use crate::config::BeaconConfig;
use crate::link::engine::LinkHandle;
use crate::mirror::panel::{LogSurface, Panel, Surface};
use color_eyre::Result;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    // Config path from the first argument, platform default otherwise.
    let config_path = match std::env::args().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => BeaconConfig::default_path()?,
    };
    info!("Loading configuration from {}", config_path.display());
    let config = BeaconConfig::ensure_and_load(&config_path)?;

    // Broker link task: supervisor + telemetry loop.
    let (mut link_handle, message_rx, status_rx) = LinkHandle::spawn(&config);

    // Mirror task: GPIO pin + status panel. A missing GPIO chip degrades to
    // pin-less operation instead of failing startup.
    let drive = mirror::pin::open_drive(config.pin.bcm, config.pin.active_low);
    let panel = config
        .panel
        .enabled
        .then(|| (Panel::new(), Box::new(LogSurface) as Box<dyn Surface>));

    let cancel = CancellationToken::new();
    let mirror_task = tokio::spawn(mirror::run(
        message_rx,
        status_rx,
        drive,
        panel,
        config.panel.frame_period(),
        cancel.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    cancel.cancel();
    link_handle.shutdown().await;
    if let Err(e) = mirror_task.await {
        error!("Mirror task panicked: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
