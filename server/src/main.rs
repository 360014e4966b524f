mod config;
mod http_server;
mod poller;
mod state;

use std::sync::Arc;

use hls_stream::TwitchProvider;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use crate::config::Config;
use crate::poller::Poller;
use crate::state::LatestStitched;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let log_config = ConfigBuilder::new()
        .add_filter_allow_str("stitch_monitor")
        .add_filter_allow_str("hls_stream")
        .build();
    TermLogger::init(
        config.log_level_filter(),
        log_config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    log::info!(
        "[{}]Starting stitch monitor, playlist interval {:?}, poll interval {:?}",
        config.channel_name,
        config.playlist_interval(),
        config.poll_interval()
    );

    let latest = LatestStitched::new();
    let provider = TwitchProvider::new(
        &config.channel_name,
        &config.client_id,
        config.http_timeout(),
        config.endpoints(),
    )?;

    Poller::new(
        Arc::new(provider),
        latest.clone(),
        config.playlist_interval(),
        config.poll_interval(),
    )
    .start();

    let server =
        http_server::start_query_server(config.listen_addr, latest, shutdown_signal()).await?;
    server.handle.await?;

    Ok(())
}
