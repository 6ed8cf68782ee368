use crate::config::Config;
use crate::feeds::{Orchestrator, WsConnector};
use crate::renderer::{CardTemplate, LineSink};
use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use url::Url;

/// Follow the stream without a terminal UI, printing each post to stdout
/// until Ctrl-C or until the reader of stdout goes away.
pub async fn run(config: &Config, page: Url) -> Result<()> {
    let (_location_tx, location_rx) = watch::channel(page);
    let connector = WsConnector::new(Duration::from_secs(config.stream.handshake_timeout_secs));
    let mut orchestrator = Orchestrator::new(
        Box::new(connector),
        config.reconnect.clone(),
        location_rx,
        LineSink::new(config.feed.capacity, std::io::stdout()),
        CardTemplate,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
        }
        let _ = shutdown_tx.send(true);
    });

    orchestrator.run(shutdown_rx).await;
    Ok(())
}
