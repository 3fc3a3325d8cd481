//! Lyricbar native messaging host
//!
//! Receives `domUpdate` messages from the extension on stdin, looks up the
//! lyrics and writes a `render` message for the side panel to stdout.
//! Logs go to stderr since stdout carries the protocol.

use lyricbar::config::GeneralConfig;
use lyricbar::messaging::native::read_messages;
use lyricbar::{host, Config, DisplayUpdater, ExtensionMessage, LrclibClient};
use std::io;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Read framed messages on a blocking thread until stdin closes
fn spawn_reader(tx: mpsc::Sender<ExtensionMessage>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        let mut reader = stdin.lock();

        if let Err(e) = read_messages(&mut reader, |message| tx.blocking_send(message).is_ok()) {
            error!("Failed to read message: {}", e);
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = Config::default_config_path();
    let read = Config::read_from_path(&config_path);
    let log_level = match &read {
        Ok(Some(config)) => config.general.log_level.clone(),
        _ => GeneralConfig::default().log_level,
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or(log_level),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .init();

    info!("Starting Lyricbar host");
    let config = Config::or_defaults(read, &config_path);

    let client = LrclibClient::new(&config.lyrics)?;
    let updater = DisplayUpdater::new(client, &config.lyrics);

    let (tx, mut rx) = mpsc::channel::<ExtensionMessage>(100);
    spawn_reader(tx);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    host::serve(&updater, &mut rx, &mut io::stdout(), shutdown).await?;

    Ok(())
}
