//! Native host render loop.

use crate::display::DisplayUpdater;
use crate::lyrics::LyricsLookup;
use crate::messaging::native::{write_message, HostMessage};
use crate::messaging::ExtensionMessage;
use std::future::Future;
use std::io::{self, Write};
use tokio::sync::mpsc;
use tracing::{info, trace};

/// Render each `domUpdate` to `out` until the inbound channel closes or
/// `shutdown` resolves. Shutdown also cancels a lookup in flight.
pub async fn serve<L, W>(
    updater: &DisplayUpdater<L>,
    inbound: &mut mpsc::Receiver<ExtensionMessage>,
    out: &mut W,
    shutdown: impl Future<Output = ()>,
) -> io::Result<()>
where
    L: LyricsLookup,
    W: Write,
{
    tokio::pin!(shutdown);

    loop {
        let message = tokio::select! {
            message = inbound.recv() => message,
            _ = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
        };

        let data = match message {
            Some(ExtensionMessage::DomUpdate { data }) => data,
            Some(other) => {
                trace!("Ignoring message: {:?}", other);
                continue;
            }
            None => {
                info!("Extension disconnected");
                return Ok(());
            }
        };

        info!("Now playing: {} - {}", data.song_title, data.artist);
        let view = tokio::select! {
            view = updater.update(&data) => view,
            _ = &mut shutdown => {
                info!("Shutting down during lyrics lookup");
                return Ok(());
            }
        };
        write_message(out, &HostMessage::from(&view))?;
    }
}
