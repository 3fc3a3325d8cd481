//! Display-context wiring.
//!
//! On startup the side panel pulls the current song from the page, then
//! renders every `domUpdate` pushed to it. Each render produces two views:
//! the metadata with a loading lyrics slot, then the finished lookup.

use crate::display::{DisplayUpdater, PanelView};
use crate::lyrics::LyricsLookup;
use crate::messaging::{ExtensionMessage, ExtensionRuntime, Messenger, PanelPort};
use crate::types::SongSnapshot;
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

pub struct SidePanel<L> {
    messenger: Messenger,
    port: PanelPort,
    updater: DisplayUpdater<L>,
    views: mpsc::Sender<PanelView>,
}

impl<L: LyricsLookup> SidePanel<L> {
    /// Attach a panel to the runtime. Pushes are buffered from here on.
    pub fn new(
        runtime: &ExtensionRuntime,
        updater: DisplayUpdater<L>,
        views: mpsc::Sender<PanelView>,
    ) -> Self {
        Self {
            messenger: runtime.messenger(),
            port: runtime.connect_panel(),
            updater,
            views,
        }
    }

    async fn render(&self, snapshot: &SongSnapshot) -> Option<PanelView> {
        let (mut view, query) = self.updater.prepare(snapshot);
        if self.views.send(view.clone()).await.is_err() {
            return None;
        }
        view.lyrics = self.updater.lyrics(&query).await;
        self.views.send(view.clone()).await.ok()?;
        Some(view)
    }

    /// Ask the page for the current song and render it
    pub async fn load_current(&self) -> Option<PanelView> {
        let response = self.messenger.pull().await?;
        match response.snapshot() {
            Some(snapshot) => self.render(&snapshot).await,
            None => {
                if response.success {
                    info!("Element not found on page");
                } else {
                    warn!(
                        "Error getting page data: {}",
                        response.error.as_deref().unwrap_or("unknown error")
                    );
                }
                None
            }
        }
    }

    /// Pull once, then render pushes until the panel is detached
    pub async fn run(mut self) {
        self.load_current().await;

        while let Some(message) = self.port.recv().await {
            match message {
                ExtensionMessage::DomUpdate { data } => {
                    if self.render(&data).await.is_none() {
                        info!("View receiver closed, stopping side panel");
                        return;
                    }
                }
                other => trace!("Ignoring message: {:?}", other),
            }
        }

        info!("Side panel detached");
    }
}
