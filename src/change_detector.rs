//! Song change detection on the player bar.
//!
//! The detector waits for the player bar to appear, observes only that
//! subtree, and turns bursts of mutations into a single read once the page
//! has been quiet for the debounce window. A read is emitted only when the
//! title or artist differs from the last emitted snapshot.
//!
//! ```text
//! Idle --start--> Waiting --player bar found--> Observing --stream closed--> Stopped
//!                  ^    |
//!                  +----+ poll interval
//! ```

use crate::config::TimingConfig;
use crate::dom::{MutationBatch, NodeId, ObserveOptions, Page};
use crate::extractor::DomExtractor;
use crate::types::{ExtractionError, SongSnapshot};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Receiver of emitted snapshots
pub trait SnapshotSink: Send + Sync + 'static {
    fn emit(&self, snapshot: &SongSnapshot);
}

impl SnapshotSink for mpsc::UnboundedSender<SongSnapshot> {
    fn emit(&self, snapshot: &SongSnapshot) {
        if self.send(snapshot.clone()).is_err() {
            trace!("Snapshot receiver dropped");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Constructed, not started
    Idle,
    /// Polling for the player bar
    Waiting,
    /// Observer attached to the player bar
    Observing,
    /// Observer stream closed
    Stopped,
}

/// Debounce-then-diff watcher for one page
pub struct ChangeDetector<S> {
    page: Page,
    extractor: DomExtractor,
    debounce: Duration,
    poll_interval: Duration,
    sink: S,
    root: Option<NodeId>,
    last_emitted: Option<SongSnapshot>,
    state: watch::Sender<DetectorState>,
}

impl<S: SnapshotSink> ChangeDetector<S> {
    pub fn new(page: Page, extractor: DomExtractor, timing: &TimingConfig, sink: S) -> Self {
        let (state, _) = watch::channel(DetectorState::Idle);
        Self {
            page,
            extractor,
            debounce: timing.debounce(),
            poll_interval: timing.poll_interval(),
            sink,
            root: None,
            last_emitted: None,
            state,
        }
    }

    pub fn state(&self) -> DetectorState {
        *self.state.borrow()
    }

    pub fn last_emitted(&self) -> Option<&SongSnapshot> {
        self.last_emitted.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetectorState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: DetectorState) {
        self.state.send_replace(state);
    }

    fn observe_options(&self) -> ObserveOptions {
        ObserveOptions {
            child_list: true,
            subtree: true,
            character_data: true,
            attributes: true,
            attribute_filter: Some(self.extractor.attribute_filter().to_vec()),
        }
    }

    /// Look for the player bar once and attach to it if present
    pub fn try_attach(&mut self) -> Option<mpsc::UnboundedReceiver<MutationBatch>> {
        let root = match self.page.read(|doc| self.extractor.find_player_bar(doc)) {
            Ok(Some(root)) => root,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cannot look up player bar: {}", e);
                return None;
            }
        };

        match self.page.observe(root, self.observe_options()) {
            Ok(batches) => {
                self.root = Some(root);
                self.set_state(DetectorState::Observing);
                info!("Observer started on player bar");
                Some(batches)
            }
            Err(e) => {
                warn!("Failed to observe player bar: {}", e);
                None
            }
        }
    }

    /// A batch is relevant if any record targets the observed root or a
    /// node still inside it
    pub fn is_relevant(&self, batch: &MutationBatch) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        self.page
            .read(|doc| batch.iter().any(|record| doc.contains(root, record.target)))
    }

    /// Read the page after a quiet period and emit if the song changed
    pub fn settle(&mut self) -> Option<SongSnapshot> {
        let snapshot = match self.extractor.extract_from(&self.page) {
            Ok(snapshot) => snapshot,
            Err(ExtractionError::NotFound) => {
                trace!("Player bar incomplete at settle, skipping");
                return None;
            }
            Err(e) => {
                debug!("Extraction failed at settle: {}", e);
                return None;
            }
        };

        if let Some(last) = &self.last_emitted {
            if last.is_same_song(&snapshot) {
                trace!("Song unchanged: {}", snapshot.song_title);
                return None;
            }
        }

        debug!("Song changed: {} by {}", snapshot.song_title, snapshot.artist);
        self.sink.emit(&snapshot);
        self.last_emitted = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Run until the observer stream closes.
    ///
    /// Polling for the player bar never gives up; the page may render it at
    /// any time. Abort the task to stop it.
    pub async fn run(mut self) {
        self.set_state(DetectorState::Waiting);

        let mut batches = loop {
            if let Some(batches) = self.try_attach() {
                break batches;
            }
            trace!("Player bar not found, retrying in {:?}", self.poll_interval);
            tokio::time::sleep(self.poll_interval).await;
        };

        // At most one pending settle at a time
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                batch = batches.recv() => match batch {
                    Some(batch) => {
                        if self.is_relevant(&batch) {
                            deadline = Some(Instant::now() + self.debounce);
                        } else {
                            trace!("Ignoring {} irrelevant mutations", batch.len());
                        }
                    }
                    None => {
                        debug!("Mutation stream closed, stopping detector");
                        break;
                    }
                },
                _ = wait_until(deadline) => {
                    deadline = None;
                    self.settle();
                }
            }
        }

        self.set_state(DetectorState::Stopped);
    }

    /// Start the detector on the current tokio runtime
    pub fn spawn(self) -> DetectorHandle {
        let state = self.subscribe();
        let task = tokio::spawn(self.run());
        DetectorHandle { state, task }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Handle to a running detector task
pub struct DetectorHandle {
    state: watch::Receiver<DetectorState>,
    task: JoinHandle<()>,
}

impl DetectorHandle {
    pub fn state(&self) -> DetectorState {
        *self.state.borrow()
    }

    /// Wait until the detector reaches `target`. Returns false if the task
    /// ended first.
    pub async fn wait_for(&mut self, target: DetectorState) -> bool {
        self.state.wait_for(|state| *state == target).await.is_ok()
    }

    /// Cancel the poll loop or observer
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
