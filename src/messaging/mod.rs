//! Cross-context messaging between the page and the side panel.
//!
//! Two channels run over the extension runtime:
//! - **pull**: the panel asks the content context for the current song and
//!   gets exactly one `PullResponse` back
//! - **push**: the content context sends `domUpdate` notifications whenever
//!   the song changes
//!
//! A missing receiver is the normal state whenever the panel is closed, and
//! the runtime can be invalidated underneath a running page when the
//! extension reloads. Both surface as `DeliveryError` and callers on the
//! notification path drop them at debug level.

pub mod native;

use crate::change_detector::SnapshotSink;
use crate::types::{DeliveryError, ExtractionError, SongSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// Message exchanged between extension contexts, tagged by `action`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ExtensionMessage {
    /// Pull request: ask the page for the current song
    #[serde(rename = "getDOMElement")]
    GetDomElement,

    /// Push notification: the song changed
    #[serde(rename = "domUpdate")]
    DomUpdate { data: SongSnapshot },
}

/// Reply to a `getDOMElement` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_exists: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PullResponse {
    pub fn found(snapshot: SongSnapshot) -> Self {
        Self {
            success: true,
            element_exists: Some(true),
            song_title: Some(snapshot.song_title),
            artist: Some(snapshot.artist),
            album: snapshot.album,
            release_year: snapshot.release_year,
            error: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            success: true,
            element_exists: Some(false),
            song_title: None,
            artist: None,
            album: None,
            release_year: None,
            error: None,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            success: false,
            element_exists: None,
            song_title: None,
            artist: None,
            album: None,
            release_year: None,
            error: Some(message.to_string()),
        }
    }

    /// The snapshot carried by a successful, element-found response
    pub fn snapshot(&self) -> Option<SongSnapshot> {
        if !self.success || self.element_exists != Some(true) {
            return None;
        }
        Some(SongSnapshot {
            song_title: self.song_title.clone().unwrap_or_default(),
            artist: self.artist.clone().unwrap_or_default(),
            album: self.album.clone(),
            release_year: self.release_year.clone(),
        })
    }
}

impl From<Result<SongSnapshot, ExtractionError>> for PullResponse {
    fn from(result: Result<SongSnapshot, ExtractionError>) -> Self {
        match result {
            Ok(snapshot) => PullResponse::found(snapshot),
            Err(ExtractionError::NotFound) => PullResponse::not_found(),
            Err(ExtractionError::Internal(message)) => PullResponse::failure(&message),
        }
    }
}

/// A pull request waiting for the content context's answer
#[derive(Debug)]
pub struct PendingPull {
    pub message: ExtensionMessage,
    responder: oneshot::Sender<PullResponse>,
}

impl PendingPull {
    /// Send the single response. Returns false if the requester went away.
    pub fn respond(self, response: PullResponse) -> bool {
        self.responder.send(response).is_ok()
    }
}

struct RuntimeState {
    valid: AtomicBool,
    panel: Mutex<Option<mpsc::UnboundedSender<ExtensionMessage>>>,
    content: Mutex<Option<mpsc::UnboundedSender<PendingPull>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process extension message bus shared by both contexts
#[derive(Clone)]
pub struct ExtensionRuntime {
    state: Arc<RuntimeState>,
}

impl Default for ExtensionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRuntime {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RuntimeState {
                valid: AtomicBool::new(true),
                panel: Mutex::new(None),
                content: Mutex::new(None),
            }),
        }
    }

    /// Attach the side panel. Replaces any previously attached panel.
    pub fn connect_panel(&self) -> PanelPort {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.state.panel) = Some(tx);
        PanelPort { rx }
    }

    /// Attach the content context that answers pull requests
    pub fn connect_content(&self) -> ContentPort {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.state.content) = Some(tx);
        ContentPort { rx }
    }

    pub fn messenger(&self) -> Messenger {
        Messenger {
            state: Arc::clone(&self.state),
        }
    }

    /// Mark the transport dead, as when the extension is reloaded or updated
    pub fn invalidate(&self) {
        self.state.valid.store(false, Ordering::SeqCst);
        lock(&self.state.panel).take();
        lock(&self.state.content).take();
    }

    pub fn is_valid(&self) -> bool {
        self.state.valid.load(Ordering::SeqCst)
    }
}

/// Side-panel end of the push channel
pub struct PanelPort {
    rx: mpsc::UnboundedReceiver<ExtensionMessage>,
}

impl PanelPort {
    pub async fn recv(&mut self) -> Option<ExtensionMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ExtensionMessage> {
        self.rx.try_recv().ok()
    }
}

/// Content-context end of the pull channel
pub struct ContentPort {
    rx: mpsc::UnboundedReceiver<PendingPull>,
}

impl ContentPort {
    pub async fn recv(&mut self) -> Option<PendingPull> {
        self.rx.recv().await
    }
}

/// Sending handle used by either context
#[derive(Clone)]
pub struct Messenger {
    state: Arc<RuntimeState>,
}

impl Messenger {
    fn ensure_valid(&self) -> Result<(), DeliveryError> {
        if self.state.valid.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DeliveryError::Invalidated)
        }
    }

    /// Push a `domUpdate` to the side panel
    pub fn push(&self, snapshot: &SongSnapshot) -> Result<(), DeliveryError> {
        self.ensure_valid()?;
        let panel = lock(&self.state.panel);
        let tx = panel.as_ref().ok_or(DeliveryError::NoReceiver)?;
        tx.send(ExtensionMessage::DomUpdate {
            data: snapshot.clone(),
        })
        .map_err(|_| DeliveryError::NoReceiver)
    }

    /// Push, treating an absent or dead receiver as a normal outcome
    pub fn notify_panel(&self, snapshot: &SongSnapshot) {
        match self.push(snapshot) {
            Ok(()) => trace!("Sent domUpdate for {}", snapshot.song_title),
            Err(DeliveryError::Invalidated) => {
                debug!("Extension context invalidated - content script needs refresh")
            }
            Err(e) => debug!("Side panel not available: {}", e),
        }
    }

    /// Send one request to the content context and wait for its response
    pub async fn request(&self, message: ExtensionMessage) -> Result<PullResponse, DeliveryError> {
        self.ensure_valid()?;
        let (responder, response) = oneshot::channel();
        {
            let content = lock(&self.state.content);
            let tx = content.as_ref().ok_or(DeliveryError::NoReceiver)?;
            tx.send(PendingPull { message, responder })
                .map_err(|_| DeliveryError::NoReceiver)?;
        }
        response.await.map_err(|_| DeliveryError::NoReceiver)
    }

    /// Ask for the current song. Delivery failures come back as `None`.
    pub async fn pull(&self) -> Option<PullResponse> {
        match self.request(ExtensionMessage::GetDomElement).await {
            Ok(response) => Some(response),
            Err(e) => {
                debug!("Pull request not delivered: {}", e);
                None
            }
        }
    }
}

impl SnapshotSink for Messenger {
    fn emit(&self, snapshot: &SongSnapshot) {
        self.notify_panel(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_wire_format() {
        let pull = serde_json::to_value(ExtensionMessage::GetDomElement).unwrap();
        assert_eq!(pull, serde_json::json!({"action": "getDOMElement"}));

        let push = serde_json::to_value(ExtensionMessage::DomUpdate {
            data: SongSnapshot::new("T", "A"),
        })
        .unwrap();
        assert_eq!(push["action"], "domUpdate");
        assert_eq!(push["data"]["songTitle"], "T");
    }

    #[test]
    fn test_parse_incoming_dom_update() {
        let json = r#"{"action":"domUpdate","data":{"songTitle":"T","artist":"A","album":null,"releaseYear":null}}"#;
        let message: ExtensionMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            message,
            ExtensionMessage::DomUpdate {
                data: SongSnapshot::new("T", "A")
            }
        );
    }

    #[test]
    fn test_pull_response_shapes() {
        let found = serde_json::to_value(PullResponse::found(
            SongSnapshot::new("T", "A").with_album("B"),
        ))
        .unwrap();
        assert_eq!(
            found,
            serde_json::json!({
                "success": true,
                "elementExists": true,
                "songTitle": "T",
                "artist": "A",
                "album": "B"
            })
        );

        let missing = serde_json::to_value(PullResponse::not_found()).unwrap();
        assert_eq!(missing, serde_json::json!({"success": true, "elementExists": false}));

        let failed = serde_json::to_value(PullResponse::failure("boom")).unwrap();
        assert_eq!(failed, serde_json::json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn test_pull_response_from_extraction() {
        let ok: PullResponse = Ok(SongSnapshot::new("T", "A")).into();
        assert_eq!(ok.snapshot(), Some(SongSnapshot::new("T", "A")));

        let missing: PullResponse = Err(ExtractionError::NotFound).into();
        assert_eq!(missing.snapshot(), None);
        assert!(missing.success);

        let failed: PullResponse = Err(ExtractionError::Internal("bad".to_string())).into();
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("bad"));
    }

    #[test]
    fn test_push_without_panel() {
        let runtime = ExtensionRuntime::new();
        let messenger = runtime.messenger();
        let snapshot = SongSnapshot::new("T", "A");

        assert_eq!(messenger.push(&snapshot), Err(DeliveryError::NoReceiver));
        messenger.notify_panel(&snapshot);

        let mut port = runtime.connect_panel();
        assert_eq!(messenger.push(&snapshot), Ok(()));
        assert!(port.try_recv().is_some());
    }

    #[test]
    fn test_push_after_panel_closed_does_not_block_later_pushes() {
        let runtime = ExtensionRuntime::new();
        let messenger = runtime.messenger();

        let port = runtime.connect_panel();
        drop(port);
        assert_eq!(
            messenger.push(&SongSnapshot::new("A", "A")),
            Err(DeliveryError::NoReceiver)
        );

        let mut port = runtime.connect_panel();
        messenger.notify_panel(&SongSnapshot::new("B", "B"));
        match port.try_recv() {
            Some(ExtensionMessage::DomUpdate { data }) => assert_eq!(data.song_title, "B"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_invalidated_runtime() {
        let runtime = ExtensionRuntime::new();
        let _port = runtime.connect_panel();
        let messenger = runtime.messenger();

        runtime.invalidate();
        assert!(!runtime.is_valid());
        assert_eq!(
            messenger.push(&SongSnapshot::new("T", "A")),
            Err(DeliveryError::Invalidated)
        );
    }

    #[tokio::test]
    async fn test_pull_round_trip() {
        let runtime = ExtensionRuntime::new();
        let mut content = runtime.connect_content();
        let messenger = runtime.messenger();

        let responder = tokio::spawn(async move {
            let pending = content.recv().await.unwrap();
            assert_eq!(pending.message, ExtensionMessage::GetDomElement);
            pending.respond(PullResponse::found(SongSnapshot::new("T", "A")))
        });

        let response = messenger.pull().await.unwrap();
        assert_eq!(response.song_title.as_deref(), Some("T"));
        assert!(responder.await.unwrap());
    }

    #[tokio::test]
    async fn test_pull_without_content_is_none() {
        let runtime = ExtensionRuntime::new();
        assert_eq!(runtime.messenger().pull().await, None);
    }

    #[tokio::test]
    async fn test_pull_dropped_responder_is_none() {
        let runtime = ExtensionRuntime::new();
        let mut content = runtime.connect_content();
        let messenger = runtime.messenger();

        tokio::spawn(async move {
            let pending = content.recv().await.unwrap();
            drop(pending);
        });

        assert_eq!(
            messenger.request(ExtensionMessage::GetDomElement).await,
            Err(DeliveryError::NoReceiver)
        );
    }
}
