//! Lyricbar - now-playing lyrics for the music web player
//!
//! This crate models the pieces of a browser extension that shows the lyrics
//! of the song currently playing in a side panel:
//!
//! - **Extraction**: reads title, artist, album and year out of the player bar
//! - **Change detection**: observes the player bar and debounces mutation
//!   bursts into one notification per song change
//! - **Messaging**: pull (`getDOMElement`) and push (`domUpdate`) channels
//!   between the page and the side panel
//! - **Display**: renders the metadata and the lyrics fetched from LRCLIB
//!
//! # Architecture
//!
//! The page is an in-memory document with mutation observers. The content
//! context runs a [`ChangeDetector`] over it and answers pull requests; the
//! side panel renders whatever it pulls on startup and every push after.
//! The `lyricbar` binary runs the display side as a native messaging host.

pub mod change_detector;
pub mod config;
pub mod content;
pub mod display;
pub mod dom;
pub mod extractor;
pub mod host;
pub mod lyrics;
pub mod messaging;
pub mod panel;
pub mod types;
pub mod visibility;

// Re-export commonly used types
pub use change_detector::{ChangeDetector, DetectorHandle, DetectorState, SnapshotSink};
pub use config::Config;
pub use content::{launch, ContentHandles, ContentScript};
pub use display::{DisplayUpdater, LyricsView, MetadataView, PanelView};
pub use dom::{Document, Element, NodeId, Page};
pub use extractor::DomExtractor;
pub use lyrics::{LrclibClient, LyricsLookup, LyricsQuery, LyricsRecord};
pub use messaging::native::HostMessage;
pub use messaging::{ExtensionMessage, ExtensionRuntime, Messenger, PullResponse};
pub use panel::SidePanel;
pub use types::{DeliveryError, ExtractionError, LyricsError, SongSnapshot};
pub use visibility::{PanelOptions, SidePanelPolicy, Tab, TabEvent};
