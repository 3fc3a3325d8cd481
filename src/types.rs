//! Core types used throughout lyricbar.
//!
//! This module defines the song snapshot that travels between the page and
//! the side panel, and the error taxonomy shared by every stage of the
//! pipeline. None of these errors is fatal: each one degrades to "no update"
//! or a rendered placeholder.

use crate::dom::DomError;
use serde::{Deserialize, Serialize};

/// Album sentinel used by the side panel when the page gave no album
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Immutable record of what the player bar showed at one point in time.
///
/// Field values are raw markup fragments exactly as the page rendered them.
/// Escaping happens once, when the display renders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongSnapshot {
    pub song_title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub release_year: Option<String>,
}

impl SongSnapshot {
    pub fn new(song_title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            song_title: song_title.into(),
            artist: artist.into(),
            album: None,
            release_year: None,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_release_year(mut self, year: impl Into<String>) -> Self {
        self.release_year = Some(year.into());
        self
    }

    /// Title and artist are the identity of "the song". Album and year
    /// changes alone do not make a different song.
    pub fn is_same_song(&self, other: &SongSnapshot) -> bool {
        self.song_title == other.song_title && self.artist == other.artist
    }
}

/// Errors produced while reading the player bar
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// An expected structural element is missing. Normal during page load
    /// and track transitions.
    #[error("Element not found")]
    NotFound,

    /// Unexpected failure while reading the document
    #[error("Extraction failed: {0}")]
    Internal(String),
}

impl From<DomError> for ExtractionError {
    fn from(error: DomError) -> Self {
        ExtractionError::Internal(error.to_string())
    }
}

/// Reasons a cross-context message could not be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The other context is not attached (side panel closed, no content script)
    #[error("Could not establish connection. Receiving end does not exist.")]
    NoReceiver,

    /// The extension was reloaded while this context was still running
    #[error("Extension context invalidated")]
    Invalidated,
}

/// Errors from the lyrics provider
#[derive(Debug, thiserror::Error)]
pub enum LyricsError {
    /// The provider has no entry for this song (HTTP 404)
    #[error("Lyrics not found")]
    NotFound,

    /// Any other non-success status
    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// The request could not be sent or the connection failed
    #[error("Request failed: {0}")]
    Request(String),

    /// The body was not the expected JSON shape
    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid lyrics endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

impl From<reqwest::Error> for LyricsError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            LyricsError::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            LyricsError::Status(status.as_u16())
        } else {
            LyricsError::Request(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_song_ignores_album_and_year() {
        let a = SongSnapshot::new("Song", "Artist")
            .with_album("First Album")
            .with_release_year("2001");
        let b = SongSnapshot::new("Song", "Artist").with_album("Deluxe Edition");

        assert!(a.is_same_song(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_title_is_different_song() {
        let a = SongSnapshot::new("Song A", "Artist");
        let b = SongSnapshot::new("Song B", "Artist");
        assert!(!a.is_same_song(&b));
    }

    #[test]
    fn test_snapshot_wire_names() {
        let snapshot = SongSnapshot::new("Title", "Artist").with_album("Album");
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["songTitle"], "Title");
        assert_eq!(json["artist"], "Artist");
        assert_eq!(json["album"], "Album");
        assert!(json["releaseYear"].is_null());
    }

    #[test]
    fn test_snapshot_missing_optional_fields() {
        let snapshot: SongSnapshot =
            serde_json::from_str(r#"{"songTitle":"T","artist":"A"}"#).unwrap();
        assert_eq!(snapshot.album, None);
        assert_eq!(snapshot.release_year, None);
    }

    #[test]
    fn test_dom_error_maps_to_internal() {
        let error: ExtractionError = DomError::InvalidSelector("[".to_string()).into();
        assert!(matches!(error, ExtractionError::Internal(_)));
    }
}
