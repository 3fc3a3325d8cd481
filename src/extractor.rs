//! Song metadata extraction from the player bar.
//!
//! The player bar holds a content-info region with a title node and a byline.
//! A byline with element children encodes artist, album and year as
//! positional children separated by punctuation nodes; a byline without
//! children is just the artist. Field values are the nodes' inner markup.

use crate::config::PageConfig;
use crate::dom::{Document, NodeId, Page};
use crate::types::{ExtractionError, SongSnapshot};
use tracing::trace;

/// Reads a `SongSnapshot` out of the current document state
#[derive(Debug, Clone)]
pub struct DomExtractor {
    config: PageConfig,
}

impl Default for DomExtractor {
    fn default() -> Self {
        Self::new(PageConfig::default())
    }
}

impl DomExtractor {
    pub fn new(config: PageConfig) -> Self {
        Self { config }
    }

    pub fn player_bar_selector(&self) -> &str {
        &self.config.player_bar_selector
    }

    pub fn attribute_filter(&self) -> &[String] {
        &self.config.attribute_filter
    }

    /// Locate the player bar root, if the page has rendered it yet
    pub fn find_player_bar(&self, doc: &Document) -> Result<Option<NodeId>, ExtractionError> {
        Ok(doc.query_selector(doc.root(), &self.config.player_bar_selector)?)
    }

    /// Extract a snapshot.
    ///
    /// Returns `NotFound` when the player bar, content info, title or byline
    /// is missing. A partial snapshot is never produced.
    pub fn extract(&self, doc: &Document) -> Result<SongSnapshot, ExtractionError> {
        let player_bar = self
            .find_player_bar(doc)?
            .ok_or(ExtractionError::NotFound)?;
        let content_info = doc
            .query_selector(player_bar, &self.config.content_info_selector)?
            .ok_or(ExtractionError::NotFound)?;
        let title = doc
            .query_selector(content_info, &self.config.title_selector)?
            .ok_or(ExtractionError::NotFound)?;
        let byline = doc
            .query_selector(content_info, &self.config.byline_selector)?
            .ok_or(ExtractionError::NotFound)?;

        let song_title = doc.inner_html(title)?;
        let children = doc.children(byline);

        if children.is_empty() {
            trace!("Byline has no children, using it as the artist");
            return Ok(SongSnapshot::new(song_title, doc.inner_html(byline)?));
        }

        let field = |index: usize| -> Result<Option<String>, ExtractionError> {
            match children.get(index) {
                Some(id) => Ok(Some(doc.inner_html(*id)?)),
                None => Ok(None),
            }
        };

        let artist = field(self.config.artist_index)?.ok_or(ExtractionError::NotFound)?;

        Ok(SongSnapshot {
            song_title,
            artist,
            album: field(self.config.album_index)?,
            release_year: field(self.config.year_index)?,
        })
    }

    /// Extract from a live page under its lock
    pub fn extract_from(&self, page: &Page) -> Result<SongSnapshot, ExtractionError> {
        page.read(|doc| self.extract(doc))
    }
}
