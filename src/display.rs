//! Side-panel rendering of a song snapshot and its lyrics.
//!
//! Snapshot fields arrive as raw page markup. They are reduced to display
//! text here and escaped exactly once when the view is built; lyrics from
//! the provider are escaped the same way.

use crate::config::LyricsConfig;
use crate::lyrics::{strip_timestamps, LyricsLookup, LyricsQuery, LyricsRecord};
use crate::types::{LyricsError, SongSnapshot, UNKNOWN_ALBUM};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::{debug, error};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_YEAR: &str = "Unknown Year";

pub const LOADER_HTML: &str = r#"<div class="loader"></div>"#;
pub const NO_LYRICS_HTML: &str = r#"<p class="error">No lyrics available</p>"#;
pub const FAILURE_HTML: &str = r#"<p class="error">Failed to load lyrics. Please try again.</p>"#;

lazy_static! {
    static ref TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref ENTITY: Regex = Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap();
}

/// Escape text for insertion into HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn decode_entity(caps: &Captures<'_>) -> String {
    let name = &caps[1];
    let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse().ok().and_then(char::from_u32)
    } else {
        match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => None,
        }
    };
    decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
}

/// Display text of a raw markup fragment: tags dropped, entities decoded
pub fn fragment_text(fragment: &str) -> String {
    let without_tags = TAG.replace_all(fragment, "");
    ENTITY.replace_all(&without_tags, decode_entity).into_owned()
}

fn field_text(raw: Option<&str>, fallback: &str) -> String {
    raw.map(fragment_text)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Escaped HTML for the metadata slots of the panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataView {
    pub title: String,
    pub artist: String,
    /// Empty when the album is unknown
    pub album: String,
    /// `(YEAR)`, empty when the album is unknown
    pub release_year: String,
}

/// State of the lyrics slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LyricsView {
    Loading,
    Plain(String),
    Synced(String),
    NoLyrics,
    NotFound { title: String, artist: String },
    Failed,
}

impl LyricsView {
    pub fn from_lookup(
        result: Result<LyricsRecord, LyricsError>,
        query: &LyricsQuery,
        strip_synced_timestamps: bool,
    ) -> Self {
        let record = match result {
            Ok(record) => record,
            Err(LyricsError::NotFound) => {
                return LyricsView::NotFound {
                    title: query.track.clone(),
                    artist: query.artist.clone(),
                }
            }
            Err(e) => {
                error!("Error fetching lyrics: {}", e);
                return LyricsView::Failed;
            }
        };

        let plain = record.plain_lyrics.filter(|text| !text.is_empty());
        let synced = record.synced_lyrics.filter(|text| !text.is_empty());

        match (plain, synced) {
            (Some(plain), _) => LyricsView::Plain(plain),
            (None, Some(synced)) if strip_synced_timestamps => {
                LyricsView::Synced(strip_timestamps(&synced))
            }
            (None, Some(synced)) => LyricsView::Synced(synced),
            (None, None) => LyricsView::NoLyrics,
        }
    }

    pub fn to_html(&self) -> String {
        match self {
            LyricsView::Loading => LOADER_HTML.to_string(),
            LyricsView::Plain(text) | LyricsView::Synced(text) => {
                format!("<pre>{}</pre>", escape_html(text))
            }
            LyricsView::NoLyrics => NO_LYRICS_HTML.to_string(),
            LyricsView::NotFound { title, artist } => format!(
                r#"<p class="error">Lyrics not found for "{}" by {}</p>"#,
                escape_html(title),
                escape_html(artist)
            ),
            LyricsView::Failed => FAILURE_HTML.to_string(),
        }
    }
}

/// Everything the panel shows for one song
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub metadata: MetadataView,
    pub lyrics: LyricsView,
}

/// Renders snapshots and looks up their lyrics
pub struct DisplayUpdater<L> {
    lookup: L,
    strip_synced_timestamps: bool,
}

impl<L: LyricsLookup> DisplayUpdater<L> {
    pub fn new(lookup: L, config: &LyricsConfig) -> Self {
        Self {
            lookup,
            strip_synced_timestamps: config.strip_synced_timestamps,
        }
    }

    /// Metadata view with a loading lyrics slot, plus the lookup to run
    pub fn prepare(&self, snapshot: &SongSnapshot) -> (PanelView, LyricsQuery) {
        let title = field_text(Some(&snapshot.song_title), UNKNOWN_TITLE);
        let artist = field_text(Some(&snapshot.artist), UNKNOWN_ARTIST);
        let album = field_text(snapshot.album.as_deref(), UNKNOWN_ALBUM);
        let year = field_text(snapshot.release_year.as_deref(), UNKNOWN_YEAR);

        let (album_html, year_html) = if album == UNKNOWN_ALBUM {
            (String::new(), String::new())
        } else {
            (escape_html(&album), format!("({})", escape_html(&year)))
        };

        let view = PanelView {
            metadata: MetadataView {
                title: escape_html(&title),
                artist: escape_html(&artist),
                album: album_html,
                release_year: year_html,
            },
            lyrics: LyricsView::Loading,
        };
        let query = LyricsQuery::new(&title, &artist, Some(&album));
        (view, query)
    }

    pub async fn lyrics(&self, query: &LyricsQuery) -> LyricsView {
        let result = self.lookup.lookup(query).await;
        let view = LyricsView::from_lookup(result, query, self.strip_synced_timestamps);
        debug!("Lyrics lookup finished for {}", query.track);
        view
    }

    /// Render a snapshot and wait for its lyrics
    pub async fn update(&self, snapshot: &SongSnapshot) -> PanelView {
        let (mut view, query) = self.prepare(snapshot);
        view.lyrics = self.lyrics(&query).await;
        view
    }
}
