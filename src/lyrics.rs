//! Lyrics provider client.
//!
//! Lookups go to an LRCLIB-compatible `GET /api/get` endpoint keyed on track
//! name, artist name and, when known, album name. A 404 means the provider
//! has no entry for the song and is reported as `LyricsError::NotFound`.

use crate::config::LyricsConfig;
use crate::types::{LyricsError, UNKNOWN_ALBUM};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

lazy_static! {
    // [mm:ss], [mm:ss.xx] or [mm:ss:xx] line tags in synced lyrics
    static ref TIMESTAMP: Regex = Regex::new(r"\[\d{1,3}:\d{2}(?:[.:]\d{1,3})?\] ?").unwrap();
}

/// Lookup key for one song
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsQuery {
    pub track: String,
    pub artist: String,
    pub album: Option<String>,
}

impl LyricsQuery {
    /// Build a query. Blank albums and the unknown-album placeholder are
    /// left out of the lookup.
    pub fn new(track: &str, artist: &str, album: Option<&str>) -> Self {
        let album = album
            .map(str::trim)
            .filter(|album| !album.is_empty() && *album != UNKNOWN_ALBUM)
            .map(str::to_string);
        Self {
            track: track.to_string(),
            artist: artist.to_string(),
            album,
        }
    }
}

/// Provider response body
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsRecord {
    #[serde(default)]
    pub plain_lyrics: Option<String>,
    #[serde(default)]
    pub synced_lyrics: Option<String>,
}

/// Source of lyrics for the display
#[async_trait::async_trait]
pub trait LyricsLookup: Send + Sync {
    async fn lookup(&self, query: &LyricsQuery) -> Result<LyricsRecord, LyricsError>;
}

/// HTTP client for the LRCLIB API
pub struct LrclibClient {
    client: reqwest::Client,
    base_url: Url,
}

impl LrclibClient {
    pub fn new(config: &LyricsConfig) -> Result<Self, LyricsError> {
        let base_url = Url::parse(&config.base_url)?;

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| LyricsError::Request(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Full lookup URL for a query
    pub fn request_url(&self, query: &LyricsQuery) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("track_name", &query.track);
            pairs.append_pair("artist_name", &query.artist);
            if let Some(album) = &query.album {
                pairs.append_pair("album_name", album);
            }
        }
        url
    }
}

#[async_trait::async_trait]
impl LyricsLookup for LrclibClient {
    async fn lookup(&self, query: &LyricsQuery) -> Result<LyricsRecord, LyricsError> {
        let url = self.request_url(query);
        debug!("Fetching lyrics: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(LyricsError::NotFound);
        }
        if !status.is_success() {
            return Err(LyricsError::Status(status.as_u16()));
        }

        response
            .json::<LyricsRecord>()
            .await
            .map_err(|e| LyricsError::Decode(e.to_string()))
    }
}

/// Remove line timestamps from synced lyrics
pub fn strip_timestamps(synced: &str) -> String {
    TIMESTAMP.replace_all(synced, "").into_owned()
}
