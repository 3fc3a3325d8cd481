//! Configuration management for lyricbar.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub page: PageConfig,

    #[serde(default)]
    pub lyrics: LyricsConfig,

    #[serde(default)]
    pub panel: PanelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Quiet period after the last relevant mutation before reading the page
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    /// Delay between attempts to find the player bar
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl TimingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Where the now-playing metadata lives in the page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_player_bar_selector")]
    pub player_bar_selector: String,

    #[serde(default = "default_content_info_selector")]
    pub content_info_selector: String,

    #[serde(default = "default_title_selector")]
    pub title_selector: String,

    #[serde(default = "default_byline_selector")]
    pub byline_selector: String,

    /// Byline child holding the artist
    #[serde(default)]
    pub artist_index: usize,

    /// Byline child holding the album
    #[serde(default = "default_album_index")]
    pub album_index: usize,

    /// Byline child holding the release year
    #[serde(default = "default_year_index")]
    pub year_index: usize,

    /// Attributes whose changes count as mutations
    #[serde(default = "default_attribute_filter")]
    pub attribute_filter: Vec<String>,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            player_bar_selector: default_player_bar_selector(),
            content_info_selector: default_content_info_selector(),
            title_selector: default_title_selector(),
            byline_selector: default_byline_selector(),
            artist_index: 0,
            album_index: default_album_index(),
            year_index: default_year_index(),
            attribute_filter: default_attribute_filter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Lookup endpoint taking track_name/artist_name/album_name
    #[serde(default = "default_lyrics_url")]
    pub base_url: String,

    /// Request timeout. Unset means no timeout.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// Remove `[mm:ss.xx]` tags when falling back to synced lyrics
    #[serde(default)]
    pub strip_synced_timestamps: bool,
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            base_url: default_lyrics_url(),
            timeout_seconds: None,
            strip_synced_timestamps: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// The side panel is only enabled on tabs with this origin
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Panel document shown when enabled
    #[serde(default = "default_panel_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub open_on_action_click: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            path: default_panel_path(),
            open_on_action_click: true,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_debounce() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    500
}

fn default_player_bar_selector() -> String {
    "ytmusic-player-bar[slot]".to_string()
}

fn default_content_info_selector() -> String {
    ".content-info-wrapper".to_string()
}

fn default_title_selector() -> String {
    ".title".to_string()
}

fn default_byline_selector() -> String {
    ".byline".to_string()
}

fn default_album_index() -> usize {
    2
}

fn default_year_index() -> usize {
    4
}

fn default_attribute_filter() -> Vec<String> {
    vec!["title".to_string(), "aria-label".to_string()]
}

fn default_lyrics_url() -> String {
    "https://lrclib.net/api/get".to_string()
}

fn default_origin() -> String {
    "https://music.youtube.com".to_string()
}

fn default_panel_path() -> String {
    "sidepanel.html".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path, falling back to defaults
    pub fn load_from_path(path: PathBuf) -> Self {
        Self::or_defaults(Self::read_from_path(&path), &path)
    }

    /// Read and parse a config file without logging. A missing file is
    /// `Ok(None)`.
    pub fn read_from_path(path: &Path) -> Result<Option<Self>, toml::de::Error> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Resolve a read result, logging which source was used
    pub fn or_defaults(read: Result<Option<Self>, toml::de::Error>, path: &Path) -> Self {
        match read {
            Ok(Some(config)) => {
                info!("Loaded configuration from {:?}", path);
                config
            }
            Ok(None) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                warn!("Failed to parse config file {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lyricbar")
            .join("config.toml")
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
