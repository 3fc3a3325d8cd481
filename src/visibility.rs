//! Side-panel visibility policy.
//!
//! The panel is enabled only on tabs whose origin is the music site, and is
//! re-evaluated when a tab navigates, when a tab is activated, and for every
//! open tab on browser startup and extension install.

use crate::config::PanelConfig;
use serde::Serialize;
use tracing::{debug, trace};
use url::{Origin, Url};

/// Browser tab as reported by tab events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: u32,
    pub url: Option<String>,
}

impl Tab {
    pub fn new(id: u32, url: &str) -> Self {
        Self {
            id,
            url: Some(url.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TabEvent {
    Updated(Tab),
    Activated(Tab),
    Startup(Vec<Tab>),
    Installed(Vec<Tab>),
}

/// Per-tab side-panel options to apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelOptions {
    pub tab_id: u32,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelBehavior {
    pub open_panel_on_action_click: bool,
}

pub struct SidePanelPolicy {
    origin: Origin,
    path: String,
    behavior: PanelBehavior,
}

impl SidePanelPolicy {
    pub fn new(config: &PanelConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            origin: Url::parse(&config.origin)?.origin(),
            path: config.path.clone(),
            behavior: PanelBehavior {
                open_panel_on_action_click: config.open_on_action_click,
            },
        })
    }

    pub fn behavior(&self) -> PanelBehavior {
        self.behavior
    }

    /// Options for one tab. Tabs without a usable URL are left alone.
    pub fn options_for(&self, tab: &Tab) -> Option<PanelOptions> {
        let raw = tab.url.as_deref()?;
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                debug!("Tab {} has unparsable URL {:?}: {}", tab.id, raw, e);
                return None;
            }
        };

        let enabled = url.origin() == self.origin;
        trace!("Tab {} origin match: {}", tab.id, enabled);

        Some(PanelOptions {
            tab_id: tab.id,
            enabled,
            path: enabled.then(|| self.path.clone()),
        })
    }

    pub fn apply(&self, event: &TabEvent) -> Vec<PanelOptions> {
        match event {
            TabEvent::Updated(tab) | TabEvent::Activated(tab) => {
                self.options_for(tab).into_iter().collect()
            }
            TabEvent::Startup(tabs) | TabEvent::Installed(tabs) => {
                tabs.iter().filter_map(|tab| self.options_for(tab)).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SidePanelPolicy {
        SidePanelPolicy::new(&PanelConfig::default()).unwrap()
    }

    #[test]
    fn test_enabled_on_music_site() {
        let options = policy()
            .options_for(&Tab::new(1, "https://music.youtube.com/watch?v=abc"))
            .unwrap();
        assert_eq!(
            options,
            PanelOptions {
                tab_id: 1,
                enabled: true,
                path: Some("sidepanel.html".to_string()),
            }
        );
    }

    #[test]
    fn test_disabled_elsewhere() {
        let policy = policy();
        for url in [
            "https://www.youtube.com/watch?v=abc",
            "http://music.youtube.com/",
            "https://music.youtube.com.evil.example/",
            "chrome://newtab/",
        ] {
            let options = policy.options_for(&Tab::new(2, url)).unwrap();
            assert!(!options.enabled, "{} should be disabled", url);
            assert_eq!(options.path, None);
        }
    }

    #[test]
    fn test_tab_without_url_is_skipped() {
        let tab = Tab { id: 3, url: None };
        assert_eq!(policy().options_for(&tab), None);
        assert_eq!(policy().options_for(&Tab::new(4, "not a url")), None);
    }

    #[test]
    fn test_startup_evaluates_all_tabs() {
        let tabs = vec![
            Tab::new(1, "https://music.youtube.com/"),
            Tab { id: 2, url: None },
            Tab::new(3, "https://example.com/"),
        ];
        let applied = policy().apply(&TabEvent::Startup(tabs.clone()));
        assert_eq!(applied.len(), 2);
        assert!(applied[0].enabled);
        assert!(!applied[1].enabled);

        assert_eq!(policy().apply(&TabEvent::Installed(tabs)), applied);
    }

    #[test]
    fn test_options_wire_format() {
        let options = policy().options_for(&Tab::new(9, "https://example.com/")).unwrap();
        assert_eq!(
            serde_json::to_value(options).unwrap(),
            serde_json::json!({"tabId": 9, "enabled": false})
        );
        assert!(policy().behavior().open_panel_on_action_click);
    }
}
