//! Page-context wiring.
//!
//! Answers pull requests from the side panel and runs the change detector
//! that pushes song changes to it.

use crate::change_detector::{ChangeDetector, DetectorHandle};
use crate::config::Config;
use crate::dom::Page;
use crate::extractor::DomExtractor;
use crate::messaging::{ContentPort, ExtensionMessage, ExtensionRuntime, PendingPull, PullResponse};
use crate::types::ExtractionError;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

/// Pull-request listener for one page
pub struct ContentScript {
    page: Page,
    extractor: DomExtractor,
    port: ContentPort,
}

impl ContentScript {
    pub fn new(page: Page, extractor: DomExtractor, runtime: &ExtensionRuntime) -> Self {
        Self {
            page,
            extractor,
            port: runtime.connect_content(),
        }
    }

    /// Current pull response for the page
    pub fn current(&self) -> PullResponse {
        let result = self.extractor.extract_from(&self.page);
        if let Err(ExtractionError::Internal(message)) = &result {
            error!("Error getting DOM elements: {}", message);
        }
        PullResponse::from(result)
    }

    /// Answer one request. Requests other than `getDOMElement` get no reply.
    pub fn respond(&self, pending: PendingPull) {
        if pending.message != ExtensionMessage::GetDomElement {
            trace!("Ignoring message on pull channel: {:?}", pending.message);
            return;
        }
        if !pending.respond(self.current()) {
            debug!("Requester went away before the response");
        }
    }

    /// Serve requests until the runtime drops this context
    pub async fn serve(mut self) {
        while let Some(pending) = self.port.recv().await {
            self.respond(pending);
        }
        debug!("Content port closed");
    }
}

/// Tasks running in the page context
pub struct ContentHandles {
    pub detector: DetectorHandle,
    pub listener: JoinHandle<()>,
}

impl ContentHandles {
    pub fn abort(&self) {
        self.detector.abort();
        self.listener.abort();
    }
}

/// Start the pull listener and the change detector for a page
pub fn launch(page: Page, runtime: &ExtensionRuntime, config: &Config) -> ContentHandles {
    let extractor = DomExtractor::new(config.page.clone());
    let script = ContentScript::new(page.clone(), extractor.clone(), runtime);
    let listener = tokio::spawn(script.serve());
    let detector =
        ChangeDetector::new(page, extractor, &config.timing, runtime.messenger()).spawn();

    ContentHandles { detector, listener }
}
