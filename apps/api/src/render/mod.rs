// Resume PDF rendering: drives a headless browser to the `/print` view and
// captures its paginated output.
// The browser driver is synchronous; everything that touches a session runs
// inside tokio::task::spawn_blocking.

pub mod browser;
pub mod capture;
pub mod chrome;
pub mod document;
pub mod orchestrator;
pub mod origin;
pub mod readiness;

#[cfg(test)]
pub mod testing;

use thiserror::Error;

pub use browser::BrowserLauncher;
pub use chrome::ChromeLauncher;
pub use document::{extract_document, AvatarInliner};
pub use orchestrator::{Orchestrator, RenderRequest};
pub use origin::resolve_origin;

/// Failures produced while turning a resume document into PDF bytes.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Missing resumeData")]
    MissingDocument,

    #[error("Cannot resolve origin")]
    UnresolvableOrigin,

    #[error("Chromium executable not found (set PUPPETEER_EXECUTABLE_PATH)")]
    ExecutableNotFound,

    /// Capture raced page teardown. Retried once before surfacing.
    #[error("{0}")]
    TransientCapture(String),

    #[error("{0}")]
    Browser(String),
}
