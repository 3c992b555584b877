//! Browser seam: everything the orchestrator needs from a headless browser.
//!
//! `ChromeLauncher` is the production implementation. Tests substitute a
//! scripted double, so every method here is a suspension point the
//! orchestrator can observe.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::render::RenderError;

/// Viewport used for the print view.
pub const WINDOW_SIZE: (u32, u32) = (1200, 1600);

/// Flags for an operator-supplied browser. The host is expected to be
/// sandboxed already (typically a container).
pub const SYSTEM_BROWSER_ARGS: [&str; 4] = [
    "--headless=new",
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
];

/// Where the browser binary came from. The two paths need different flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutableSource {
    /// Set by the operator through the environment.
    System(PathBuf),
    /// Found by the driver's own executable search.
    Bundled(PathBuf),
}

/// Everything needed to start one browser process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub executable: PathBuf,
    /// Appended to the driver's default arguments.
    pub extra_args: Vec<String>,
    pub sandbox: bool,
    pub window_size: (u32, u32),
}

impl LaunchPlan {
    pub fn for_source(source: &ExecutableSource) -> Self {
        match source {
            ExecutableSource::System(path) => LaunchPlan {
                executable: path.clone(),
                extra_args: SYSTEM_BROWSER_ARGS.iter().map(|a| a.to_string()).collect(),
                sandbox: false,
                window_size: WINDOW_SIZE,
            },
            ExecutableSource::Bundled(path) => LaunchPlan {
                executable: path.clone(),
                extra_args: Vec::new(),
                sandbox: true,
                window_size: WINDOW_SIZE,
            },
        }
    }
}

/// Paper and layout settings for page-to-PDF conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub print_background: bool,
    pub display_header_footer: bool,
    /// Let `@page` rules decide margins so they are not applied twice.
    pub prefer_css_page_size: bool,
}

impl PdfOptions {
    pub fn a4() -> Self {
        Self {
            paper_width_in: 8.27,
            paper_height_in: 11.69,
            print_background: true,
            display_header_footer: false,
            prefer_css_page_size: true,
        }
    }
}

/// Starts browser processes.
pub trait BrowserLauncher: Send + Sync {
    /// Auto-resolved executable, if the host has one.
    fn locate_bundled(&self) -> Option<PathBuf>;

    /// Starts a browser and opens one page in it.
    fn launch(&self, plan: &LaunchPlan) -> Result<Box<dyn BrowserSession>, RenderError>;
}

/// One browser process plus one page, owned by a single render.
pub trait BrowserSession: Send {
    /// Runs `source` in every new document before any page script.
    fn add_init_script(&self, source: &str) -> Result<(), RenderError>;

    fn emulate_print_media(&self) -> Result<(), RenderError>;

    /// Navigates and waits for DOMContentLoaded.
    fn navigate(&self, url: &str, timeout: Duration) -> Result<(), RenderError>;

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), RenderError>;

    /// Resolves once no new network activity was seen for `idle`.
    fn wait_for_network_idle(&self, idle: Duration, timeout: Duration) -> Result<(), RenderError>;

    /// Polls a JS expression until it evaluates truthy.
    fn wait_for_function(&self, predicate: &str, timeout: Duration) -> Result<(), RenderError>;

    /// Awaits `document.fonts.ready` where the page exposes it.
    fn wait_for_fonts(&self, timeout: Duration) -> Result<(), RenderError>;

    fn print_to_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, RenderError>;

    /// Terminates the page and the process. Called exactly once.
    fn close(&mut self);
}

/// Picks the browser to launch: operator override first, then the auto-resolved one.
pub fn resolve_executable(
    override_path: Option<&Path>,
    launcher: &dyn BrowserLauncher,
) -> Result<ExecutableSource, RenderError> {
    if let Some(path) = override_path {
        return Ok(ExecutableSource::System(path.to_path_buf()));
    }
    launcher
        .locate_bundled()
        .map(ExecutableSource::Bundled)
        .ok_or(RenderError::ExecutableNotFound)
}

/// Owns a session and closes it when dropped, whatever the exit path.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self {
            session: Some(session),
        }
    }
}

impl Deref for SessionGuard {
    type Target = dyn BrowserSession;

    fn deref(&self) -> &Self::Target {
        // Only `Drop` empties the slot.
        match &self.session {
            Some(session) => session.as_ref(),
            None => unreachable!("session accessed after close"),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }
}
