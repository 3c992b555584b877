//! Chrome DevTools Protocol adapter (uses the `headless_chrome` crate).
//!
//! All calls block; callers run them on a blocking thread.

use std::ffi::OsStr;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use serde_json::Value;
use tracing::{debug, warn};

use crate::render::browser::{BrowserLauncher, BrowserSession, LaunchPlan, PdfOptions};
use crate::render::RenderError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Upper bound on a single CDP command outside the readiness waits.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// Keeps the driver from dropping the connection during long readiness waits.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(120);

/// Truthy once the new document (not the initial `about:blank`) has parsed.
const DOM_CONTENT_LOADED: &str =
    "location.href !== 'about:blank' && document.readyState !== 'loading'";
const RESOURCE_COUNT: &str = "performance.getEntriesByType('resource').length";
const FONTS_READY: &str =
    "document.fonts && document.fonts.ready ? document.fonts.ready.then(() => true) : true";

fn browser_error(context: &str, e: impl Display) -> RenderError {
    RenderError::Browser(format!("{context}: {e}"))
}

/// Launches real Chrome/Chromium processes.
pub struct ChromeLauncher;

impl BrowserLauncher for ChromeLauncher {
    fn locate_bundled(&self) -> Option<PathBuf> {
        match headless_chrome::browser::default_executable() {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("No auto-resolved browser: {e}");
                None
            }
        }
    }

    fn launch(&self, plan: &LaunchPlan) -> Result<Box<dyn BrowserSession>, RenderError> {
        let args: Vec<&OsStr> = plan.extra_args.iter().map(|a| OsStr::new(a.as_str())).collect();

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(plan.sandbox)
            .path(Some(plan.executable.clone()))
            .window_size(Some(plan.window_size))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(args)
            .build()
            .map_err(|e| browser_error("Failed to build launch options", e))?;

        let browser =
            Browser::new(launch_options).map_err(|e| browser_error("Failed to launch browser", e))?;
        let tab = browser
            .new_tab()
            .map_err(|e| browser_error("Failed to create tab", e))?;
        tab.set_default_timeout(COMMAND_TIMEOUT);

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab,
        }))
    }
}

/// A browser process and the single tab used for the print view.
pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromeSession {
    fn evaluate(&self, expression: &str, await_promise: bool) -> Result<Option<Value>, RenderError> {
        self.tab
            .evaluate(expression, await_promise)
            .map(|remote| remote.value)
            .map_err(|e| browser_error("Evaluation failed", e))
    }

    /// Polls `expression` until truthy. Evaluation errors (the context is
    /// often torn down mid-navigation) count as "not yet".
    fn poll_until(&self, expression: &str, timeout: Duration) -> Result<(), RenderError> {
        let started = Instant::now();
        let mut last_error = None;
        while started.elapsed() < timeout {
            match self.evaluate(expression, false) {
                Ok(value) if is_truthy(value.as_ref()) => return Ok(()),
                Ok(_) => {}
                Err(e) => last_error = Some(e),
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        Err(RenderError::Browser(match last_error {
            Some(e) => format!("Waiting failed: {}ms exceeded ({e})", timeout.as_millis()),
            None => format!("Waiting failed: {}ms exceeded", timeout.as_millis()),
        }))
    }
}

/// Resolves once `sample` has returned the same count for `idle`. Sampling
/// errors reset the quiet window instead of ending the wait.
fn wait_for_quiet(
    mut sample: impl FnMut() -> Result<Option<u64>, RenderError>,
    idle: Duration,
    timeout: Duration,
) -> Result<(), RenderError> {
    let started = Instant::now();
    let mut last_count = None;
    let mut last_error = None;
    let mut quiet_since = Instant::now();
    while started.elapsed() < timeout {
        match sample() {
            Ok(count) if count != last_count => {
                last_count = count;
                quiet_since = Instant::now();
            }
            Ok(_) if quiet_since.elapsed() >= idle => return Ok(()),
            Ok(_) => {}
            Err(e) => {
                last_error = Some(e);
                last_count = None;
                quiet_since = Instant::now();
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    Err(RenderError::Browser(match last_error {
        Some(e) => format!("Timed out after {}ms waiting for network idle ({e})", timeout.as_millis()),
        None => format!("Timed out after {}ms waiting for network idle", timeout.as_millis()),
    }))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

impl BrowserSession for ChromeSession {
    fn add_init_script(&self, source: &str) -> Result<(), RenderError> {
        self.tab
            .call_method(Page::AddScriptToEvaluateOnNewDocument {
                source: source.to_string(),
                world_name: None,
                include_command_line_api: None,
                run_immediately: None,
            })
            .map(|_| ())
            .map_err(|e| browser_error("Failed to inject document", e))
    }

    fn emulate_print_media(&self) -> Result<(), RenderError> {
        self.tab
            .call_method(Emulation::SetEmulatedMedia {
                media: Some("print".to_string()),
                features: None,
            })
            .map(|_| ())
            .map_err(|e| browser_error("Failed to emulate print media", e))
    }

    fn navigate(&self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| browser_error("Navigation failed", e))?;
        self.poll_until(DOM_CONTENT_LOADED, timeout)
            .map_err(|e| RenderError::Browser(format!("Navigation timeout for {url}: {e}")))
    }

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), RenderError> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|e| browser_error(&format!("Waiting for selector `{selector}` failed"), e))
    }

    fn wait_for_network_idle(&self, idle: Duration, timeout: Duration) -> Result<(), RenderError> {
        wait_for_quiet(
            || Ok(self.evaluate(RESOURCE_COUNT, false)?.and_then(|v| v.as_u64())),
            idle,
            timeout,
        )
    }

    fn wait_for_function(&self, predicate: &str, timeout: Duration) -> Result<(), RenderError> {
        self.poll_until(predicate, timeout)
    }

    fn wait_for_fonts(&self, timeout: Duration) -> Result<(), RenderError> {
        self.tab.set_default_timeout(timeout);
        let result = self.evaluate(FONTS_READY, true).map(|_| ());
        self.tab.set_default_timeout(COMMAND_TIMEOUT);
        result
    }

    fn print_to_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
        let pdf_options = PrintToPdfOptions {
            paper_width: Some(options.paper_width_in),
            paper_height: Some(options.paper_height_in),
            print_background: Some(options.print_background),
            display_header_footer: Some(options.display_header_footer),
            prefer_css_page_size: Some(options.prefer_css_page_size),
            ..Default::default()
        };
        self.tab
            .print_to_pdf(Some(pdf_options))
            .map_err(|e| browser_error("PDF capture failed", e))
    }

    fn close(&mut self) {
        if let Err(e) = self.tab.close(false) {
            warn!("Failed to close tab cleanly: {e}");
        }
        // Dropping the browser terminates the child process.
        drop(self.browser.take());
        debug!("Browser session closed");
    }
}
