//! Scripted browser double. Records every call and counts closes so tests
//! can assert ordering and that no session outlives its render.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::render::browser::{BrowserLauncher, BrowserSession, LaunchPlan, PdfOptions};
use crate::render::RenderError;

pub const FAKE_PDF: &[u8] = b"%PDF-1.7\n%fake\n%%EOF";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    InitScript(String),
    EmulatePrint,
    Navigate(String, Duration),
    WaitSelector(String),
    WaitNetworkIdle,
    WaitFunction,
    WaitFonts,
    PrintToPdf,
}

/// How the fake browser behaves. Defaults to everything succeeding.
#[derive(Debug, Clone)]
pub struct FakeScript {
    pub fail_launch: Option<String>,
    pub fail_navigation: Option<String>,
    pub selector_times_out: bool,
    pub network_idle_times_out: bool,
    pub rich_text_times_out: bool,
    pub fonts_fail: bool,
    /// Errors returned by successive print attempts before `pdf_bytes`.
    pub pdf_failures: Vec<String>,
    pub pdf_bytes: Vec<u8>,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            fail_launch: None,
            fail_navigation: None,
            selector_times_out: false,
            network_idle_times_out: false,
            rich_text_times_out: false,
            fonts_fail: false,
            pdf_failures: Vec::new(),
            pdf_bytes: FAKE_PDF.to_vec(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeStats {
    launches: AtomicUsize,
    closes: AtomicUsize,
    pdf_attempts: AtomicUsize,
    calls: Mutex<Vec<Call>>,
    plans: Mutex<Vec<LaunchPlan>>,
}

impl FakeStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn pdf_attempts(&self) -> usize {
        self.pdf_attempts.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn plans(&self) -> Vec<LaunchPlan> {
        self.plans.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[derive(Clone)]
pub struct FakeLauncher {
    script: FakeScript,
    bundled: Option<PathBuf>,
    stats: Arc<FakeStats>,
}

impl FakeLauncher {
    pub fn new(script: FakeScript) -> Self {
        Self {
            script,
            bundled: Some(PathBuf::from("/opt/fake/chromium")),
            stats: Arc::new(FakeStats::default()),
        }
    }

    pub fn without_bundled_browser(mut self) -> Self {
        self.bundled = None;
        self
    }

    pub fn stats(&self) -> Arc<FakeStats> {
        Arc::clone(&self.stats)
    }
}

impl BrowserLauncher for FakeLauncher {
    fn locate_bundled(&self) -> Option<PathBuf> {
        self.bundled.clone()
    }

    fn launch(&self, plan: &LaunchPlan) -> Result<Box<dyn BrowserSession>, RenderError> {
        self.stats.plans.lock().unwrap().push(plan.clone());
        if let Some(msg) = &self.script.fail_launch {
            return Err(RenderError::Browser(msg.clone()));
        }
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct FakeSession {
    script: FakeScript,
    stats: Arc<FakeStats>,
}

fn timed_out(what: &str, timeout: Duration) -> RenderError {
    RenderError::Browser(format!("Waiting for {what} timed out after {}ms", timeout.as_millis()))
}

impl BrowserSession for FakeSession {
    fn add_init_script(&self, source: &str) -> Result<(), RenderError> {
        self.stats.record(Call::InitScript(source.to_string()));
        Ok(())
    }

    fn emulate_print_media(&self) -> Result<(), RenderError> {
        self.stats.record(Call::EmulatePrint);
        Ok(())
    }

    fn navigate(&self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        self.stats.record(Call::Navigate(url.to_string(), timeout));
        match &self.script.fail_navigation {
            Some(msg) => Err(RenderError::Browser(msg.clone())),
            None => Ok(()),
        }
    }

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), RenderError> {
        self.stats.record(Call::WaitSelector(selector.to_string()));
        if self.script.selector_times_out {
            return Err(timed_out(selector, timeout));
        }
        Ok(())
    }

    fn wait_for_network_idle(&self, _idle: Duration, timeout: Duration) -> Result<(), RenderError> {
        self.stats.record(Call::WaitNetworkIdle);
        if self.script.network_idle_times_out {
            return Err(timed_out("network idle", timeout));
        }
        Ok(())
    }

    fn wait_for_function(&self, _predicate: &str, timeout: Duration) -> Result<(), RenderError> {
        self.stats.record(Call::WaitFunction);
        if self.script.rich_text_times_out {
            return Err(timed_out("predicate", timeout));
        }
        Ok(())
    }

    fn wait_for_fonts(&self, _timeout: Duration) -> Result<(), RenderError> {
        self.stats.record(Call::WaitFonts);
        if self.script.fonts_fail {
            return Err(RenderError::Browser("document.fonts is not defined".to_string()));
        }
        Ok(())
    }

    fn print_to_pdf(&self, _options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
        self.stats.record(Call::PrintToPdf);
        let attempt = self.stats.pdf_attempts.fetch_add(1, Ordering::SeqCst);
        match self.script.pdf_failures.get(attempt) {
            Some(msg) => Err(RenderError::Browser(msg.clone())),
            None => Ok(self.script.pdf_bytes.clone()),
        }
    }

    fn close(&mut self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}
