//! Readiness pipeline: bounded waits run between navigation and capture.
//!
//! Each stage narrows the chance of capturing a half-rendered page, but none
//! is allowed to fail the render. The pipeline is an ordered list of
//! [`StagePlan`]s rather than nested fallbacks, so the order and per-stage
//! timeout policy can be inspected and tested directly.
//!
//! Every bound is clamped by a [`Deadline`] shared across the whole render.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::render::browser::BrowserSession;
use crate::render::RenderError;

pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Content container, or the degraded print-mode wrapper.
pub const CONTENT_MARKER_SELECTOR: &str = ".resume-content, .pdf-preview-mode";

/// Truthy once rich-text nodes exist inside the content container.
pub const RICH_TEXT_PREDICATE: &str = r#"(() => {
    const root = document.querySelector('.resume-content');
    if (!root) return false;
    return !!root.querySelector('.ProseMirror, .resume-module p, .resume-module li, .resume-module a, .resume-module span');
})()"#;

/// Time held back from the readiness stages so capture always gets to run.
pub const CAPTURE_RESERVE: Duration = Duration::from_secs(5);

/// What a stage waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    ContentMarker,
    NetworkIdle { idle: Duration },
    RichText,
    Fonts,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ContentMarker => "content-marker",
            Stage::NetworkIdle { .. } => "network-idle",
            Stage::RichText => "rich-text",
            Stage::Fonts => "fonts",
        }
    }
}

/// What to do when a stage times out or errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnTimeout {
    /// Grace period before moving on.
    Pause(Duration),
    Proceed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    pub stage: Stage,
    pub bound: Duration,
    pub on_timeout: OnTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Ready,
    FellBack,
    /// No budget left to even start the wait.
    Skipped,
}

/// The four post-navigation stages, in execution order.
pub fn default_stages() -> Vec<StagePlan> {
    vec![
        StagePlan {
            stage: Stage::ContentMarker,
            bound: Duration::from_secs(20),
            on_timeout: OnTimeout::Pause(Duration::from_millis(500)),
        },
        StagePlan {
            stage: Stage::NetworkIdle {
                idle: Duration::from_millis(300),
            },
            bound: Duration::from_secs(10),
            on_timeout: OnTimeout::Pause(Duration::from_millis(300)),
        },
        StagePlan {
            stage: Stage::RichText,
            bound: Duration::from_secs(30),
            on_timeout: OnTimeout::Proceed,
        },
        StagePlan {
            stage: Stage::Fonts,
            bound: Duration::from_secs(10),
            on_timeout: OnTimeout::Proceed,
        },
    ]
}

/// Wall-clock budget for one render.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// `bound`, shortened to whatever is left before the capture reserve.
    pub fn clamp(&self, bound: Duration) -> Duration {
        bound.min(self.remaining().saturating_sub(CAPTURE_RESERVE))
    }
}

/// Navigates to the print view. Unlike the readiness stages this is fatal.
pub fn navigate(
    session: &dyn BrowserSession,
    url: &str,
    deadline: &Deadline,
) -> Result<(), RenderError> {
    let bound = deadline.clamp(NAVIGATION_TIMEOUT);
    if bound.is_zero() {
        return Err(RenderError::Browser(format!(
            "Navigation timeout: no time left to load {url}"
        )));
    }
    let started = Instant::now();
    session.navigate(url, bound)?;
    debug!("Navigated to {url} in {}ms", started.elapsed().as_millis());
    Ok(())
}

/// Runs `stages` strictly in order. Never fails.
pub fn run_stages(
    session: &dyn BrowserSession,
    stages: &[StagePlan],
    deadline: &Deadline,
) -> Vec<StageOutcome> {
    stages
        .iter()
        .map(|plan| run_stage(session, plan, deadline))
        .collect()
}

fn run_stage(session: &dyn BrowserSession, plan: &StagePlan, deadline: &Deadline) -> StageOutcome {
    let bound = deadline.clamp(plan.bound);
    if bound.is_zero() {
        warn!("Skipping {} wait: render budget exhausted", plan.stage.name());
        return StageOutcome::Skipped;
    }

    let started = Instant::now();
    let result = match &plan.stage {
        Stage::ContentMarker => session.wait_for_selector(CONTENT_MARKER_SELECTOR, bound),
        Stage::NetworkIdle { idle } => session.wait_for_network_idle(*idle, bound),
        Stage::RichText => session.wait_for_function(RICH_TEXT_PREDICATE, bound),
        Stage::Fonts => session.wait_for_fonts(bound),
    };

    match result {
        Ok(()) => {
            debug!(
                "{} ready after {}ms",
                plan.stage.name(),
                started.elapsed().as_millis()
            );
            StageOutcome::Ready
        }
        Err(e) => {
            warn!("{} wait gave up after {}ms: {e}", plan.stage.name(), started.elapsed().as_millis());
            if let OnTimeout::Pause(grace) = plan.on_timeout {
                std::thread::sleep(grace.min(deadline.remaining()));
            }
            StageOutcome::FellBack
        }
    }
}
