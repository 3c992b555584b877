//! Render orchestration: one request, one browser session.
//!
//! # Flow
//! 1. Resolve the browser executable (operator override, then auto-resolved).
//! 2. Inline the avatar so the page never fetches it after navigation.
//! 3. On a blocking thread: launch, seed `sessionStorage`, navigate to
//!    `{origin}/print`, run the readiness stages, capture.
//!
//! The session lives in a [`SessionGuard`], so it is closed on every exit
//! path of step 3, including errors and panics.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::render::browser::{
    resolve_executable, BrowserLauncher, ExecutableSource, LaunchPlan, PdfOptions, SessionGuard,
};
use crate::render::capture::capture_pdf;
use crate::render::document::{session_storage_script, AvatarInliner};
use crate::render::origin::print_url;
use crate::render::readiness::{default_stages, navigate, run_stages, Deadline, StagePlan};
use crate::render::RenderError;

/// One call's worth of input. Never persisted.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub document: Value,
    pub origin: String,
}

/// Owned inputs for the blocking half of a render.
struct RenderJob {
    url: String,
    document: Value,
    executable: ExecutableSource,
}

#[derive(Clone)]
pub struct Orchestrator {
    launcher: Arc<dyn BrowserLauncher>,
    inliner: AvatarInliner,
    executable_override: Option<PathBuf>,
    budget: Duration,
    stages: Arc<Vec<StagePlan>>,
}

impl Orchestrator {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, inliner: AvatarInliner, config: &Config) -> Self {
        Self {
            launcher,
            inliner,
            executable_override: config.chrome_executable.clone(),
            budget: config.render_budget,
            stages: Arc::new(default_stages()),
        }
    }

    pub async fn render_resume_to_pdf(&self, request: RenderRequest) -> Result<Vec<u8>, RenderError> {
        let deadline = Deadline::after(self.budget);
        let executable =
            resolve_executable(self.executable_override.as_deref(), self.launcher.as_ref())?;

        let document = self.inliner.prepare(request.document).await;
        let job = RenderJob {
            url: print_url(&request.origin),
            document,
            executable,
        };

        let this = self.clone();
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            this.render_blocking(job, &deadline)
        })
        .await
        .map_err(|e| RenderError::Browser(format!("Render task failed: {e}")))?
    }

    fn render_blocking(&self, job: RenderJob, deadline: &Deadline) -> Result<Vec<u8>, RenderError> {
        let started = Instant::now();
        let plan = LaunchPlan::for_source(&job.executable);
        info!("Launching browser at {}", plan.executable.display());

        let session = SessionGuard::new(self.launcher.launch(&plan)?);
        session.add_init_script(&session_storage_script(&job.document)?)?;
        session.emulate_print_media()?;

        navigate(&*session, &job.url, deadline)?;
        let outcomes = run_stages(&*session, &self.stages, deadline);
        debug!("Readiness outcomes: {outcomes:?}");

        let pdf = capture_pdf(&*session, &PdfOptions::a4())?;
        info!(
            "Rendered {} byte PDF in {}ms",
            pdf.len(),
            started.elapsed().as_millis()
        );
        Ok(pdf)
    }
}
