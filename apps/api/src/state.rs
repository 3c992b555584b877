use crate::render::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the browser launcher. Tests swap in a scripted double.
    pub renderer: Orchestrator,
    /// Request body cap applied by the router.
    pub max_body_bytes: usize,
}
