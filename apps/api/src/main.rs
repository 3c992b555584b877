mod config;
mod errors;
mod render;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::render::{AvatarInliner, BrowserLauncher, ChromeLauncher, Orchestrator};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PDF render API v{}", env!("CARGO_PKG_VERSION"));

    let launcher = Arc::new(ChromeLauncher);
    match (&config.chrome_executable, launcher.locate_bundled()) {
        (Some(path), _) => info!("Using operator browser at {}", path.display()),
        (None, Some(path)) => info!("Using auto-resolved browser at {}", path.display()),
        // Not fatal: requests answer 503 until a browser appears.
        (None, None) => warn!("No browser executable found; set PUPPETEER_EXECUTABLE_PATH"),
    }

    let inliner = AvatarInliner::new(config.avatar_fetch_timeout)?;
    let state = AppState {
        renderer: Orchestrator::new(launcher, inliner, &config),
        max_body_bytes: config.max_body_bytes,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
