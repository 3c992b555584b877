use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Environment variables checked, in order, for an operator-supplied browser.
pub const EXECUTABLE_ENV_VARS: [&str; 2] = ["PUPPETEER_EXECUTABLE_PATH", "CHROME_PATH"];

const MIB: usize = 1024 * 1024;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Explicit browser executable. `None` means use the auto-resolved browser.
    pub chrome_executable: Option<PathBuf>,
    /// Wall-clock budget shared by navigation, readiness waits and capture.
    pub render_budget: Duration,
    pub avatar_fetch_timeout: Duration,
    /// Largest accepted request body. Documents may carry inline images.
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            rust_log: "info".to_string(),
            chrome_executable: None,
            render_budget: Duration::from_secs(30),
            avatar_fetch_timeout: Duration::from_secs(10),
            max_body_bytes: 32 * MIB,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        Ok(Config {
            port: optional_env("PORT")
                .map(|v| v.parse::<u16>())
                .transpose()
                .context("PORT must be a valid port number")?
                .unwrap_or(defaults.port),
            rust_log: optional_env("RUST_LOG").unwrap_or(defaults.rust_log),
            chrome_executable: executable_override(optional_env),
            render_budget: optional_env("RENDER_BUDGET_SECS")
                .map(|v| v.parse::<u64>().map(Duration::from_secs))
                .transpose()
                .context("RENDER_BUDGET_SECS must be a whole number of seconds")?
                .unwrap_or(defaults.render_budget),
            avatar_fetch_timeout: optional_env("AVATAR_FETCH_TIMEOUT_SECS")
                .map(|v| v.parse::<u64>().map(Duration::from_secs))
                .transpose()
                .context("AVATAR_FETCH_TIMEOUT_SECS must be a whole number of seconds")?
                .unwrap_or(defaults.avatar_fetch_timeout),
            max_body_bytes: optional_env("MAX_BODY_MB")
                .map(|v| v.parse::<usize>().map(|mb| mb * MIB))
                .transpose()
                .context("MAX_BODY_MB must be a whole number of megabytes")?
                .unwrap_or(defaults.max_body_bytes),
        })
    }
}

/// First non-empty value among [`EXECUTABLE_ENV_VARS`].
fn executable_override(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    EXECUTABLE_ENV_VARS
        .iter()
        .find_map(|key| lookup(key))
        .map(PathBuf::from)
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
