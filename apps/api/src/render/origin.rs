use axum::http::{HeaderMap, Uri};

use crate::render::RenderError;

/// Path of the same-origin print view the browser is sent to.
pub const PRINT_PATH: &str = "/print";

/// Derives `scheme://host[:port]` for the inbound request.
///
/// An absolute request URI wins. Otherwise the forwarded headers are used,
/// falling back to `scheme`/`host`, each taking the first comma-separated
/// value. Scheme defaults to `http`; a missing host is an error.
pub fn resolve_origin(uri: &Uri, headers: &HeaderMap) -> Result<String, RenderError> {
    if let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) {
        return Ok(format!("{scheme}://{authority}"));
    }

    let proto = first_header_value(headers, &["x-forwarded-proto", "scheme"])
        .unwrap_or_else(|| "http".to_string());
    let host = first_header_value(headers, &["x-forwarded-host", "host"])
        .ok_or(RenderError::UnresolvableOrigin)?;

    Ok(format!("{proto}://{host}"))
}

pub fn print_url(origin: &str) -> String {
    format!("{}{PRINT_PATH}", origin.trim_end_matches('/'))
}

/// Value of the first header in `names` that is present and non-empty,
/// reduced to its first comma-separated element.
fn first_header_value(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .find(|value| !value.is_empty())
        .and_then(|value| value.split(',').next())
        .map(|first| first.trim().to_string())
        .filter(|first| !first.is_empty())
}
