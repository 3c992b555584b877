//! Resume document intake and preparation.
//!
//! The document itself is opaque JSON owned by the UI layer. This module only
//! locates it inside the request body and rewrites the `avatar` field so the
//! headless browser never has to fetch it after navigation starts.

use std::time::Duration;

use base64::Engine as _;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::render::RenderError;

/// Field holding the document when the body is an envelope.
pub const DOCUMENT_FIELD: &str = "resumeData";
/// Field rewritten by [`AvatarInliner::prepare`].
pub const AVATAR_FIELD: &str = "avatar";
/// `sessionStorage` key read by the print view on first paint.
pub const SESSION_STORAGE_KEY: &str = "resumeData";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Locates the resume document in a request body.
///
/// JSON bodies may be `{ "resumeData": <doc> }` or the document itself.
/// Form bodies carry the JSON-encoded document in a `resumeData` field.
/// Anything unparseable, or a falsy document, is reported as missing.
pub fn extract_document(content_type: Option<&str>, body: &[u8]) -> Result<Value, RenderError> {
    let is_form = content_type
        .map(|ct| ct.trim_start().starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let parsed = if is_form {
        url::form_urlencoded::parse(body)
            .find(|(key, _)| key == DOCUMENT_FIELD)
            .and_then(|(_, value)| serde_json::from_str::<Value>(&value).ok())
    } else {
        serde_json::from_slice::<Value>(body)
            .ok()
            .map(|body| match body.get(DOCUMENT_FIELD) {
                Some(doc) if !doc.is_null() => doc.clone(),
                _ => body,
            })
    };

    let document = parsed.ok_or(RenderError::MissingDocument)?;

    if is_truthy(&document) {
        Ok(document)
    } else {
        Err(RenderError::MissingDocument)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn has_prefix_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Rewrites remote image references into self-contained data URLs.
#[derive(Clone)]
pub struct AvatarInliner {
    client: Client,
}

impl AvatarInliner {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Resolves one URL-like reference.
    ///
    /// - `data:` passes through untouched.
    /// - `blob:` handles belong to the originating tab and yield `None`.
    /// - Anything that is not `http(s)` (relative, same-origin) passes through.
    /// - `http(s)` is fetched once; failures fall back to the original URL.
    pub async fn to_data_url_if_remote(&self, url: &str) -> Option<String> {
        if has_prefix_ignore_case(url, "data:") {
            return Some(url.to_string());
        }
        if has_prefix_ignore_case(url, "blob:") {
            return None;
        }
        if !(has_prefix_ignore_case(url, "http://") || has_prefix_ignore_case(url, "https://")) {
            return Some(url.to_string());
        }

        match self.fetch_as_data_url(url).await {
            Ok(data_url) => Some(data_url),
            Err(e) => {
                warn!("Avatar fetch failed, leaving URL for the print view: {e}");
                Some(url.to_string())
            }
        }
    }

    async fn fetch_as_data_url(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?;
        debug!("Inlined avatar ({} bytes, {content_type})", bytes.len());
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok(format!("data:{content_type};base64,{encoded}"))
    }

    /// Produces the document handed to the print view. Only a non-empty string
    /// `avatar` on an object document is touched; an unresolvable one is removed.
    pub async fn prepare(&self, mut document: Value) -> Value {
        let avatar = match document.get(AVATAR_FIELD) {
            Some(Value::String(url)) if !url.is_empty() => url.clone(),
            _ => return document,
        };

        let resolved = self.to_data_url_if_remote(&avatar).await;
        if let Some(fields) = document.as_object_mut() {
            match resolved {
                Some(url) => {
                    fields.insert(AVATAR_FIELD.to_string(), Value::String(url));
                }
                None => {
                    fields.remove(AVATAR_FIELD);
                }
            }
        }
        document
    }
}

/// Script installed before any page script runs. It seeds `sessionStorage`
/// with the prepared document and swallows storage errors.
pub fn session_storage_script(document: &Value) -> Result<String, RenderError> {
    let encode = |e: serde_json::Error| RenderError::Browser(format!("Cannot encode resumeData: {e}"));
    let serialized = serde_json::to_string(document).map_err(encode)?;
    // A JSON string literal is also a valid JS string literal.
    let literal = serde_json::to_string(&serialized).map_err(encode)?;
    let key = serde_json::to_string(SESSION_STORAGE_KEY).map_err(encode)?;
    Ok(format!(
        "(() => {{ try {{ window.sessionStorage.setItem({key}, {literal}); }} catch (e) {{}} }})();"
    ))
}
