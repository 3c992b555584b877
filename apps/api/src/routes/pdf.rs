//! Axum route handlers for PDF export.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, OriginalUri, Path, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, Uri,
    },
    response::{IntoResponse, Response},
};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::render::{extract_document, resolve_origin, RenderRequest};
use crate::state::AppState;

pub const DEFAULT_FILENAME: &str = "resume.pdf";

/// POST /api/pdf
pub async fn handle_render_pdf(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    render(&state, &uri, &headers, &body?, DEFAULT_FILENAME.to_string()).await
}

/// POST /api/pdf/:filename
pub async fn handle_render_named_pdf(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    render(&state, &uri, &headers, &body?, sanitize_filename(&filename)).await
}

async fn render(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
    filename: String,
) -> Result<Response, AppError> {
    let render_id = Uuid::new_v4();
    async move {
        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let document = extract_document(content_type, body)?;
        let origin = resolve_origin(uri, headers)?;
        info!("Rendering resume through {origin}");

        let pdf = state
            .renderer
            .render_resume_to_pdf(RenderRequest { document, origin })
            .await?;
        Ok(pdf_response(pdf, &filename))
    }
    .instrument(info_span!("render", %render_id))
    .await
}

fn pdf_response(pdf: Vec<u8>, filename: &str) -> Response {
    (
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, format!("inline; filename=\"{filename}\"")),
            (CACHE_CONTROL, "no-store".to_string()),
        ],
        pdf,
    )
        .into_response()
}

/// Reduces a path segment to a header-safe `*.pdf` filename.
pub fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        return DEFAULT_FILENAME.to_string();
    }
    if cleaned.to_ascii_lowercase().ends_with(".pdf") {
        cleaned
    } else {
        format!("{cleaned}.pdf")
    }
}
