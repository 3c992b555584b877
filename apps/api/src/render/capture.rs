use std::time::Duration;

use tracing::warn;

use crate::render::browser::{BrowserSession, PdfOptions};
use crate::render::RenderError;

/// Delay before the single retry of a transient capture failure.
pub const RETRY_DELAY: Duration = Duration::from_millis(300);

/// Messages produced when the page or its context is torn down mid-capture.
/// The last one is how `headless_chrome` reports a dropped DevTools connection.
const TRANSIENT_SIGNATURES: [&str; 3] = [
    "target closed",
    "execution context was destroyed",
    "underlying connection is closed",
];

pub fn is_transient(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    TRANSIENT_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

/// Prints the page to PDF, retrying exactly once on a transient failure.
/// An empty result counts as a failure so no partial PDF is ever returned.
pub fn capture_pdf(session: &dyn BrowserSession, options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
    match print_once(session, options) {
        Ok(pdf) => Ok(pdf),
        Err(RenderError::Browser(msg)) if is_transient(&msg) => {
            warn!("PDF capture hit a transient failure, retrying once: {msg}");
            std::thread::sleep(RETRY_DELAY);
            print_once(session, options).map_err(|e| match e {
                RenderError::Browser(msg) if is_transient(&msg) => RenderError::TransientCapture(msg),
                other => other,
            })
        }
        Err(e) => Err(e),
    }
}

fn print_once(session: &dyn BrowserSession, options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
    let pdf = session.print_to_pdf(options)?;
    if pdf.is_empty() {
        return Err(RenderError::Browser("Browser returned an empty PDF".to_string()));
    }
    Ok(pdf)
}
