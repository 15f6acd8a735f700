//! Markup to plain text for event bodies.

use tracing::debug;

/// Wide enough that html2text never wraps a body line.
const RENDER_WIDTH: usize = 4096;

/// Render body markup as plain text, trimmed. Link targets are not part of
/// the output, only the link text is.
pub fn strip_html(markup: &str) -> String {
    if markup.trim().is_empty() {
        return String::new();
    }

    match html2text::config::plain_no_decorate().string_from_read(markup.as_bytes(), RENDER_WIDTH) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            debug!(error = %e, "Could not render event body; treating it as empty");
            String::new()
        }
    }
}
