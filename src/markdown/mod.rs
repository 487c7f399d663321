//! Markdown to sanitized HTML pipeline.
//!
//! Text is processed in three fixed steps:
//!
//! 1. [`complete_markdown`] closes constructs left open by a truncated stream
//! 2. [`markdown_to_html`] converts the repaired markdown
//! 3. [`sanitize_html`] restricts the result to the allow-list
//!
//! [`process_markdown`] runs all three and is what every render path uses.
//!
//! # Example
//!
//! ```rust
//! use markdown_stream_wc::markdown::process_markdown;
//!
//! assert_eq!(process_markdown("**bold**"), "<p><strong>bold</strong></p>");
//! assert_eq!(process_markdown("<img src=x onerror=alert(1)>hi"), "<p>hi</p>");
//! ```

mod completion;
mod convert;
mod sanitize;

pub use completion::complete_markdown;
pub use convert::markdown_to_html;
pub use sanitize::{ALLOWED_ATTRIBUTES, ALLOWED_TAGS, sanitize_html};

/// Render markdown (complete or partial) to sanitized HTML.
///
/// Trailing whitespace emitted by the converter is trimmed. Empty input
/// renders to the empty string.
pub fn process_markdown(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let completed = complete_markdown(text);
    let html = markdown_to_html(&completed);
    let mut sanitized = sanitize_html(&html);

    let trimmed = sanitized.trim_end().len();
    sanitized.truncate(trimmed);
    sanitized
}
