//! Markdown to HTML conversion.

use pulldown_cmark::{Options, Parser, html};

/// Parser extensions enabled for chat content.
fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options
}

/// Convert markdown to HTML.
///
/// Covers the CommonMark block and inline set plus tables and
/// strikethrough. The output is not safe to insert as-is: raw HTML in the
/// source passes straight through and must go through
/// [`sanitize_html`](super::sanitize_html).
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, options());

    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, parser);
    html_output
}
