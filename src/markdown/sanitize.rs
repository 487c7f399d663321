//! HTML sanitization.
//!
//! This is the only XSS boundary between model output and the document.
//! Every HTML string the crate publishes has been through
//! [`sanitize_html`]; nothing else is trusted.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use ammonia::Builder;

/// Elements that survive sanitization.
pub const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "em", "code", "pre", "blockquote", "ul", "ol", "li", "a", "h1", "h2",
    "h3", "h4", "h5", "h6", "table", "thead", "tbody", "tr", "th", "td", "hr", "del", "s", "sup",
    "sub",
];

/// Attributes that survive sanitization, on any allowed element.
pub const ALLOWED_ATTRIBUTES: &[&str] = &["href", "target", "rel", "class"];

/// Elements removed together with everything inside them.
const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "noscript", "template", "textarea", "title", "object",
];

static SANITIZER: LazyLock<Builder<'static>> = LazyLock::new(|| {
    let mut builder = Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect::<HashSet<_>>())
        .clean_content_tags(DROPPED_WITH_CONTENT.iter().copied().collect::<HashSet<_>>())
        .tag_attributes(HashMap::new())
        .generic_attributes(ALLOWED_ATTRIBUTES.iter().copied().collect::<HashSet<_>>())
        // `rel` is an allowed attribute, so ammonia must not manage it.
        .link_rel(None)
        .strip_comments(true);
    builder
});

/// Restrict `html` to the allow-listed tags and attributes.
///
/// Disallowed elements are unwrapped (their safe children are kept), except
/// for script-like elements which are dropped with their content. Link
/// targets with unsafe schemes such as `javascript:` lose their `href`.
/// Never fails; idempotent.
pub fn sanitize_html(html: &str) -> String {
    SANITIZER.clean(html).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_markup_is_unchanged() {
        let html = "<p><strong>bold</strong> and <a href=\"https://example.com\" target=\"_blank\" rel=\"noopener\">link</a></p>";
        assert_eq!(sanitize_html(html), html);
    }

    #[test]
    fn test_script_removed_with_content() {
        let out = sanitize_html("<p>before</p><script>alert(1)</script><p>after</p>");
        assert!(!out.contains("script"));
        assert!(!out.contains("alert"));
        assert_eq!(out, "<p>before</p><p>after</p>");
    }

    #[test]
    fn test_disallowed_element_unwrapped() {
        let out = sanitize_html("<div><span>kept</span></div>");
        assert_eq!(out, "kept");
    }

    #[test]
    fn test_image_and_event_handlers_removed() {
        let out = sanitize_html("<p><img src=x onerror=alert(1)>hi</p>");
        assert!(!out.contains("img"));
        assert!(!out.contains("onerror"));
        assert_eq!(out, "<p>hi</p>");
    }

    #[test]
    fn test_disallowed_attributes_removed() {
        let out = sanitize_html("<p style=\"color:red\" onclick=\"x()\" class=\"note\">t</p>");
        assert_eq!(out, "<p class=\"note\">t</p>");
    }

    #[test]
    fn test_javascript_href_removed() {
        let out = sanitize_html("<a href=\"javascript:alert(1)\">x</a>");
        assert!(!out.contains("javascript"));
        assert!(out.contains(">x</a>"));
    }

    #[test]
    fn test_code_block_class_kept() {
        let html = "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>";
        assert_eq!(sanitize_html(html), html);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<p>plain</p>",
            "<div onclick=x><b>bold</b><script>bad()</script><a href=\"/x\" id=y>ok</a></div>",
            "<table><thead><tr><th style=\"text-align: left\">a</th></tr></thead></table>",
            "<p>1 &lt; 2 &amp;&amp; 3 &gt; 2</p><!-- comment -->",
        ];
        for input in inputs {
            let once = sanitize_html(input);
            assert_eq!(sanitize_html(&once), once, "input: {input}");
        }
    }

    #[test]
    fn test_comments_stripped() {
        assert_eq!(sanitize_html("<p>a<!-- hidden --></p>"), "<p>a</p>");
    }
}
