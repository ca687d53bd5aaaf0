//! HTML cleanup for article bodies.
//!
//! Blogger's rich-text editor leaves a recognisable set of artifacts in the
//! HTML it publishes (escaped-attribute prefixes, Word paragraph markers,
//! empty spans, `<div><br></div>` spacers). [`clean_editor_html`] removes
//! those while keeping the markup renderable. [`preview`] goes further and
//! produces the flat, single-line text shown in article lists.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use super::text::{compact_newlines, replace_newlines, truncate_chars};

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static ESCAPED_ATTRIBUTE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)data-blogger-escaped-").expect("valid regex"));
static OFFICE_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?o:p>").expect("valid regex"));
static EMPTY_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<span[^>]*>\s*</span>").expect("valid regex"));
static BREAK_ONLY_DIV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<div[^>]*>\s*<br\s*/?>\s*</div>").expect("valid regex"));
static REPEATED_NBSP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:&nbsp;\s*){2,}").expect("valid regex"));
static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>").expect("valid regex")
});
static LINE_BREAK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(?:p|div|li|tr|blockquote|h[1-6])\s*>").expect("valid regex")
});

/// Removes Blogger editor artifacts from article HTML.
///
/// The output is still HTML; only markup with no visual effect (or markup
/// Blogger mangled) is touched.
pub fn clean_editor_html(html: &str) -> String {
    let html = HTML_COMMENT.replace_all(html, "");
    let html = ESCAPED_ATTRIBUTE_PREFIX.replace_all(&html, "");
    let html = OFFICE_PARAGRAPH.replace_all(&html, "");
    let html = EMPTY_SPAN.replace_all(&html, "");
    let html = BREAK_ONLY_DIV.replace_all(&html, "<br />");
    let html = REPEATED_NBSP.replace_all(&html, "&nbsp;");
    html.into_owned()
}

/// Decodes HTML character references (`&amp;`, `&#8217;`, `&nbsp;`, ...).
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(text)
}

/// Converts line-breaking markup into `newline`.
///
/// `<br>` and the closing tags of block elements each become one line break.
/// With `compact` set, runs of line breaks collapse into a single `newline`
/// and leading/trailing breaks are dropped; otherwise every break is kept.
pub fn cleaner_html(html: &str, newline: &str, compact: bool) -> String {
    let broken = LINE_BREAK_TAG.replace_all(html, "\n");
    if compact {
        compact_newlines(&broken, newline)
    } else {
        replace_newlines(&broken, newline)
    }
}

/// Removes every tag, dropping `<script>` and `<style>` bodies entirely.
pub fn strip_tags(html: &str) -> String {
    let html = SCRIPT_OR_STYLE.replace_all(html, "");
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Builds the list preview for an article body.
///
/// Tags are stripped before entities are decoded so that an escaped `&lt;`
/// in the prose survives as a literal `<`.
pub fn preview(html: &str, max_chars: usize) -> String {
    let text = strip_tags(&cleaner_html(html, "\n", false));
    let text = decode_entities(&text).replace('\u{a0}', " ");
    let text = compact_newlines(&text, " ");
    truncate_chars(text.trim(), max_chars).into_owned()
}
