use std::borrow::Cow;

/// Truncates a string to at most `max_chars` Unicode scalar values.
///
/// Counts characters rather than bytes so multi-byte text (CJK, emoji,
/// accented Latin) is never split mid-codepoint. No ellipsis is appended:
/// the result is always a prefix of the input.
///
/// Returns `Cow::Borrowed` when the input already fits.
///
/// # Examples
///
/// ```
/// use announcer::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Hello World", 5), "Hello");
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        Some((byte_end, _)) => Cow::Owned(s[..byte_end].to_string()),
        None => Cow::Borrowed(s),
    }
}

/// Collapses every run of line breaks (and the blanks surrounding them)
/// into a single `replacement`.
///
/// Spaces and tabs that are not adjacent to a line break are preserved.
/// Leading and trailing line breaks are removed rather than replaced.
pub fn compact_newlines(s: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_blank = String::new();
    let mut pending_break = false;

    for c in s.chars() {
        match c {
            '\n' | '\r' => {
                pending_break = true;
                pending_blank.clear();
            }
            ' ' | '\t' => pending_blank.push(c),
            _ => {
                if pending_break {
                    if !out.is_empty() {
                        out.push_str(replacement);
                    }
                    pending_break = false;
                    pending_blank.clear();
                } else if !pending_blank.is_empty() {
                    out.push_str(&pending_blank);
                    pending_blank.clear();
                }
                out.push(c);
            }
        }
    }

    out
}

/// Replaces each line break with `replacement` without merging runs.
pub fn replace_newlines(s: &str, replacement: &str) -> String {
    s.replace("\r\n", "\n").replace(['\n', '\r'], replacement)
}
