//! Helpers for showing tool output and wire traffic in logs.

use std::borrow::Cow;

/// Largest char boundary `<= max_bytes`.
fn boundary_at_or_before(s: &str, max_bytes: usize) -> usize {
    s.char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_bytes)
        .last()
        .unwrap_or(0)
}

/// Shorten `s` to at most `max_bytes` (plus a trailing `...` when cut),
/// never splitting a UTF-8 codepoint. Newlines are flattened to spaces.
pub fn preview(s: &str, max_bytes: usize) -> Cow<'_, str> {
    let flat = if s.contains('\n') {
        Cow::Owned(s.replace('\n', " "))
    } else {
        Cow::Borrowed(s)
    };
    if flat.len() <= max_bytes {
        return flat;
    }
    let end = boundary_at_or_before(&flat, max_bytes);
    Cow::Owned(format!("{}...", &flat[..end]))
}
