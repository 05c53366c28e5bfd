// redactkit-context/src/window/mod.rs

//! Byte-offset window helpers that never split a UTF-8 character.

/// Moves `index` backwards until it sits on a char boundary of `text`.
pub fn clamp_to_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Returns the slice of `text` spanning `radius` bytes on each side of `[start, end)`.
pub fn context_window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let lo = clamp_to_char_boundary(text, start.saturating_sub(radius));
    let hi = end.saturating_add(radius).min(text.len());
    // Round the upper edge forward so the window keeps whole characters.
    let mut hi = hi;
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }
    &text[lo..hi.max(lo)]
}

/// Returns up to `radius` bytes of text immediately before `start`.
pub fn preceding_text(text: &str, start: usize, radius: usize) -> &str {
    let end = clamp_to_char_boundary(text, start);
    let lo = clamp_to_char_boundary(text, end.saturating_sub(radius));
    &text[lo..end]
}
