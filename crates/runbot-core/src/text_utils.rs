/// Returns true when `value` contains nothing but whitespace.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

const TRUNCATION_MARKER: &str = "...";

/// Truncates `value` to at most `max_chars` characters, the `...` marker included.
///
/// Limits too small to hold the marker cut without one.
pub fn truncate_for_reply(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let marker_chars = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_chars {
        return value.chars().take(max_chars).collect();
    }
    let mut truncated = value
        .chars()
        .take(max_chars - marker_chars)
        .collect::<String>();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
