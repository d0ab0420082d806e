//! Bounded text helpers for reports and diagnostics.

/// Marker appended when text is cut short.
pub const TRUNCATION_MARKER: &str = "…";

/// Keep at most `limit` characters of `text`.
///
/// Returns the kept text (with [`TRUNCATION_MARKER`] appended when something was
/// dropped) and whether truncation happened. Cuts on `char` boundaries so the
/// result is always valid UTF-8.
pub fn bounded(text: &str, limit: usize) -> (String, bool) {
    match text.char_indices().nth(limit) {
        None => (text.to_string(), false),
        Some((cut, _)) => {
            let mut kept = String::with_capacity(cut + TRUNCATION_MARKER.len());
            kept.push_str(&text[..cut]);
            kept.push_str(TRUNCATION_MARKER);
            (kept, true)
        }
    }
}

/// Last `limit` bytes of `text`, widened to the nearest `char` boundary.
///
/// Used for log excerpts where the tail (the error) matters most.
pub fn tail(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_keeps_short_text() {
        assert_eq!(bounded("5050\n", 10), ("5050\n".to_string(), false));
        assert_eq!(bounded("abcd", 4), ("abcd".to_string(), false));
    }

    #[test]
    fn bounded_marks_truncation() {
        assert_eq!(bounded("abcdef", 4), ("abcd…".to_string(), true));
    }

    #[test]
    fn bounded_respects_char_boundaries() {
        let (kept, truncated) = bounded("héllo wörld", 5);
        assert!(truncated);
        assert_eq!(kept, "héllo…");
    }

    #[test]
    fn tail_keeps_end_of_log() {
        assert_eq!(tail("pulling\nerror: denied", 6), "denied");
        assert_eq!(tail("short", 100), "short");
        assert_eq!(tail("aé", 1), "");
    }
}
