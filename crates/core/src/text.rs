//! Char-boundary-safe string helpers.
//!
//! All budgets in this workspace count Unicode scalar values, never bytes,
//! so diacritics in tenant documents cannot split a code point.

/// Number of chars in `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The first `max_chars` chars of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
