/// Compare two strings ignoring ASCII case.
/// Role tags from the server vary in casing ("Admin", "ADMIN", "admin").
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Truncate a string to at most `max_bytes` bytes of UTF-8, never splitting
/// a multi-byte character.
pub fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
