//! Small text helpers shared by tools and the context assembler.

/// Truncate `s` to at most `max_chars` characters, appending a marker when
/// anything was cut. Always cuts on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_chars).collect();
    format!("{truncated}\n... (truncated)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_pass_through() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn long_strings_get_cut_with_marker() {
        let out = truncate_chars("abcdefgh", 4);
        assert!(out.starts_with("abcd"));
        assert!(out.contains("truncated"));
    }

    #[test]
    fn multibyte_boundary_is_safe() {
        let out = truncate_chars("héllo wörld", 6);
        assert!(out.starts_with("héllo"));
    }
}
