//! Identifier sanitizer (component A).
//!
//! Maps arbitrary peer/tool names into legal script-VM identifiers.
//! Deterministic, total, and idempotent after one pass.

/// Lua reserved words. The runtime crate targets Lua, so sanitization must
/// avoid colliding with them even though this crate has no VM dependency.
const RESERVED_WORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Sanitize `name` into a legal, idempotent script identifier.
///
/// 1. Replace every character outside `[A-Za-z0-9_]` with `_`.
/// 2. If the first character is a digit, prepend `_`.
/// 3. If the result is a reserved word, prepend `_`.
/// 4. If the result is empty or exactly `_`, return `_unnamed`.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }

    if RESERVED_WORDS.contains(&out.as_str()) {
        out.insert(0, '_');
    }

    if out.is_empty() || out == "_" {
        out = "_unnamed".to_string();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_illegal_characters() {
        assert_eq!(sanitize_identifier("list-files"), "list_files");
        assert_eq!(sanitize_identifier("a.b/c"), "a_b_c");
    }

    #[test]
    fn prefixes_leading_digit() {
        assert_eq!(sanitize_identifier("123abc"), "_123abc");
    }

    #[test]
    fn prefixes_reserved_word() {
        assert_eq!(sanitize_identifier("end"), "_end");
        assert_eq!(sanitize_identifier("function"), "_function");
    }

    #[test]
    fn empty_and_underscore_become_unnamed() {
        assert_eq!(sanitize_identifier(""), "_unnamed");
        assert_eq!(sanitize_identifier("_"), "_unnamed");
        assert_eq!(sanitize_identifier("!!!"), "_unnamed");
    }

    #[test]
    fn idempotent_after_one_pass() {
        for name in ["list-files", "123abc", "end", "", "!!!", "get/thing", "_"] {
            let once = sanitize_identifier(name);
            let twice = sanitize_identifier(&once);
            assert_eq!(once, twice, "not idempotent for {name:?}");
        }
    }

    #[test]
    fn always_legal() {
        let is_legal = |s: &str| {
            let mut chars = s.chars();
            match chars.next() {
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
                _ => return false,
            }
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        for name in ["weird!!name", "9lives", "while", "", "café"] {
            assert!(is_legal(&sanitize_identifier(name)), "{name:?}");
        }
    }
}
