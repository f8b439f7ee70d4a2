//! Structural normalizers: comments, line breaks, quote variants, and JS
//! regex modifiers. These defeat signature evasion that relies on breaking a
//! payload across comment spans or line boundaries.

use lazy_static::lazy_static;
use regex::Regex;

use crate::pipeline::StepError;

lazy_static! {
    /// Cheap marker probe run before the (more expensive) comment rewrites.
    static ref COMMENT_MARKER: Regex =
        Regex::new(r"(?ms)(?:<!-|-->|/\*|\*/|//\W*\w+\s*$)|(?:--[^-]*-)").unwrap();
    static ref SGML_COMMENT: Regex =
        Regex::new(r"(?ms)(?:<!)(?:(?:--(?:[^-]*(?:-[^-]+)*)--\s*)*)(?:>)").unwrap();
    static ref BLOCK_COMMENT: Regex = Regex::new(r"(?ms)(?:/\*/*[^/*]*)+\*/").unwrap();
    static ref DASH_COMMENT: Regex = Regex::new(r"(?ms)--[^-]*-").unwrap();
    static ref INTERLEAVED_TAG: Regex = Regex::new(r"(?m)(<\w+)/+(\w+=?)").unwrap();
    static ref LINE_COMMENT: Regex = Regex::new(r"(?m)([^\\:])//(.*)$").unwrap();
    static ref REAL_LINE_BREAK: Regex = Regex::new(r"[\n\r\x0B]").unwrap();
    static ref JS_REGEX_MODIFIER: Regex = Regex::new(r"/[gim]").unwrap();
}

/// Replaces comment spans with a statement separator in a copy and appends
/// the copy, so both the commented and cleaned form reach the matcher. Also
/// repairs comment-obfuscated tags (`<img///onerror=`) and rewrites trailing
/// line comments to block form.
pub fn strip_comments(value: &str) -> Result<String, StepError> {
    let mut value = value.to_owned();

    if COMMENT_MARKER.is_match(&value) {
        let converted = SGML_COMMENT.replace_all(&value, ";");
        let converted = BLOCK_COMMENT.replace_all(&converted, ";");
        let converted = DASH_COMMENT.replace_all(&converted, ";").into_owned();
        value.push('\n');
        value.push_str(&converted);
    }

    let value = INTERLEAVED_TAG.replace_all(&value, "${1}/$2");
    let value = LINE_COMMENT.replace_all(&value, "${1}/**/$2");

    Ok(value.into_owned())
}

/// Converts escaped line-break sequences to a statement separator and real
/// line breaks to double spaces.
pub fn normalize_line_breaks(value: &str) -> Result<String, StepError> {
    let mut value = value.to_owned();
    for escaped in ["\\r", "\\n", "\\f", "\\t", "\\v"] {
        value = value.replace(escaped, ";");
    }
    Ok(REAL_LINE_BREAK.replace_all(&value, "  ").into_owned())
}

fn is_quote_variant(c: char) -> bool {
    matches!(
        c,
        '\'' |        // apostrophe
        '`' |         // grave accent
        '\u{00B4}' |  // acute accent
        '\u{2019}' |  // right single quotation mark
        '\u{2018}' // left single quotation mark
    )
}

/// Maps every quote variant to the canonical double quote.
pub fn normalize_quotes(value: &str) -> Result<String, StepError> {
    Ok(value
        .chars()
        .map(|c| if is_quote_variant(c) { '"' } else { c })
        .collect())
}

/// Drops trailing `g`/`i`/`m` regex flags inserted to break literal matching
/// of a division operator.
pub fn strip_js_regex_modifiers(value: &str) -> Result<String, StepError> {
    Ok(JS_REGEX_MODIFIER.replace_all(value, "/").into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sgml_comment_appends_cleaned_variant() {
        let out = strip_comments("<!-- evil -->alert(1)").unwrap();
        assert!(out.contains("<!-- evil -->alert(1)"));
        assert!(out.contains(";alert(1)"));
    }

    #[test]
    fn block_comment_becomes_separator() {
        let out = strip_comments("sel/*x*/ect").unwrap();
        assert!(out.contains("sel;ect"));
    }

    #[test]
    fn interleaved_slash_tag_is_repaired() {
        let out = strip_comments("<img///onerror=alert(1)").unwrap();
        assert!(out.contains("<img/onerror=alert(1)"));
    }

    #[test]
    fn escaped_breaks_become_separators() {
        let out = normalize_line_breaks("foo\\nbar\\tbaz").unwrap();
        assert_eq!(out, "foo;bar;baz");
    }

    #[test]
    fn real_breaks_become_double_space() {
        let out = normalize_line_breaks("foo\nbar").unwrap();
        assert_eq!(out, "foo  bar");
    }

    #[test]
    fn quote_normalizer_is_idempotent() {
        let once = normalize_quotes("it\u{2019}s `x` \u{2018}y\u{2019}").unwrap();
        let twice = normalize_quotes(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, "it\"s \"x\" \"y\"");
    }

    #[test]
    fn regex_modifier_is_stripped() {
        let out = strip_js_regex_modifiers("x = a /gi; y = b / c").unwrap();
        assert!(out.starts_with("x = a /i;"));
    }
}
