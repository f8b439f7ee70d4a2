//! JS unicode escape decoder. Replaces every `\uXXXX` escape with the
//! character it encodes and appends a sentinel so the matcher knows the value
//! carried escaped unicode.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::pipeline::StepError;

/// Appended when at least one escape was replaced.
pub const UNICODE_SENTINEL: &str = "\n\u{1}";

lazy_static! {
    static ref JS_UNICODE: Regex = Regex::new(r"(?i)\\u([0-9a-f]{4})").unwrap();
}

pub fn decode_js_unicode(value: &str) -> Result<String, StepError> {
    if !JS_UNICODE.is_match(value) {
        return Ok(value.to_owned());
    }
    let replaced = JS_UNICODE.replace_all(value, |caps: &Captures| {
        let code = u32::from_str_radix(&caps[1], 16).unwrap_or(0);
        match char::from_u32(code) {
            Some(c) => c.to_string(),
            // Lone surrogates cannot round-trip; keep the low byte.
            None => char::from((code & 0xFF) as u8).to_string(),
        }
    });
    let mut out = replaced.into_owned();
    out.push_str(UNICODE_SENTINEL);
    Ok(out)
}
