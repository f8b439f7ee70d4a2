//! High-byte neutralization and XML/HTML tag stripping.

use lazy_static::lazy_static;
use regex::Regex;

use crate::pipeline::StepError;

lazy_static! {
    static ref XML_TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
}

/// Replaces every byte >= 127 with a placeholder, byte-wise, so high-byte
/// charset confusion cannot smuggle ASCII-equivalent meaning past the
/// matcher. A multibyte character becomes one placeholder per byte.
pub fn replace_out_of_range(value: &str) -> Result<String, StepError> {
    let bytes: Vec<u8> = value
        .bytes()
        .map(|b| if b >= 127 { b'U' } else { b })
        .collect();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Removes markup tags and appends the stripped text when it differs,
/// exposing content hidden inside tag structure.
pub fn strip_xml_tags(value: &str) -> Result<String, StepError> {
    let converted = XML_TAG.replace_all(value, "");
    if converted == value {
        return Ok(value.to_owned());
    }
    let mut out = value.to_owned();
    out.push('\n');
    out.push_str(&converted);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_bytes_become_placeholders() {
        let out = replace_out_of_range("a\u{00E9}b").unwrap();
        assert_eq!(out, "aUUb");
    }

    #[test]
    fn ascii_passes_through() {
        let out = replace_out_of_range("plain ascii").unwrap();
        assert_eq!(out, "plain ascii");
    }

    #[test]
    fn tags_are_stripped_and_appended() {
        let out = strip_xml_tags("<b>bold</b> text").unwrap();
        assert_eq!(out, "<b>bold</b> text\nbold text");
    }

    #[test]
    fn tagless_input_is_unchanged() {
        let out = strip_xml_tags("no tags here").unwrap();
        assert_eq!(out, "no tags here");
    }
}
