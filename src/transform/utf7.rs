//! UTF-7 decoding. When a wide-charset facility is available, shift
//! sequences are fully decoded and the result appended; without one, a
//! static table maps the security-relevant shifted sequences to plain ASCII
//! in place. Both paths are deterministic.

use aho_corasick::{AhoCorasick, MatchKind};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;

use crate::pipeline::StepError;

/// Capability seam for full wide-charset conversion. The pipeline holds an
/// optional implementation; `None` selects the static-table fallback.
pub trait WideCharset: Send + Sync {
    /// Converts UTF-7 shift sequences in `value` to UTF-8, or `None` when
    /// the facility cannot handle the input.
    fn utf7_to_utf8(&self, value: &str) -> Option<String>;
}

/// Pure-Rust UTF-7 facility: decodes `+<base64>-` shift sequences as
/// UTF-16BE. Undecodable sequences are passed through verbatim.
pub struct NativeUtf7;

impl WideCharset for NativeUtf7 {
    fn utf7_to_utf8(&self, value: &str) -> Option<String> {
        Some(decode_shift_sequences(value))
    }
}

/// The security-relevant shifted sequences, matched case-insensitively and
/// leftmost-longest so `+ACIAPgA8-` wins over its `+ACI-` prefix.
const UTF7_SEQUENCES: [(&str, &str); 23] = [
    ("+ACI-", "\""),
    ("+ADw-", "<"),
    ("+AD4-", ">"),
    ("+AFs-", "["),
    ("+AF0-", "]"),
    ("+AHs-", "{"),
    ("+AH0-", "}"),
    ("+AFw-", "\\"),
    ("+ADs-", ";"),
    ("+ACM-", "#"),
    ("+ACY-", "&"),
    ("+ACU-", "%"),
    ("+ACQ-", "$"),
    ("+AD0-", "="),
    ("+AGA-", "`"),
    ("+ALQ-", "\""),
    ("+IBg-", "\""),
    ("+IBk-", "\""),
    ("+AHw-", "|"),
    ("+ACo-", "*"),
    ("+AF4-", "^"),
    ("+ACIAPg-", "\">"),
    ("+ACIAPgA8-", "\">"),
];

lazy_static! {
    static ref SHIFT_MARKER: Regex = Regex::new(r"(?m)\+A\w+-").unwrap();
    static ref UTF7_TABLE: AhoCorasick = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostLongest)
        .build(UTF7_SEQUENCES.iter().map(|(k, _)| *k))
        .expect("static UTF-7 table");
    static ref UTF7_REPLACEMENTS: Vec<&'static str> =
        UTF7_SEQUENCES.iter().map(|(_, v)| *v).collect();
}

fn decode_shift_sequences(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '+' {
            out.push(c);
            continue;
        }
        // "+-" encodes a literal plus.
        if chars.peek() == Some(&'-') {
            chars.next();
            out.push('+');
            continue;
        }
        let mut run = String::new();
        while let Some(&n) = chars.peek() {
            if n.is_ascii_alphanumeric() || n == '/' {
                run.push(n);
                chars.next();
            } else {
                break;
            }
        }
        let terminated = chars.peek() == Some(&'-');
        if terminated {
            chars.next();
        }
        match decode_utf16be_run(&run) {
            Some(decoded) if !run.is_empty() => out.push_str(&decoded),
            _ => {
                // Not a decodable shift sequence; keep it verbatim.
                out.push('+');
                out.push_str(&run);
                if terminated {
                    out.push('-');
                }
            }
        }
    }
    out
}

fn decode_utf16be_run(run: &str) -> Option<String> {
    let bytes = STANDARD_NO_PAD.decode(run).ok()?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    if units.is_empty() {
        return None;
    }
    String::from_utf16(&units).ok()
}

/// Decodes UTF-7: full conversion appended when the facility is present and a
/// shift sequence is found, otherwise the static table rewrites in place.
pub fn decode_utf7(
    value: &str,
    facility: Option<&dyn WideCharset>,
) -> Result<String, StepError> {
    if let Some(facility) = facility {
        if SHIFT_MARKER.is_match(value) {
            if let Some(decoded) = facility.utf7_to_utf8(value) {
                let mut out = value.to_owned();
                out.push('\n');
                out.push_str(&decoded);
                return Ok(out);
            }
        }
    }
    Ok(UTF7_TABLE.replace_all(value, &UTF7_REPLACEMENTS[..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_fallback_rewrites_in_place() {
        let out = decode_utf7("+ACI-onload+ACI-", None).unwrap();
        assert_eq!(out, "\"onload\"");
    }

    #[test]
    fn facility_appends_full_decode() {
        let out = decode_utf7("+ACI-onload+ACI-", Some(&NativeUtf7)).unwrap();
        assert!(out.starts_with("+ACI-onload+ACI-\n"));
        assert!(out.contains("\"onload\""));
    }

    #[test]
    fn longest_sequence_wins_in_table() {
        let out = decode_utf7("x+ACIAPgA8-y", None).unwrap();
        assert_eq!(out, "x\">y");
    }

    #[test]
    fn facility_passes_malformed_runs_through() {
        let decoded = decode_shift_sequences("+A-plain");
        assert_eq!(decoded, "+A-plain");
    }

    #[test]
    fn literal_plus_roundtrips() {
        let decoded = decode_shift_sequences("1+-1");
        assert_eq!(decoded, "1+1");
    }
}
