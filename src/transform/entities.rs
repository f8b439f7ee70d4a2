//! HTML/XML entity decoding and control-character / invisible-codepoint
//! stripping. The entity step appends its decoded variant; the control-char
//! step rewrites in place so smuggled bytes cannot reach the matcher at all.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::pipeline::StepError;

lazy_static! {
    static ref ENTITY_MARKER: Regex = Regex::new(r"(?ms)&#x?\w+").unwrap();
    /// Repairs missing trailing semicolons on short numeric references.
    static ref ENTITY_SEMICOLON: Regex = Regex::new(r"(?ms)(&#x?\w{2}\d?);?").unwrap();
    static ref DEC_ENTITY: Regex = Regex::new(r"&#(\d+);").unwrap();
    static ref HEX_ENTITY: Regex = Regex::new(r"(?i)&#x([0-9a-f]+);").unwrap();

    /// Invisible characters smuggled as entity text rather than raw bytes.
    static ref INVISIBLE_ENTITY_DEC: Regex = Regex::new(r"(?i)&#(?:65|8)\d{3};?").unwrap();
    static ref ZERO_WIDTH_NAMED: Regex =
        Regex::new(r"(?i)&[#x]*(?:200|820|[jlmnrwz]+)\w?;?").unwrap();
    static ref INVISIBLE_ENTITY_ANY: Regex = Regex::new(
        r"(?i)(?:&#(?:65|8)\d{3};?)|(?:&#(?:56|7)3\d{2};?)|(?:&#x(?:fe|20)\w{2};?)|(?:&#x(?:d[c-f])\w{2};?)",
    )
    .unwrap();
}

fn decode_numeric(value: &str) -> String {
    let value = DEC_ENTITY.replace_all(value, |caps: &Captures| {
        match caps[1].parse::<u32>().ok().and_then(char::from_u32) {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    });
    HEX_ENTITY
        .replace_all(&value, |caps: &Captures| {
            match u32::from_str_radix(&caps[1], 16).ok().and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn decode_named(value: &str) -> String {
    // The common named set; the full HTML table is deliberately out of scope.
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Decodes numeric character references and the standard named entities,
/// appending the decoded form after a newline.
pub fn decode_entities(value: &str) -> Result<String, StepError> {
    if !ENTITY_MARKER.is_match(value) {
        return Ok(value.to_owned());
    }
    let normalized = ENTITY_SEMICOLON.replace_all(value, "$1;");
    let decoded = decode_named(&decode_numeric(&normalized)).replace(";;", ";");
    let mut out = value.to_owned();
    out.push('\n');
    out.push_str(&decoded);
    Ok(out)
}

/// Raw control bytes rewritten to the null-byte marker. Common whitespace
/// (HT, LF, CR) stays untouched.
fn is_smuggled_control(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{13}')
}

/// Zero-width and directionality characters used for matcher evasion.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{2000}'..='\u{202F}' | // spaces, zero-width, bidi marks
        '\u{2040}'..='\u{206F}' | // invisible operators, deprecated format controls
        '\u{FEFF}' |              // byte order mark
        '\u{FFFD}' // replacement character
    )
}

/// Rewrites control bytes to `%00` and strips invisible codepoints and their
/// entity-encoded forms, in place.
pub fn strip_control_chars(value: &str) -> Result<String, StepError> {
    let mut rewritten = String::with_capacity(value.len());
    for c in value.chars() {
        if is_smuggled_control(c) {
            rewritten.push_str("%00");
        } else if !is_invisible(c) {
            rewritten.push(c);
        }
    }
    let rewritten = INVISIBLE_ENTITY_DEC.replace_all(&rewritten, "");
    let rewritten = ZERO_WIDTH_NAMED.replace_all(&rewritten, "");
    Ok(INVISIBLE_ENTITY_ANY.replace_all(&rewritten, "").into_owned())
}
