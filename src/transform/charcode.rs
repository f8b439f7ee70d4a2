//! Charcode decoders: comma-separated numeric expression lists (the
//! `String.fromCharCode` family), octal escape runs, and hex escape runs.
//! Each family that fires appends its decoded buffer after a newline; the
//! original value always stays in front.

use lazy_static::lazy_static;
use regex::Regex;

use crate::pipeline::StepError;

/// Decoded values outside this band are dropped rather than emitted, which
/// keeps control bytes out of the appended buffer.
const PRINTABLE_MIN: i64 = 20;
const PRINTABLE_MAX: i64 = 127;

lazy_static! {
    /// At least four comma-separated items built from digits and inline
    /// arithmetic.
    static ref CHARCODE_LIST: Regex =
        Regex::new(r"[\d+\-=/* ]+(?:\s?,\s?[\d+\-=/* ]+){3,}").unwrap();
    static ref VAR_ASSIGN: Regex = Regex::new(r"\w+=").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s").unwrap();
    static ref OCTAL_RUN: Regex = Regex::new(r"(?:\\+\d+[ \t]*){8,}").unwrap();
    static ref HEX_RUN: Regex = Regex::new(r"(?:\\+\w+\s*){8,}").unwrap();
}

/// Evaluates one list element as a sum of digit groups. A group directly
/// preceded by `-` is subtracted; one preceded by `*` or `/` contributes
/// nothing; everything else (including assignment junk like `=72`) is added.
/// Elements that cannot be evaluated, including ones overflowing `i64`, are
/// skipped.
fn eval_element(element: &str) -> Option<i64> {
    let bytes = element.as_bytes();
    let mut sum: i64 = 0;
    let mut saw_digits = false;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let group: i64 = element[start..i].parse().ok()?;
            saw_digits = true;
            sum = match start.checked_sub(1).map(|p| bytes[p]) {
                Some(b'-') => sum.checked_sub(group)?,
                Some(b'*') | Some(b'/') => sum,
                _ => sum.checked_add(group)?,
            };
        } else {
            i += 1;
        }
    }
    saw_digits.then_some(sum)
}

fn push_printable(buf: &mut String, code: i64) {
    if (PRINTABLE_MIN..=PRINTABLE_MAX).contains(&code) {
        buf.push(code as u8 as char);
    }
}

/// Decodes the three charcode families in sequence. Later families scan the
/// value including earlier appends.
pub fn decode_js_charcode(value: &str) -> Result<String, StepError> {
    let mut value = value.to_owned();

    // Family 1: comma-separated numeric expressions.
    let found: Vec<&str> = CHARCODE_LIST.find_iter(&value).map(|m| m.as_str()).collect();
    if !found.is_empty() {
        let joined = found.join(",");
        let joined = WHITESPACE.replace_all(&joined, "");
        let joined = VAR_ASSIGN.replace_all(&joined, "");
        let mut converted = String::new();
        for element in joined.split(',') {
            if let Some(code) = eval_element(element) {
                push_printable(&mut converted, code);
            }
        }
        value.push('\n');
        value.push_str(&converted);
    }

    // Family 2: octal escape runs.
    let found: Vec<&str> = OCTAL_RUN.find_iter(&value).map(|m| m.as_str()).collect();
    if !found.is_empty() {
        let joined = WHITESPACE.replace_all(&found.join(","), "").into_owned();
        let mut converted = String::new();
        for group in joined.split('\\') {
            let digits: String = group.chars().filter(|c| ('0'..='7').contains(c)).collect();
            if digits.is_empty() {
                continue;
            }
            if let Ok(code) = i64::from_str_radix(&digits, 8) {
                push_printable(&mut converted, code);
            }
        }
        value.push('\n');
        value.push_str(&converted);
    }

    // Family 3: hex escape runs, with u/x markers stripped.
    let found: Vec<&str> = HEX_RUN.find_iter(&value).map(|m| m.as_str()).collect();
    if !found.is_empty() {
        let joined = found.join(",").replace(['u', 'x'], "");
        let mut converted = String::new();
        for group in joined.split('\\') {
            let digits: String = group.chars().filter(char::is_ascii_hexdigit).collect();
            if digits.is_empty() {
                continue;
            }
            if let Ok(code) = i64::from_str_radix(&digits, 16) {
                push_printable(&mut converted, code);
            }
        }
        value.push('\n');
        value.push_str(&converted);
    }

    Ok(value)
}
