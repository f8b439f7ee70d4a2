//! Concatenation/obfuscation stripper. Removes the quoted-fragment joins,
//! object traversal chains, and special-number tricks scripting payloads use
//! to split keywords across string literals, then appends the cleaned stream
//! when it differs.

use lazy_static::lazy_static;
use regex::Regex;

use crate::pipeline::StepError;

lazy_static! {
    static ref WORD_BACKSLASH: Regex = Regex::new(r"(\w)\\").unwrap();
    static ref CONCAT_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?s)</\w+>\+<\w+>").unwrap(),
        Regex::new(r#"(?s)":\d+[^"\[]+""#).unwrap(),
        Regex::new(r#"(?s)"?"\+\w+\+""#).unwrap(),
        Regex::new(r#"(?s)(?:"\s*;[^"]+")|(?:";[^"]+:\s*")"#).unwrap(),
        Regex::new(r#"(?s)"\s*(?:;|\+).{8,18}:\s*""#).unwrap(),
        Regex::new(r#"(?s)(?:";\w+=)|(?:!""&&")|(?:~)"#).unwrap(),
        Regex::new(r#"(?s)(?:"?"\+""?\+?"?)|(?:;\w+=")|(?:"[|&]{2,})"#).unwrap(),
        Regex::new(r#"(?s)"\s*\W+""#).unwrap(),
        Regex::new(r#"(?s)";\w\s*\+=\s*\w?\s*""#).unwrap(),
        Regex::new(r#"(?s)"[|&;]+\s*[^|&\n]*[|&]+\s*"?"#).unwrap(),
        Regex::new(r#"(?s)";\s*\w+\W+\w*\s*[|&]*""#).unwrap(),
        Regex::new(r#"(?s)"\s*"\s*\."#).unwrap(),
        Regex::new(r#"\s*new\s+\w+\s*[+"]"#).unwrap(),
        Regex::new(r"(?:^|\s+)(?:do|else)\s+").unwrap(),
        Regex::new(r"\{\s*new\s+\w+\s*\}").unwrap(),
    ];
    static ref OBJECT_TRAVERSAL: Regex = Regex::new(r"\w(\.\w\()").unwrap();
    static ref JS_SPECIAL_NUMBER: Regex =
        Regex::new(r"(?is)(?:\(*[.\d]e[+-]*\d+\)*)|(?:NaN|Infinity)\W").unwrap();
}

/// PHP-style `stripslashes`: drops each backslash, keeping the following
/// character literally.
fn strip_slashes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

pub fn strip_concatenations(value: &str) -> Result<String, StepError> {
    let mut value = value.to_owned();

    // Normalize backslashes glued onto word characters.
    let deslashed = WORD_BACKSLASH.replace_all(&value, "$1");
    if deslashed != value {
        let appended = deslashed.into_owned();
        value.push_str(&appended);
    }

    let compare = strip_slashes(&value);
    let mut converted = compare.clone();
    for pattern in CONCAT_PATTERNS.iter() {
        converted = pattern.replace_all(&converted, "").into_owned();
    }
    converted = OBJECT_TRAVERSAL.replace_all(&converted, "$1").into_owned();
    converted = JS_SPECIAL_NUMBER.replace_all(&converted, "1").into_owned();

    if compare != converted {
        value.push('\n');
        value.push_str(&converted);
    }
    Ok(value)
}
