//! SQL keyword and operator canonicalization. Boolean-equivalent idioms
//! collapse to `=0`, value-producing keywords and functions to `0`, negation
//! idioms to `!`, so signatures need not enumerate every synonym.

use lazy_static::lazy_static;
use regex::Regex;

use crate::pipeline::StepError;

lazy_static! {
    static ref NULL_COMPARISON: Regex =
        Regex::new(r"(?ims)\s*(?:(?:IS\s+null)|(?:LIKE\s+null)|(?:IN[+\s]*\([^()]+\)))").unwrap();
    static ref NULL_BEFORE_COMMA: Regex = Regex::new(r"(?i)null,").unwrap();
    static ref NULL_AFTER_COMMA: Regex = Regex::new(r"(?i),null").unwrap();
    static ref VALUE_KEYWORD: Regex = Regex::new(
        r"(?ims)[^\w,]NULL|\\N|TRUE|FALSE|UTC_TIME|LOCALTIME(?:STAMP)?|CURRENT_\w+|BINARY|(?:(?:ASCII|SOUNDEX|MD5|R?LIKE)[+\s]*\([^()]+\))|(?:-+\d)",
    )
    .unwrap();
    static ref NEGATION_IDIOM: Regex = Regex::new(
        r"(?ims)(?:NOT\s+BETWEEN)|(?:IS\s+NOT)|(?:NOT\s+IN)|(?:XOR|\WDIV\W|\WNOT\W|<>|RLIKE(?:\s+BINARY)?)|(?:REGEXP\s+BINARY)|(?:SOUNDS\s+LIKE)",
    )
    .unwrap();
    static ref QUOTE_DIGIT: Regex = Regex::new(r#""\s+\d"#).unwrap();
}

pub fn canonicalize_sql(value: &str) -> Result<String, StepError> {
    let value = NULL_COMPARISON.replace_all(value, "=0");
    let value = NULL_BEFORE_COMMA.replace_all(&value, ",0");
    let value = NULL_AFTER_COMMA.replace_all(&value, ",0");
    let value = VALUE_KEYWORD.replace_all(&value, "0");
    let value = NEGATION_IDIOM.replace_all(&value, "!");
    let value = QUOTE_DIGIT.replace_all(&value, "\"");
    Ok(value.replace('~', "0"))
}
