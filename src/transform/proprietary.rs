//! Vendor-specific obfuscations: the two-hex-digit Q quoting scheme, the
//! CDATA wrapper some RPC error reporters emit, and emoticon runs used to
//! break signature regexes. All rewrites are in place.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::pipeline::StepError;

lazy_static! {
    static ref Q_ENCODED: Regex = Regex::new(r"Q([a-f0-9]{2})").unwrap();
    static ref CDATA_WRAPPER: Regex = Regex::new(r"(?im)<!\[CDATA\[(\W+)\]\]>").unwrap();
    static ref EMOTICON: Regex = Regex::new(r"(?m)[:;]-[()/PD]+").unwrap();
}

pub fn decode_proprietary(value: &str) -> Result<String, StepError> {
    let value = Q_ENCODED.replace_all(value, |caps: &Captures| {
        match u8::from_str_radix(&caps[1], 16) {
            Ok(byte) => char::from(byte).to_string(),
            Err(_) => caps[0].to_string(),
        }
    });
    let value = CDATA_WRAPPER.replace_all(&value, "$1");
    Ok(EMOTICON.replace_all(&value, "").into_owned())
}
