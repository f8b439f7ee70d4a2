//! Nested Base64 fragment decoder, covering payloads smuggled through data
//! URIs and request parameters.

use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::{alphabet, Engine};
use lazy_static::lazy_static;
use regex::Regex;

use crate::pipeline::StepError;

lazy_static! {
    /// Base64-ish tokens of 30+ chars bounded by a delimiter or string edge.
    static ref B64_TOKEN: Regex =
        Regex::new(r"(?im)(?:^|[,&?])\s*([a-z0-9]{30,}=*)(?:\W|$)").unwrap();
    /// A 32-char hex run marks the token as a digest, not an encoding.
    static ref HEX_DIGEST: Regex = Regex::new(r"(?i)[a-f0-9]{32}").unwrap();
}

/// Real-world fragments are often cut mid-quantum and unpadded, so decoding
/// must not insist on canonical padding.
static FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes candidate Base64 tokens and appends the decoded bytes. Tokens that
/// look like hex digests are skipped, and undecodable tokens are skipped
/// silently per the fail-open policy.
pub fn decode_nested_base64(value: &str) -> Result<String, StepError> {
    let mut out = value.to_owned();
    for caps in B64_TOKEN.captures_iter(value) {
        let token = &caps[1];
        if HEX_DIGEST.is_match(token) {
            continue;
        }
        if let Ok(bytes) = FORGIVING.decode(token) {
            out.push_str(&String::from_utf8_lossy(&bytes));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_token_is_decoded() {
        // base64("alert(document.cookie);//pad")
        let token = "YWxlcnQoZG9jdW1lbnQuY29va2llKTsvL3BhZA==";
        let out = decode_nested_base64(&format!("?{token}")).unwrap();
        assert!(out.contains("alert(document.cookie)"));
    }

    #[test]
    fn hex_digest_is_not_decoded() {
        let digest = "d41d8cd98f00b204e9800998ecf8427e";
        let out = decode_nested_base64(&format!("?{digest}")).unwrap();
        assert_eq!(out, format!("?{digest}"));
    }

    #[test]
    fn short_tokens_are_ignored() {
        let out = decode_nested_base64("?YWxlcnQoMSk=").unwrap();
        assert_eq!(out, "?YWxlcnQoMSk=");
    }

    #[test]
    fn undelimited_token_is_ignored() {
        let token = "YWxlcnQoZG9jdW1lbnQuY29va2llKTsvL3BhZA==";
        let out = decode_nested_base64(&format!("junk {token}")).unwrap();
        assert_eq!(out, format!("junk {token}"));
    }
}
