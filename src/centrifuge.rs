//! The centrifuge: a statistical detector that flags strings whose symbol
//! density or symbol structure is anomalous, independent of any known
//! signature. It appends markers to the working value and reports its
//! metrics through the caller's [`Monitor`].

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::monitor::Monitor;

/// Marker appended when the density ratio check trips.
pub const RATIO_SENTINEL: &str = "\n$[!!!]";

/// Empirically derived thresholds, kept as configuration so they can be
/// tuned without re-deriving the formulas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentrifugeConfig {
    /// Maximum overall/stripped length ratio considered symbol-dense.
    pub ratio_threshold: f64,
    /// Minimum value length for the density ratio check.
    pub ratio_min_len: usize,
    /// Minimum value length for the structural fingerprint check.
    pub fingerprint_min_len: usize,
}

impl Default for CentrifugeConfig {
    fn default() -> Self {
        Self {
            ratio_threshold: 3.5,
            ratio_min_len: 25,
            fingerprint_min_len: 40,
        }
    }
}

impl CentrifugeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ratio_threshold.is_finite() || self.ratio_threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold);
        }
        if self.ratio_min_len == 0 || self.fingerprint_min_len == 0 {
            return Err(ConfigError::InvalidCutoff);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ratio threshold must be finite and positive")]
    InvalidThreshold,
    #[error("length cutoffs must be nonzero")]
    InvalidCutoff,
}

lazy_static! {
    static ref QUOTED_RUN: Regex = Regex::new(r#"(?m)"[\p{L}\d\s]+""#).unwrap();
    static ref STRIP_CLASS: Regex = Regex::new(r"(?m)[\d\s\p{L}.:,%/><]+").unwrap();
    static ref WS_RUN: Regex = Regex::new(r"(?m)\s{2,}").unwrap();
    static ref WORD_RUN: Regex = Regex::new(r"(?m)[\d\s\p{L}]{4,}").unwrap();
    static ref WORD_OR_SPACE: Regex = Regex::new(r"[\w\s]").unwrap();
    static ref SIGNED_DIGITS: Regex = Regex::new(r"[+\-]\s*\d+").unwrap();
    static ref FINGERPRINT_SHAPE: Regex = Regex::new(
        r"(?:\({2,}\+{2,}:{2,})|(?:\({2,}\+{2,}:+)|(?:\({3,}\++:{2,})"
    )
    .unwrap();
}

/// Collapses runs of a repeated attack-typical symbol to one instance.
fn collapse_repeated_symbols(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev: Option<char> = None;
    for c in value.chars() {
        let collapsible = matches!(c, '*' | '.' | '!' | '?' | '+' | '-');
        if collapsible && prev == Some(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// True when the value is a serialized object literal (a JSON object or
/// array). Probe failure counts as "not serialized" so the heuristics still
/// run on malformed near-JSON.
fn looks_serialized(value: &str) -> bool {
    let trimmed = value.trim();
    (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
}

#[derive(Debug, Clone)]
pub struct Centrifuge {
    cfg: CentrifugeConfig,
}

impl Default for Centrifuge {
    fn default() -> Self {
        Self {
            cfg: CentrifugeConfig::default(),
        }
    }
}

impl Centrifuge {
    pub fn new(cfg: CentrifugeConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Runs both sub-checks over `value`, appending markers and reporting to
    /// the monitor when a check trips. Always returns a value containing the
    /// input as a prefix.
    pub fn assess(&self, value: &str, monitor: &mut Monitor) -> String {
        let mut value = value.to_owned();

        if value.len() > self.cfg.ratio_min_len && !looks_serialized(&value) {
            let tmp = collapse_repeated_symbols(&value);
            let tmp = QUOTED_RUN.replace_all(&tmp, "");
            let stripped_len = STRIP_CLASS.replace_all(&tmp, "").len();
            let no_ws = WS_RUN.replace_all(&tmp, "");
            let overall_len = WORD_RUN.replace_all(&no_ws, "aaa").len();

            if stripped_len != 0 {
                let ratio = overall_len as f64 / stripped_len as f64;
                if ratio <= self.cfg.ratio_threshold {
                    monitor.record_ratio(ratio, self.cfg.ratio_threshold);
                    info!(
                        ratio,
                        threshold = self.cfg.ratio_threshold,
                        len = value.len(),
                        "centrifuge density ratio tripped"
                    );
                    value.push_str(RATIO_SENTINEL);
                }
            }
        }

        if value.len() > self.cfg.fingerprint_min_len {
            if let Some(fingerprint) = self.fingerprint(&value) {
                monitor.record_fingerprint(fingerprint.clone());
                info!(
                    fingerprint = %fingerprint,
                    len = value.len(),
                    "centrifuge fingerprint tripped"
                );
                value.push('\n');
                value.push_str(&fingerprint);
            }
        }

        value
    }

    /// Reduces the value to its sorted symbol skeleton and returns it when
    /// it matches the heavy-nesting shape.
    fn fingerprint(&self, value: &str) -> Option<String> {
        let symbols = WORD_OR_SPACE.replace_all(value, "");
        let unique: BTreeSet<char> = symbols.chars().collect();
        let normalized: String = unique
            .into_iter()
            .map(|c| match c {
                '~' | '^' | '|' | '*' | '%' | '&' | '/' => '+',
                _ => c,
            })
            .collect();
        let normalized = SIGNED_DIGITS.replace_all(&normalized, "+");
        let mut tokens: Vec<char> = normalized
            .chars()
            .map(|c| match c {
                '(' | ')' | '[' | ']' | '{' | '}' => '(',
                '!' | '?' | ',' | '.' | ':' | '=' => ':',
                other => other,
            })
            .filter(|c| matches!(c, ':' | '(' | '+'))
            .collect();
        tokens.sort_unstable();
        let fingerprint: String = tokens.into_iter().collect();
        FINGERPRINT_SHAPE.is_match(&fingerprint).then_some(fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centrifuge() -> Centrifuge {
        Centrifuge::new(CentrifugeConfig::default()).unwrap()
    }

    #[test]
    fn punctuation_heavy_string_trips_ratio() {
        let mut monitor = Monitor::new();
        let out = centrifuge().assess("!!!@@@###$$$%%%^^^&&&***((()))", &mut monitor);
        assert!(out.ends_with(RATIO_SENTINEL));
        assert!(monitor.ratio().is_some());
        assert_eq!(monitor.threshold(), Some(3.5));
    }

    #[test]
    fn natural_language_does_not_trip_ratio() {
        let mut monitor = Monitor::new();
        let out = centrifuge().assess("This is a normal short sentence.", &mut monitor);
        assert!(!out.contains(RATIO_SENTINEL));
        assert!(monitor.ratio().is_none());
    }

    #[test]
    fn short_values_are_skipped() {
        let mut monitor = Monitor::new();
        let out = centrifuge().assess("!!!@@@###", &mut monitor);
        assert_eq!(out, "!!!@@@###");
        assert!(!monitor.tripped());
    }

    #[test]
    fn serialized_object_is_exempt_from_ratio() {
        let mut monitor = Monitor::new();
        let value = r#"{"k":"&&&***!!!","v":"((()))###"}"#;
        let out = centrifuge().assess(value, &mut monitor);
        assert!(!out.contains(RATIO_SENTINEL));
        assert!(monitor.ratio().is_none());
    }

    #[test]
    fn malformed_near_json_still_runs_ratio() {
        let mut monitor = Monitor::new();
        let value = r#"{"k":&&&***!!!((()))###$$$@@@"#;
        centrifuge().assess(value, &mut monitor);
        assert!(monitor.ratio().is_some());
    }

    #[test]
    fn nested_symbol_mix_trips_fingerprint() {
        let mut monitor = Monitor::new();
        let value = "aaaa bbbb cccc dddd eeee (){}[]!?:=*%&|^/";
        let out = centrifuge().assess(value, &mut monitor);
        let fingerprint = monitor.fingerprint().expect("fingerprint recorded");
        assert!(out.ends_with(fingerprint));
        assert!(FINGERPRINT_SHAPE.is_match(fingerprint));
    }

    #[test]
    fn plain_long_text_trips_nothing() {
        let mut monitor = Monitor::new();
        let value = "a perfectly ordinary sentence that is quite long indeed";
        let out = centrifuge().assess(value, &mut monitor);
        assert_eq!(out, value);
        assert!(!monitor.tripped());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = CentrifugeConfig {
            ratio_threshold: 0.0,
            ..CentrifugeConfig::default()
        };
        assert!(Centrifuge::new(cfg).is_err());
    }
}
