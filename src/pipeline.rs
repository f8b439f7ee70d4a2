//! The canonicalization pipeline. A fixed, ordered sequence of transform
//! steps folds every obfuscated spelling of an input toward one canonical
//! form, then the centrifuge takes a statistical pass over the result.
//!
//! Steps run fail-open: a step that errors is logged and skipped, keeping
//! the value it received, so one malformed decode can never blank out the
//! evidence the later steps and the matcher need.

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::centrifuge::{Centrifuge, CentrifugeConfig, ConfigError};
use crate::monitor::Monitor;
use crate::transform;
use crate::transform::utf7::{NativeUtf7, WideCharset};

/// Error raised by an individual transform step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("malformed input: {0}")]
    Malformed(String),
}

type PureFn = fn(&str) -> Result<String, StepError>;
type CharsetFn = fn(&str, Option<&dyn WideCharset>) -> Result<String, StepError>;

enum StepFn {
    Pure(PureFn),
    WithCharset(CharsetFn),
}

/// One named stage of the pipeline.
pub struct TransformStep {
    name: &'static str,
    f: StepFn,
}

impl TransformStep {
    fn pure(name: &'static str, f: PureFn) -> Self {
        Self {
            name,
            f: StepFn::Pure(f),
        }
    }

    fn with_charset(name: &'static str, f: CharsetFn) -> Self {
        Self {
            name,
            f: StepFn::WithCharset(f),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformStep").field("name", &self.name).finish()
    }
}

/// Pipeline construction knobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub centrifuge: CentrifugeConfig,
    /// Enable the wide-charset facility for full UTF-7 conversion. When
    /// disabled the UTF-7 step falls back to its static sequence table.
    pub wide_charset: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            centrifuge: CentrifugeConfig::default(),
            wide_charset: true,
        }
    }
}

/// Ordered canonicalization steps plus the trailing centrifuge stage.
///
/// Step order is load-bearing: comment stripping must precede entity
/// decoding, entity decoding must precede quote normalization, and so on
/// down the chain. [`Pipeline::default_steps`] is the one place the order
/// lives.
pub struct Pipeline {
    steps: Vec<TransformStep>,
    centrifuge: Centrifuge,
    charset: Option<Box<dyn WideCharset>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            steps: Self::default_steps(),
            centrifuge: Centrifuge::default(),
            charset: Some(Box::new(NativeUtf7)),
        }
    }

    pub fn with_config(config: PipelineConfig) -> Result<Self, ConfigError> {
        let centrifuge = Centrifuge::new(config.centrifuge)?;
        let charset: Option<Box<dyn WideCharset>> = if config.wide_charset {
            Some(Box::new(NativeUtf7))
        } else {
            None
        };
        Ok(Self {
            steps: Self::default_steps(),
            centrifuge,
            charset,
        })
    }

    /// Swaps in a caller-supplied wide-charset facility.
    pub fn with_charset(mut self, charset: Box<dyn WideCharset>) -> Self {
        self.charset = Some(charset);
        self
    }

    fn default_steps() -> Vec<TransformStep> {
        vec![
            TransformStep::pure("strip_comments", transform::structural::strip_comments),
            TransformStep::pure(
                "normalize_line_breaks",
                transform::structural::normalize_line_breaks,
            ),
            TransformStep::pure("decode_js_charcode", transform::charcode::decode_js_charcode),
            TransformStep::pure(
                "strip_js_regex_modifiers",
                transform::structural::strip_js_regex_modifiers,
            ),
            TransformStep::pure("decode_entities", transform::entities::decode_entities),
            TransformStep::pure("normalize_quotes", transform::structural::normalize_quotes),
            TransformStep::pure("canonicalize_sql", transform::sql::canonicalize_sql),
            TransformStep::pure("strip_control_chars", transform::entities::strip_control_chars),
            TransformStep::pure("decode_nested_base64", transform::base64::decode_nested_base64),
            TransformStep::pure("replace_out_of_range", transform::markup::replace_out_of_range),
            TransformStep::pure("strip_xml_tags", transform::markup::strip_xml_tags),
            TransformStep::pure("decode_js_unicode", transform::js_unicode::decode_js_unicode),
            TransformStep::with_charset("decode_utf7", transform::utf7::decode_utf7),
            TransformStep::pure("strip_concatenations", transform::concat::strip_concatenations),
            TransformStep::pure("decode_proprietary", transform::proprietary::decode_proprietary),
        ]
    }

    /// Names of the configured steps, in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name).collect()
    }

    /// Runs every step in order, then the centrifuge. Decoding steps append
    /// their variants after the working value; normalizing steps (quotes,
    /// SQL idioms, control chars, out-of-range bytes, the UTF-7 table path)
    /// canonicalize in place.
    pub fn run(&self, value: &str, monitor: &mut Monitor) -> String {
        let mut value = value.to_owned();
        for step in &self.steps {
            value = self.apply(step, value);
        }
        self.centrifuge.assess(&value, monitor)
    }

    fn apply(&self, step: &TransformStep, value: String) -> String {
        let result = match step.f {
            StepFn::Pure(f) => f(&value),
            StepFn::WithCharset(f) => f(&value, self.charset.as_deref()),
        };
        match result {
            Ok(converted) => {
                if converted.len() != value.len() {
                    debug!(
                        step = step.name,
                        in_len = value.len(),
                        out_len = converted.len(),
                        "step rewrote value"
                    );
                }
                converted
            }
            Err(err) => {
                warn!(step = step.name, error = %err, "step failed, keeping value");
                value
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_step(_value: &str) -> Result<String, StepError> {
        Err(StepError::Malformed("forced".into()))
    }

    #[test]
    fn failing_step_keeps_prior_value() {
        let pipeline = Pipeline::new();
        let step = TransformStep::pure("failing", failing_step);
        let out = pipeline.apply(&step, "payload".to_owned());
        assert_eq!(out, "payload");
    }

    #[test]
    fn step_order_is_fixed() {
        let names = Pipeline::new().step_names();
        assert_eq!(names.len(), 15);
        assert_eq!(names[0], "strip_comments");
        assert_eq!(names[14], "decode_proprietary");
        let entities = names.iter().position(|n| *n == "decode_entities");
        let quotes = names.iter().position(|n| *n == "normalize_quotes");
        assert!(entities < quotes);
    }

    #[test]
    fn config_without_charset_uses_table_fallback() {
        let pipeline = Pipeline::with_config(PipelineConfig {
            wide_charset: false,
            ..PipelineConfig::default()
        })
        .unwrap();
        let mut monitor = Monitor::new();
        let out = pipeline.run("+ACI-x+ACI-", &mut monitor);
        assert!(out.contains("\"x\""));
        assert!(!out.contains('\n'));
    }
}
