//! Input canonicalization for signature-based injection detection.
//!
//! Attackers rarely send a payload in its plain spelling. They wrap it in
//! comments, entity references, charcode arithmetic, base64, UTF-7 shift
//! sequences, SQL keyword synonyms, or string concatenation so that a
//! pattern matcher downstream never sees the form its signatures describe.
//! This crate undoes that: [`Pipeline::run`] folds an input through a fixed,
//! ordered sequence of canonicalization transforms, accumulating decoded
//! variants alongside the original, then runs a statistical "centrifuge"
//! pass that flags symbol-dense or structurally anomalous strings even when
//! no signature would.
//!
//! ```
//! use decloak_core::{Monitor, Pipeline};
//!
//! let pipeline = Pipeline::new();
//! let mut monitor = Monitor::new();
//! let canonical = pipeline.run("&#x3c;script&#x3e;", &mut monitor);
//! assert!(canonical.contains("<script>"));
//! ```
//!
//! Decoding steps are additive: each appends its decoded variant after the
//! working value rather than substituting it. Normalizing steps (quote
//! variants, SQL idioms, control characters, out-of-range bytes) rewrite
//! their targets in place, so an input containing none of those characters
//! survives as a prefix of the output.

pub mod centrifuge;
pub mod monitor;
pub mod pipeline;
pub mod transform;

pub use centrifuge::{Centrifuge, CentrifugeConfig, ConfigError};
pub use monitor::Monitor;
pub use pipeline::{Pipeline, PipelineConfig, StepError, TransformStep};
pub use transform::utf7::{NativeUtf7, WideCharset};

/// Initialize JSON logging (call once early in your binary).
pub fn init_json_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .with_current_span(true)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .try_init();
}
