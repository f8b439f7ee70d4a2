use serde::Serialize;

/// Write-only metrics handle the centrifuge stage reports into.
///
/// The caller owns the handle and supplies one per pipeline invocation; the
/// core only ever writes. Read accessors exist for the caller's benefit
/// (report aggregation, tests).
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Monitor {
    ratio: Option<f64>,
    threshold: Option<f64>,
    fingerprint: Option<String>,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_ratio(&mut self, ratio: f64, threshold: f64) {
        self.ratio = Some(ratio);
        self.threshold = Some(threshold);
    }

    pub(crate) fn record_fingerprint(&mut self, fingerprint: String) {
        self.fingerprint = Some(fingerprint);
    }

    /// Symbol-density ratio, set when the density check tripped.
    pub fn ratio(&self) -> Option<f64> {
        self.ratio
    }

    /// Threshold the ratio was compared against.
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Reduced structural fingerprint, set when the fingerprint check tripped.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// True if either centrifuge sub-check reported.
    pub fn tripped(&self) -> bool {
        self.ratio.is_some() || self.fingerprint.is_some()
    }
}
