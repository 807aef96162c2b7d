//! Confidence-to-severity mapping

use leafscan_core::Severity;

/// Confidence strictly above this is `High`
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.90;

/// Confidence strictly above this (and not above high) is `Medium`
pub const MEDIUM_CONFIDENCE_THRESHOLD: f32 = 0.75;

const HEALTHY_MARKER: &str = "healthy";

/// Whether a label names the healthy class
pub fn is_healthy(disease_name: &str) -> bool {
    disease_name.to_lowercase().contains(HEALTHY_MARKER)
}

/// Derive the triage tier for a prediction.
///
/// Healthy labels are always `Low`. Thresholds are strict, so a confidence of
/// exactly 0.90 is `Medium` and exactly 0.75 is `Low`.
pub fn derive_severity(confidence: f32, disease_name: &str) -> Severity {
    if is_healthy(disease_name) {
        return Severity::Low;
    }

    if confidence > HIGH_CONFIDENCE_THRESHOLD {
        Severity::High
    } else if confidence > MEDIUM_CONFIDENCE_THRESHOLD {
        Severity::Medium
    } else {
        Severity::Low
    }
}
