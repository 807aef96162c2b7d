//! Core types for LeafScan

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Treatment returned when a disease label has no catalog entry
pub const FALLBACK_TREATMENT: &str = "Consult local agricultural expert";

/// Number of decimal digits kept when a confidence is presented externally
pub const CONFIDENCE_DECIMALS: i32 = 4;

/// Coarse triage tier derived from confidence and disease identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// All tiers, lowest first
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(crate::Error::config(format!("unknown severity '{}'", other))),
        }
    }
}

/// Diagnosis produced by the inference pipeline for a single image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Disease label (or the healthy label)
    pub disease_name: String,

    /// Full-precision confidence in [0, 1]; rounded only when serialized
    #[serde(serialize_with = "serialize_confidence")]
    pub confidence: f32,

    /// Triage tier derived from confidence and disease
    pub severity: Severity,

    /// Ordered treatment recommendations, never empty
    pub treatment: Vec<String>,
}

impl PredictionResult {
    /// Create a new prediction result.
    ///
    /// An empty treatment list is replaced with the single-element fallback.
    pub fn new(
        disease_name: impl Into<String>,
        confidence: f32,
        severity: Severity,
        treatment: Vec<String>,
    ) -> Self {
        let treatment = if treatment.is_empty() {
            vec![FALLBACK_TREATMENT.to_string()]
        } else {
            treatment
        };

        Self {
            disease_name: disease_name.into(),
            confidence,
            severity,
            treatment,
        }
    }

    /// Confidence rounded for presentation
    pub fn rounded_confidence(&self) -> f64 {
        round_confidence(self.confidence)
    }

    /// Whether the treatment is the catalog-miss fallback
    pub fn is_fallback_treatment(&self) -> bool {
        self.treatment.len() == 1 && self.treatment[0] == FALLBACK_TREATMENT
    }
}

/// Round a confidence to [`CONFIDENCE_DECIMALS`] digits
pub fn round_confidence(confidence: f32) -> f64 {
    let scale = 10f64.powi(CONFIDENCE_DECIMALS);
    (f64::from(confidence) * scale).round() / scale
}

fn serialize_confidence<S: Serializer>(confidence: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_confidence(*confidence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_treatment_gets_fallback() {
        let result = PredictionResult::new("Mystery Mold", 0.8, Severity::Medium, vec![]);
        assert_eq!(result.treatment, vec![FALLBACK_TREATMENT.to_string()]);
        assert!(result.is_fallback_treatment());
    }

    #[test]
    fn test_confidence_rounded_only_when_serialized() {
        let result = PredictionResult::new(
            "Apple Scab",
            0.912_345_6,
            Severity::High,
            vec!["Rake and destroy fallen leaves".to_string()],
        );

        assert_eq!(result.confidence, 0.912_345_6);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["confidence"].as_f64().unwrap(), 0.9123);
        assert_eq!(json["severity"], "high");
        assert_eq!(json["disease_name"], "Apple Scab");
    }

    #[test]
    fn test_round_confidence_boundaries() {
        assert_eq!(round_confidence(0.9), 0.9);
        assert_eq!(round_confidence(0.75), 0.75);
        assert_eq!(round_confidence(1.0), 1.0);
        assert_eq!(round_confidence(0.0), 0.0);
        assert_eq!(round_confidence(0.999_96), 1.0);
    }

    #[test]
    fn test_severity_parse_and_display() {
        for severity in Severity::ALL {
            assert_eq!(severity.as_str().parse::<Severity>().unwrap(), severity);
        }
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert!("critical".parse::<Severity>().is_err());
        assert_eq!(Severity::Medium.to_string(), "medium");
        assert!(Severity::Low < Severity::High);
    }
}
