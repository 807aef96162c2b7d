//! Disease catalog and class label set
//!
//! The catalog maps a disease label to its ordered treatment steps. The label
//! set maps a model output index to a label. Both are validated once at
//! construction and are read-only afterwards.

use leafscan_core::{Error, Result, FALLBACK_TREATMENT};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Class labels in the output order of the default model
pub const DEFAULT_LABELS: [&str; 7] = [
    "Healthy Leaf",
    "Tomato Bacterial Spot",
    "Potato Early Blight",
    "Corn Common Rust",
    "Apple Scab",
    "Grape Black Rot",
    "Wheat Leaf Rust",
];

const DEFAULT_TREATMENTS: [(&str, [&str; 3]); 7] = [
    (
        "Tomato Bacterial Spot",
        [
            "Apply copper-based fungicides",
            "Avoid overhead irrigation",
            "Remove and destroy infected debris",
        ],
    ),
    (
        "Potato Early Blight",
        [
            "Practice 3-year crop rotation",
            "Apply chlorothalonil or mancozeb",
            "Space plants to improve air circulation",
        ],
    ),
    (
        "Corn Common Rust",
        [
            "Plant resistant hybrids",
            "Apply foliar fungicides early in the season",
            "Manage weeds that host rust fungi",
        ],
    ),
    (
        "Apple Scab",
        [
            "Prune trees to increase sun exposure",
            "Rake and destroy fallen leaves",
            "Apply sulfur-based sprays during dormant season",
        ],
    ),
    (
        "Grape Black Rot",
        [
            "Remove mummified berries",
            "Apply fungicides starting at bud break",
            "Improve drainage around the vine",
        ],
    ),
    (
        "Wheat Leaf Rust",
        [
            "Use rust-resistant wheat varieties",
            "Early planting to avoid peak spore levels",
            "Foliar fungicide application if infection > 5%",
        ],
    ),
    (
        "Healthy Leaf",
        [
            "Maintain current fertilization schedule",
            "Monitor for new pests weekly",
            "Ensure consistent watering",
        ],
    ),
];

/// Immutable lookup from disease label to treatment steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiseaseCatalog {
    entries: BTreeMap<String, Vec<String>>,
}

impl DiseaseCatalog {
    /// Build a catalog, rejecting empty catalogs, blank labels and empty entries
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let mut map = BTreeMap::new();

        for (label, treatment) in entries {
            if label.trim().is_empty() {
                return Err(Error::config("catalog contains a blank disease label"));
            }
            if treatment.is_empty() || treatment.iter().any(|step| step.trim().is_empty()) {
                return Err(Error::config(format!(
                    "catalog entry '{}' must list at least one non-blank treatment",
                    label
                )));
            }
            if map.insert(label.clone(), treatment).is_some() {
                return Err(Error::config(format!(
                    "catalog lists '{}' more than once",
                    label
                )));
            }
        }

        if map.is_empty() {
            return Err(Error::config("disease catalog is empty"));
        }

        Ok(Self { entries: map })
    }

    /// The catalog shipped with the service
    pub fn builtin() -> Self {
        let entries = DEFAULT_TREATMENTS
            .iter()
            .map(|(label, steps)| {
                (
                    label.to_string(),
                    steps.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        Self { entries }
    }

    /// Parse a YAML mapping of `label: [step, ...]`
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse disease catalog: {}", e)))?;
        Self::new(raw)
    }

    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Treatment steps for a label, if catalogued
    pub fn treatment(&self, label: &str) -> Option<&[String]> {
        self.entries.get(label).map(Vec::as_slice)
    }

    /// Treatment steps for a label, or the single-step fallback
    pub fn resolve(&self, label: &str) -> Vec<String> {
        match self.treatment(label) {
            Some(steps) => steps.to_vec(),
            None => vec![FALLBACK_TREATMENT.to_string()],
        }
    }

    /// Entry at a position in label order
    pub fn entry_at(&self, index: usize) -> Option<(&str, &[String])> {
        self.entries
            .iter()
            .nth(index)
            .map(|(label, steps)| (label.as_str(), steps.as_slice()))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Labels in sorted order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DiseaseCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Ordered mapping from model output index to class label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Build a label set, rejecting empty, blank or duplicate labels
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(Error::config("label set is empty"));
        }

        let mut seen = HashSet::new();
        for label in &labels {
            if label.trim().is_empty() {
                return Err(Error::config("label set contains a blank label"));
            }
            if !seen.insert(label.as_str()) {
                return Err(Error::config(format!("label '{}' appears more than once", label)));
            }
        }

        Ok(Self { labels })
    }

    pub fn builtin() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Fail unless the model produces exactly one score per label
    pub fn ensure_width(&self, output_width: usize) -> Result<()> {
        if output_width != self.labels.len() {
            return Err(Error::model_load(format!(
                "model outputs {} classes but {} labels are configured",
                output_width,
                self.labels.len()
            )));
        }
        Ok(())
    }
}
