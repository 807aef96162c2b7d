//! Detection records and history queries

use chrono::{DateTime, Utc};
use leafscan_core::{PredictionResult, Severity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Page size used when a history query sets no limit
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// One stored diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Unique record ID
    pub id: String,

    /// Opaque caller identity
    pub user_id: String,

    pub disease_name: String,

    /// Confidence rounded for presentation
    pub confidence: f64,

    pub severity: Severity,

    pub treatment: Vec<String>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    /// Hex SHA-256 of the uploaded image bytes
    pub image_sha256: String,

    pub created_at: DateTime<Utc>,
}

impl DetectionRecord {
    /// Create a record for a prediction made on `image` by `user_id`
    pub fn new(user_id: impl Into<String>, prediction: &PredictionResult, image: &[u8]) -> Self {
        Self {
            id: generate_record_id(),
            user_id: user_id.into(),
            disease_name: prediction.disease_name.clone(),
            confidence: prediction.rounded_confidence(),
            severity: prediction.severity,
            treatment: prediction.treatment.clone(),
            latitude: None,
            longitude: None,
            image_sha256: image_digest(image),
            created_at: Utc::now(),
        }
    }

    /// Attach coordinates, rejecting values off the globe
    pub fn with_location(
        mut self,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Self, CoordinateError> {
        check_coordinates(latitude, longitude)?;
        self.latitude = latitude;
        self.longitude = longitude;
        Ok(self)
    }
}

fn generate_record_id() -> String {
    format!("det_{}", uuid::Uuid::new_v4())
}

/// Hex-encoded SHA-256 of an image
pub fn image_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Rejected geolocation
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

/// Validate optional coordinates; NaN and infinities are rejected
pub fn check_coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<(), CoordinateError> {
    if let Some(lat) = latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
    }
    if let Some(lon) = longitude {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
    }
    Ok(())
}

/// Filter for detection history. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Only records of this caller
    pub user_id: Option<String>,

    /// Only records of this severity
    pub severity: Option<Severity>,

    /// Only records created at or after this instant
    pub since: Option<DateTime<Utc>>,

    /// Maximum results to return
    pub limit: Option<usize>,

    /// Offset for pagination
    pub offset: Option<usize>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one caller
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Set limit and offset
    pub fn paginate(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if a record matches every filter
    pub fn matches(&self, record: &DetectionRecord) -> bool {
        if let Some(ref user_id) = self.user_id {
            if &record.user_id != user_id {
                return false;
            }
        }

        if let Some(severity) = self.severity {
            if record.severity != severity {
                return false;
            }
        }

        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }

        true
    }

    /// Apply filters and pagination to records stored oldest first
    pub fn select(&self, records: &[DetectionRecord]) -> Vec<DetectionRecord> {
        records
            .iter()
            .rev()
            .filter(|record| self.matches(record))
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .cloned()
            .collect()
    }
}
