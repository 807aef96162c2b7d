//! Error types for LeafScan

/// Result type alias using LeafScan's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for LeafScan operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The uploaded bytes are not a decodable image (client input)
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// A model artifact exists but could not be loaded
    #[error("model load error: {0}")]
    ModelLoad(String),

    /// Forward pass or postprocessing failed on a valid input
    #[error("inference failed: {0}")]
    Inference(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Detection record storage errors
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new invalid image error
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// Create a new model load error
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error was caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidImage(_))
    }

    /// Short, stable label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidImage(_) => "invalid_image",
            Self::ModelLoad(_) => "model_load",
            Self::Inference(_) => "inference",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_invalid_image_is_client_error() {
        assert!(Error::invalid_image("truncated header").is_client_error());
        assert!(!Error::inference("forward pass").is_client_error());
        assert!(!Error::model_load("bad artifact").is_client_error());
        assert!(!Error::config("missing").is_client_error());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::invalid_image("empty buffer").to_string(),
            "invalid image: empty buffer"
        );
        assert_eq!(
            Error::inference("shape mismatch").to_string(),
            "inference failed: shape mismatch"
        );
        assert_eq!(Error::model_load("x").kind(), "model_load");
    }
}
