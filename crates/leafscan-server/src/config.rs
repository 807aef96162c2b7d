//! Server configuration

use leafscan_inference::InferenceConfig;
use leafscan_telemetry::{PersistenceConfig, StorageConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment variables, e.g. `LEAFSCAN_PORT`
pub const ENV_PREFIX: &str = "LEAFSCAN";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix for the detection API
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Allowed CORS origins; `*` allows any
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum request body size
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Detection history backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Model, catalog and mock settings
    #[serde(default)]
    pub inference: InferenceConfig,
}

/// Values given on the command line; they win over file and environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model_path: Option<PathBuf>,
    pub listen: Option<String>,
    pub port: Option<u16>,
    pub records_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from file, environment and CLI overrides
    pub fn load(config_path: &Path, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            )
            .build()?;

        let mut config: Self = settings.try_deserialize()?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(path) = &overrides.model_path {
            self.inference.model.path = path.clone();
        }

        if let Some(listen) = &overrides.listen {
            self.listen = listen.clone();
        }

        if let Some(port) = overrides.port {
            self.port = port;
        }

        if let Some(dir) = &overrides.records_dir {
            self.storage = match &self.storage {
                StorageConfig::Jsonl(existing) => StorageConfig::Jsonl(PersistenceConfig {
                    records_dir: dir.clone(),
                    ..existing.clone()
                }),
                StorageConfig::Memory => StorageConfig::Jsonl(PersistenceConfig::new(dir)),
            };
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.api_prefix.starts_with('/') || self.api_prefix.ends_with('/') {
            anyhow::bail!(
                "api_prefix must start with '/' and must not end with '/', got '{}'",
                self.api_prefix
            );
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than zero");
        }
        if let StorageConfig::Jsonl(persistence) = &self.storage {
            if persistence.flush_interval == 0 {
                anyhow::bail!("storage.flush_interval must be greater than zero");
            }
        }
        self.inference.validate()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            api_prefix: default_api_prefix(),
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
            storage: StorageConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}
