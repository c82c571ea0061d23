use crate::gate::AdmissionWindow;
use crate::storage::{StorageBackend, StorageConfig};
use anyhow::{Result, anyhow};
use chrono::FixedOffset;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure that can be loaded from CLI, config file, or environment
///
/// Example configuration file content
/// # Admission Gate Configuration
///
/// # Server configuration
/// listen_on_port = 5000
/// internal_port = 5001
/// workspace = "./data"
///
/// # Shared secret the kiosk signs credentials with
/// secret = "change-me"
///
/// # Civil timezone of the venue and the admission window
/// utc_offset = "+09:00"
/// open_before_mins = 60
/// close_after_mins = 120
///
/// # Default event schedule written by the kiosk (optional)
/// kiosk_config = "./kiosk_config.json"
///
/// # Storage configuration
/// storage_backend = "local"  # Options: "local", "s3" or "memory"
///
/// # S3 configuration (required when storage_backend = "s3")
/// s3_bucket = "my-ledger-bucket"
/// s3_endpoint = "http://localhost:9000"  # Optional: for MinIO or custom S3
/// s3_region = "us-east-1"                # Optional
/// s3_access_key_id = "minioadmin"
/// s3_secret_access_key = "minioadmin"
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Port the verification endpoint listens on
    #[arg(short, long, default_value_t = 5000)]
    #[serde(default = "default_port")]
    pub listen_on_port: u16,

    /// Port of the internal management API
    #[arg(short, long, default_value_t = 5001)]
    #[serde(default = "default_internal_port")]
    pub internal_port: u16,

    /// Working directory for the local ledger
    #[arg(short = 'w', long, default_value = ".")]
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Configuration file path (overrides all other arguments)
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Shared secret used to derive credential tokens
    #[arg(long)]
    #[serde(skip_serializing)]
    pub secret: Option<String>,

    /// UTC offset of the venue's civil time, e.g. +09:00
    #[arg(long, default_value = "+09:00", allow_hyphen_values = true)]
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// Minutes before the event start when admission opens
    #[arg(long, default_value_t = 60)]
    #[serde(default = "default_open_before_mins")]
    pub open_before_mins: u32,

    /// Minutes after the event start when admission closes
    #[arg(long, default_value_t = 120)]
    #[serde(default = "default_close_after_mins")]
    pub close_after_mins: u32,

    /// JSON file holding the default event schedule (date, hour, minute)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kiosk_config: Option<String>,

    /// Storage backend: local, s3 or memory
    #[arg(short, long, default_value = "local")]
    #[serde(default = "default_storage_backend")]
    pub storage_backend: String,

    /// S3 bucket name (required when storage-backend is s3)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_bucket: Option<String>,

    /// S3 endpoint (for MinIO/custom S3)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_endpoint: Option<String>,

    /// S3 region
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_region: Option<String>,

    /// S3 access key ID
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_access_key_id: Option<String>,

    /// S3 secret access key
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_secret_access_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_on_port: default_port(),
            internal_port: default_internal_port(),
            workspace: default_workspace(),
            config: None,
            secret: None,
            utc_offset: default_utc_offset(),
            open_before_mins: default_open_before_mins(),
            close_after_mins: default_close_after_mins(),
            kiosk_config: None,
            storage_backend: default_storage_backend(),
            s3_bucket: None,
            s3_endpoint: None,
            s3_region: None,
            s3_access_key_id: None,
            s3_secret_access_key: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        // First parse CLI args
        let mut config = Config::parse();

        // If a config file is specified, load it and merge
        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // If CLI value is default, use file value
        if self.listen_on_port == default_port() {
            self.listen_on_port = file_config.listen_on_port;
        }
        if self.internal_port == default_internal_port() {
            self.internal_port = file_config.internal_port;
        }
        if self.workspace == default_workspace() {
            self.workspace = file_config.workspace;
        }
        if self.utc_offset == default_utc_offset() {
            self.utc_offset = file_config.utc_offset;
        }
        if self.open_before_mins == default_open_before_mins() {
            self.open_before_mins = file_config.open_before_mins;
        }
        if self.close_after_mins == default_close_after_mins() {
            self.close_after_mins = file_config.close_after_mins;
        }
        if self.storage_backend == default_storage_backend() {
            self.storage_backend = file_config.storage_backend;
        }

        // For Option fields, CLI takes precedence if Some
        if self.secret.is_none() {
            self.secret = file_config.secret;
        }
        if self.kiosk_config.is_none() {
            self.kiosk_config = file_config.kiosk_config;
        }
        if self.s3_bucket.is_none() {
            self.s3_bucket = file_config.s3_bucket;
        }
        if self.s3_endpoint.is_none() {
            self.s3_endpoint = file_config.s3_endpoint;
        }
        if self.s3_region.is_none() {
            self.s3_region = file_config.s3_region;
        }
        if self.s3_access_key_id.is_none() {
            self.s3_access_key_id = file_config.s3_access_key_id;
        }
        if self.s3_secret_access_key.is_none() {
            self.s3_secret_access_key = file_config.s3_secret_access_key;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.secret.as_ref().map(|s| s.is_empty()).unwrap_or(true) {
            return Err(anyhow!("A non-empty shared secret is required"));
        }

        self.timezone()?;

        if self.open_before_mins == 0 && self.close_after_mins == 0 {
            return Err(anyhow!(
                "Admission window is empty, set open_before_mins or close_after_mins"
            ));
        }

        // Validate storage configuration
        match self.storage_backend.as_str() {
            "local" | "memory" => {}
            "s3" => {
                if self
                    .s3_bucket
                    .as_ref()
                    .map(|s| s.is_empty())
                    .unwrap_or(true)
                {
                    return Err(anyhow!("S3 bucket name is required when backend is 's3'"));
                }
                if self
                    .s3_access_key_id
                    .as_ref()
                    .map(|s| s.is_empty())
                    .unwrap_or(true)
                {
                    return Err(anyhow!(
                        "S3 access key ID is required when backend is 's3'"
                    ));
                }
                if self
                    .s3_secret_access_key
                    .as_ref()
                    .map(|s| s.is_empty())
                    .unwrap_or(true)
                {
                    return Err(anyhow!(
                        "S3 secret access key is required when backend is 's3'"
                    ));
                }
            }
            backend => {
                return Err(anyhow!(
                    "Unsupported storage backend: {}. Use 'local', 's3' or 'memory'",
                    backend
                ));
            }
        }

        Ok(())
    }

    /// Shared secret, empty until validated
    pub fn secret(&self) -> &str {
        self.secret.as_deref().unwrap_or_default()
    }

    /// Civil timezone all admission times are compared in
    pub fn timezone(&self) -> Result<FixedOffset> {
        self.utc_offset
            .parse::<FixedOffset>()
            .map_err(|error| anyhow!("Invalid utc_offset {:?}: {error}", self.utc_offset))
    }

    pub fn admission_window(&self) -> AdmissionWindow {
        AdmissionWindow::from_minutes(self.open_before_mins, self.close_after_mins)
    }

    /// Convert to the ledger storage configuration
    pub fn to_storage_config(&self) -> Result<StorageConfig> {
        let backend = match self.storage_backend.as_str() {
            "local" => StorageBackend::Local,
            "memory" => StorageBackend::Memory,
            "s3" => StorageBackend::S3 {
                bucket: self
                    .s3_bucket
                    .clone()
                    .ok_or_else(|| anyhow!("S3 bucket name is required"))?,
                endpoint: self.s3_endpoint.clone(),
                region: self.s3_region.clone(),
                access_key_id: self
                    .s3_access_key_id
                    .clone()
                    .ok_or_else(|| anyhow!("S3 access key ID is required"))?,
                secret_access_key: self
                    .s3_secret_access_key
                    .clone()
                    .ok_or_else(|| anyhow!("S3 secret access key is required"))?,
            },
            backend => {
                return Err(anyhow!("Unsupported storage backend: {backend}"));
            }
        };

        Ok(StorageConfig {
            backend,
            workspace: PathBuf::from(&self.workspace),
        })
    }
}

// Default value functions
fn default_port() -> u16 {
    5000
}

fn default_internal_port() -> u16 {
    5001
}

fn default_workspace() -> String {
    ".".to_string()
}

fn default_utc_offset() -> String {
    "+09:00".to_string()
}

fn default_open_before_mins() -> u32 {
    60
}

fn default_close_after_mins() -> u32 {
    120
}

fn default_storage_backend() -> String {
    "local".to_string()
}
