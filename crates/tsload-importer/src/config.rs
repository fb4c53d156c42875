//! Loader configuration
//!
//! Settings come from an optional YAML file (kebab-case keys, every key
//! optional) and are then overridden by command-line flags.

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::classify::ClassifierOptions;
use crate::error::{ImportError, Result};
use crate::layout::DEFAULT_LAYOUT;
use crate::retry::BackoffPolicy;
use crate::writer::HttpStoreConfig;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Everything a load run needs besides the input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImportConfig {
    /// Server URL
    pub server_address: String,
    /// Target database
    pub database_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Measurement every point is written to
    pub measurement_name: String,
    /// Points per write request
    pub batch_size: usize,
    /// Comma-separated list of columns stored as tags
    pub tag_columns: String,
    /// Header name of the timestamp column
    pub timestamp_column: String,
    /// Reference-time layout, or `unix`
    pub timestamp_format: String,
    pub disable_auto_create_database: bool,
    pub force_float: bool,
    pub force_string: bool,
    pub treat_null_token_as_absent: bool,
    /// Write attempts per batch before giving up (0 = retry forever)
    pub max_write_attempts: u32,
    pub http_timeout_seconds: u64,
    /// First retry delay in milliseconds, doubled per failed attempt
    pub retry_min_millis: u64,
    /// Longest retry delay in milliseconds
    pub retry_max_millis: u64,
    /// Log the stored row count of the first field after every batch
    pub report_count: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            server_address: "http://localhost:8086".to_string(),
            database_name: "test".to_string(),
            username: None,
            password: None,
            measurement_name: "data".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            tag_columns: String::new(),
            timestamp_column: "timestamp".to_string(),
            timestamp_format: DEFAULT_LAYOUT.to_string(),
            disable_auto_create_database: false,
            force_float: false,
            force_string: false,
            treat_null_token_as_absent: false,
            max_write_attempts: 0,
            http_timeout_seconds: 30,
            retry_min_millis: 100,
            retry_max_millis: 10_000,
            report_count: false,
        }
    }
}

impl ImportConfig {
    /// Load a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| {
            ImportError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ImportError::Config("batch-size must be at least 1".into()));
        }
        if self.measurement_name.is_empty() {
            return Err(ImportError::Config("measurement-name must not be empty".into()));
        }
        if self.timestamp_column.is_empty() {
            return Err(ImportError::Config("timestamp-column must not be empty".into()));
        }
        Url::parse(&self.server_address).map_err(|e| {
            ImportError::Config(format!(
                "Invalid server address '{}': {}",
                self.server_address, e
            ))
        })?;
        Ok(())
    }

    /// Tag column names, trimmed, without empties
    pub fn tag_names(&self) -> HashSet<String> {
        self.tag_columns
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn classifier_options(&self) -> ClassifierOptions {
        ClassifierOptions {
            force_float: self.force_float,
            force_string: self.force_string,
            treat_null: self.treat_null_token_as_absent,
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            min: Duration::from_millis(self.retry_min_millis),
            max: Duration::from_millis(self.retry_max_millis),
            ..Default::default()
        }
    }

    pub fn store_config(&self) -> HttpStoreConfig {
        HttpStoreConfig {
            server_url: self.server_address.clone(),
            database: self.database_name.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: Duration::from_secs(self.http_timeout_seconds),
        }
    }
}
