//! Worker configuration parsing, validation, and defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Result, WorkerError};

/// Configurable timeout values (seconds) for compute-bound request kinds.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Reply ceiling for `load-model`. The load itself keeps running after
    /// the ceiling; only the reply window closes.
    #[serde(default = "default_load_seconds")]
    pub load_seconds: u64,
    /// Reply ceiling for `run-task` and `quick-run`.
    #[serde(default = "default_generate_seconds")]
    pub generate_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            load_seconds: default_load_seconds(),
            generate_seconds: default_generate_seconds(),
        }
    }
}

fn default_load_seconds() -> u64 {
    300
}

fn default_generate_seconds() -> u64 {
    30
}

/// Retention policy for saved result records.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RetentionConfig {
    /// Results older than this are pruned on each maintenance tick.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
    /// Newest-first count cap applied after the age prune.
    #[serde(default = "default_max_count")]
    pub max_count: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
            max_count: default_max_count(),
        }
    }
}

fn default_max_age_days() -> u32 {
    30
}

fn default_max_count() -> u32 {
    100
}

/// Sampling and length bounds forwarded to the inference capability.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GenerationConfig {
    /// Token budget for `run-task`.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Reduced token budget for `quick-run`.
    #[serde(default = "default_quick_max_tokens")]
    pub quick_max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Nucleus sampling bound.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            quick_max_tokens: default_quick_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

fn default_max_tokens() -> u32 {
    256
}

fn default_quick_max_tokens() -> u32 {
    128
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

/// A known model configuration the worker can load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ModelEntry {
    /// Opaque identifier passed to the capability.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Approximate download size, display only.
    #[serde(default)]
    pub size: Option<String>,
}

fn default_model_catalog() -> Vec<ModelEntry> {
    vec![
        ModelEntry {
            id: "tinyllama-1.1b-chat-q4".into(),
            name: "TinyLlama 1.1B".into(),
            size: Some("~600MB".into()),
        },
        ModelEntry {
            id: "llama-2-7b-chat-q4".into(),
            name: "Llama 2 7B".into(),
            size: Some("~4GB".into()),
        },
        ModelEntry {
            id: "gemma-2b-it-q4".into(),
            name: "Gemma 2B".into(),
            size: Some("~1.5GB".into()),
        },
    ]
}

fn default_default_model() -> String {
    "tinyllama-1.1b-chat-q4".into()
}

fn default_ipc_name() -> String {
    "loomd-worker".into()
}

fn default_tick_seconds() -> u64 {
    300
}

fn default_staleness_minutes() -> u64 {
    30
}

/// Worker configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Directory holding the SQLite database.
    pub data_dir: PathBuf,
    /// Named pipe / Unix socket identifier frontends connect to.
    #[serde(default = "default_ipc_name")]
    pub ipc_name: String,
    /// Model loaded when a `load-model` request omits a session id.
    #[serde(default = "default_default_model")]
    pub default_model: String,
    /// Models the worker accepts load requests for.
    #[serde(default = "default_model_catalog")]
    pub models: Vec<ModelEntry>,
    /// Revival tick interval. The scheduler rejects values below one minute.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
    /// Persisted state older than this is discarded on restore.
    #[serde(default = "default_staleness_minutes")]
    pub staleness_minutes: u64,
    /// Reply ceilings for compute-bound kinds.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Result retention bounds.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Generation parameter bounds.
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl WorkerConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| WorkerError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the SQLite database file under `data_dir`.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("loomd.db")
    }

    /// Resolve a requested model id against the catalog, falling back to
    /// the default model when the request omits one.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::InvalidInput` if the id is not in the catalog.
    pub fn resolve_model(&self, requested: Option<&str>) -> Result<String> {
        let id = requested.unwrap_or(&self.default_model);
        if self.models.iter().any(|entry| entry.id == id) {
            Ok(id.to_owned())
        } else {
            Err(WorkerError::InvalidInput(format!("unknown model: {id}")))
        }
    }

    fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(WorkerError::Config("model catalog must not be empty".into()));
        }
        if !self.models.iter().any(|entry| entry.id == self.default_model) {
            return Err(WorkerError::Config(format!(
                "default_model '{}' is not in the model catalog",
                self.default_model
            )));
        }
        if self.retention.max_count == 0 {
            return Err(WorkerError::Config(
                "retention.max_count must be greater than zero".into(),
            ));
        }
        if self.timeouts.generate_seconds == 0 || self.timeouts.load_seconds == 0 {
            return Err(WorkerError::Config(
                "timeout ceilings must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
