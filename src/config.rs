//! Configuration loaded from YAML with environment overrides
//!
//! Every field has a default, so an absent or partial file is fine. The API
//! key is never read from or written to the file.

use crate::acquire::{AcquireConfig, RetryPolicy, DEFAULT_BACKOFF_MS, DEFAULT_RETRIES};
use crate::llm::DEFAULT_BASE_URL;
use crate::pipeline::{
    EngineOptions, DEFAULT_CONCURRENCY, DEFAULT_DEPTH, DEFAULT_FANOUT, DEFAULT_MODEL,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const MAX_DEPTH: usize = 8;
const MAX_FANOUT: usize = 50;
const MAX_RETRIES: u32 = 10;
const MAX_CONCURRENCY: usize = 32;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HlsfConfig {
    pub model: String,
    pub depth: usize,
    pub fanout: usize,
    /// Add sequential edges from the input text to the graph
    pub sequence_edges: bool,
    pub acquisition: AcquisitionSettings,
    pub llm: LlmSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    pub retries: u32,
    pub backoff_ms: Vec<u64>,
    pub min_base: usize,
    pub min_forced: usize,
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Only ever set from `OPENAI_API_KEY`
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Directory for the file store, database file for SQLite
    pub path: Option<PathBuf>,
}

impl Default for HlsfConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            depth: DEFAULT_DEPTH,
            fanout: DEFAULT_FANOUT,
            sequence_edges: false,
            acquisition: AcquisitionSettings::default(),
            llm: LlmSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        let defaults = AcquireConfig::default();
        Self {
            retries: DEFAULT_RETRIES,
            backoff_ms: DEFAULT_BACKOFF_MS.to_vec(),
            min_base: defaults.min_base,
            min_forced: defaults.min_forced,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 120,
            api_key: None,
        }
    }
}

impl HlsfConfig {
    /// `<config_dir>/hlsf/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hlsf").join("config.yaml"))
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when it
    /// exists, then apply environment overrides and validate.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        debug!(path = %path.display(), "Loading config");
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply `HLSF_MODEL` (or `MODEL`), `OPENAI_API_KEY` and `HLSF_BASE_URL`.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        if let Some(model) = set("HLSF_MODEL").or_else(|| set("MODEL")) {
            self.model = model;
        }
        if let Some(key) = set("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = set("HLSF_BASE_URL") {
            self.llm.base_url = url;
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.model.trim().is_empty() {
            return invalid("model must not be empty".into());
        }
        if self.depth > MAX_DEPTH {
            return invalid(format!("depth must be at most {}", MAX_DEPTH));
        }
        if !(1..=MAX_FANOUT).contains(&self.fanout) {
            return invalid(format!("fanout must be between 1 and {}", MAX_FANOUT));
        }
        let acq = &self.acquisition;
        if acq.retries > MAX_RETRIES {
            return invalid(format!("acquisition.retries must be at most {}", MAX_RETRIES));
        }
        if acq.retries > 0 && acq.backoff_ms.is_empty() {
            return invalid("acquisition.backoff_ms must not be empty when retrying".into());
        }
        if !(1..=MAX_CONCURRENCY).contains(&acq.concurrency) {
            return invalid(format!(
                "acquisition.concurrency must be between 1 and {}",
                MAX_CONCURRENCY
            ));
        }
        if acq.min_base == 0 {
            return invalid("acquisition.min_base must be positive".into());
        }
        if acq.min_forced < acq.min_base {
            return invalid("acquisition.min_forced must not be below min_base".into());
        }
        if self.llm.timeout_secs == 0 {
            return invalid("llm.timeout_secs must be positive".into());
        }
        Ok(())
    }

    /// Where records are stored, defaulting under the user data directory.
    pub fn store_path(&self) -> PathBuf {
        if let Some(path) = &self.store.path {
            return path.clone();
        }
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
        let root = data_dir.join("hlsf");
        match self.store.backend {
            StoreBackend::File => root.join("records"),
            StoreBackend::Sqlite => root.join("hlsf.db"),
        }
    }

    pub fn acquire_config(&self) -> AcquireConfig {
        AcquireConfig {
            min_base: self.acquisition.min_base,
            min_forced: self.acquisition.min_forced,
            retry: RetryPolicy::new(self.acquisition.retries, &self.acquisition.backoff_ms),
            ..AcquireConfig::default()
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            model: self.model.clone(),
            depth: self.depth,
            fanout: self.fanout,
            concurrency: self.acquisition.concurrency,
            sequence_edges: self.sequence_edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn defaults_are_valid() {
        let config = HlsfConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.acquisition.backoff_ms, vec![1000, 2000, 4000, 8000]);
        assert_eq!(config.store.backend, StoreBackend::File);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = HlsfConfig::from_yaml_str(
            "depth: 3\nacquisition:\n  concurrency: 8\nstore:\n  backend: sqlite\n  path: /tmp/h.db\n",
        )
        .unwrap();
        assert_eq!(config.depth, 3);
        assert_eq!(config.fanout, 5);
        assert_eq!(config.acquisition.concurrency, 8);
        assert_eq!(config.acquisition.retries, 4);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store_path(), PathBuf::from("/tmp/h.db"));
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(HlsfConfig::from_yaml_str("  \n").unwrap(), HlsfConfig::default());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = HlsfConfig::from_yaml_str("depth: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn api_key_in_file_is_ignored() {
        let config = HlsfConfig::from_yaml_str("llm:\n  api_key: sk-leaked\n").unwrap();
        assert_eq!(config.llm.api_key, None);
    }

    #[test]
    fn environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("MODEL", "fallback-model"),
            ("OPENAI_API_KEY", "sk-test"),
            ("HLSF_BASE_URL", "http://localhost:8080/v1"),
            ("HLSF_MODEL", "  "),
        ]
        .into_iter()
        .collect();
        let mut config = HlsfConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.model, "fallback-model");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn hlsf_model_wins_over_model() {
        let mut config = HlsfConfig::default();
        config.apply_env(|key| match key {
            "HLSF_MODEL" => Some("primary".to_string()),
            "MODEL" => Some("secondary".to_string()),
            _ => None,
        });
        assert_eq!(config.model, "primary");
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let cases = [
            "fanout: 0",
            "depth: 99",
            "acquisition:\n  retries: 11",
            "acquisition:\n  concurrency: 0",
            "acquisition:\n  min_base: 30\n  min_forced: 20",
            "acquisition:\n  backoff_ms: []",
        ];
        for case in cases {
            let config = HlsfConfig::from_yaml_str(case).unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "accepted: {}",
                case
            );
        }
    }

    #[test]
    fn explicit_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        let err = HlsfConfig::load(Some(missing.as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn derived_settings() {
        let config = HlsfConfig::from_yaml_str(
            "model: m1\ndepth: 1\nsequence_edges: true\nacquisition:\n  retries: 2\n  backoff_ms: [10, 20]\n  min_base: 6\n  min_forced: 9\n",
        )
        .unwrap();
        let acquire = config.acquire_config();
        assert_eq!(acquire.min_base, 6);
        assert_eq!(acquire.min_forced, 9);
        assert_eq!(acquire.min_base_slots, 6);
        assert_eq!(acquire.retry.retries, 2);
        assert_eq!(
            acquire.retry.delays,
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );

        let options = config.engine_options();
        assert_eq!(options.model, "m1");
        assert_eq!(options.depth, 1);
        assert!(options.sequence_edges);
        assert_eq!(options.concurrency, 4);
    }
}
