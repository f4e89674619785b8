use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the JSON snapshot file. `None` keeps the store in memory only.
    pub snapshot_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL of an OpenAI-compatible chat completions endpoint.
    /// Overridden at runtime by `NOESIS_ORACLE_BASE_URL` when set.
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the provider API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3.1:8b".to_string(),
            api_key_env: "NOESIS_ORACLE_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialecticConfig {
    /// Learning-objective completion threshold in percent. A dialectic keeps
    /// asking while completion is strictly below this value.
    pub completion_threshold: f64,
    /// Attach predictive-processing contexts to assembled belief systems.
    pub predictive_processing: bool,
    /// Request an oracle analysis after each answered turn.
    pub analysis_enabled: bool,
}

impl Default for DialecticConfig {
    fn default() -> Self {
        Self {
            completion_threshold: 95.0,
            predictive_processing: true,
            analysis_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub oracle: OracleConfig,
    pub dialectic: DialecticConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(value) = env::var("NOESIS_ORACLE_BASE_URL")
            && !value.is_empty()
        {
            config.oracle.base_url = value;
        }
        if let Ok(value) = env::var("NOESIS_SNAPSHOT_PATH")
            && !value.is_empty()
        {
            config.store.snapshot_path = Some(value);
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = AppConfig::default();
        assert!(config.store.snapshot_path.is_none());
        assert_eq!(config.dialectic.completion_threshold, 95.0);
        assert!(config.dialectic.predictive_processing);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from("/definitely/not/here.toml").unwrap();
        assert_eq!(config.oracle.timeout_secs, 60);
    }

    #[test]
    fn partial_toml_overlays_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noesis.toml");
        fs::write(&path, "[dialectic]\ncompletion_threshold = 90.0\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.dialectic.completion_threshold, 90.0);
        assert_eq!(config.oracle.model, "llama3.1:8b");
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noesis.toml");

        let mut config = AppConfig::default();
        config.store.snapshot_path = Some("/tmp/store.json".to_string());
        config.save_to(&path).unwrap();

        let back = AppConfig::load_from(&path).unwrap();
        assert_eq!(back.store.snapshot_path.as_deref(), Some("/tmp/store.json"));
    }
}
