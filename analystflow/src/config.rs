//! Application configuration.
//!
//! Resolution order:
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. Environment variables

use crate::ingestion::{resolve_encoding, DEFAULT_PREVIEW_LENGTH};
use crate::llm::{DEFAULT_TEMPERATURE, DEFAULT_TOP_P};
use crate::pipeline::SkipPolicy;
use crate::records::StageKey;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        /// The config file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`AppConfig`].
    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        /// The config file.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Model identifiers and sampling for the four agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model for the requirements agent.
    pub requirements: String,
    /// Model for the actors agent.
    pub actors: String,
    /// Model for the data objects agent.
    pub data_objects: String,
    /// Model for the use cases agent.
    pub use_cases: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus-sampling cutoff.
    pub top_p: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let model = "gpt-4o-mini".to_string();
        Self {
            requirements: model.clone(),
            actors: model.clone(),
            data_objects: model.clone(),
            use_cases: model,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

impl ModelConfig {
    /// Returns the model used for the stage producing `key`.
    #[must_use]
    pub fn model_for(&self, key: StageKey) -> &str {
        match key {
            StageKey::Requirements => &self.requirements,
            StageKey::Actors => &self.actors,
            StageKey::DataObjects => &self.data_objects,
            StageKey::UseCases => &self.use_cases,
        }
    }

    fn model_mut(&mut self, key: StageKey) -> &mut String {
        match key {
            StageKey::Requirements => &mut self.requirements,
            StageKey::Actors => &mut self.actors,
            StageKey::DataObjects => &mut self.data_objects,
            StageKey::UseCases => &mut self.use_cases,
        }
    }
}

/// Chat-completions endpoint settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub api_base: String,
    /// API key; usually supplied through the environment.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            request_timeout_secs: 120,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where uploads are saved and documents are searched.
    pub working_dir: PathBuf,
    /// Where Markdown reports are written.
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("assets/input"),
            output_dir: PathBuf::from("assets/output/agent"),
        }
    }
}

/// Document ingestion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Supported file extensions, without the dot.
    pub extensions: Vec<String>,
    /// Encodings tried in order for text documents.
    pub encodings: Vec<String>,
    /// Preview length in characters.
    pub preview_length: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            extensions: ["pdf", "md", "txt"].map(String::from).to_vec(),
            encodings: ["utf-8", "latin-1", "cp1252", "iso-8859-1"]
                .map(String::from)
                .to_vec(),
            preview_length: DEFAULT_PREVIEW_LENGTH,
        }
    }
}

/// Stage execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on each stage call, in seconds.
    pub stage_timeout_secs: u64,
    /// Whether existing outputs are reused.
    pub skip_policy: SkipPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: 300,
            skip_policy: SkipPolicy::SkipExisting,
        }
    }
}

impl PipelineConfig {
    /// Returns the stage timeout.
    #[must_use]
    pub const fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

/// File-name stems for each output key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputKeyConfig {
    /// Stem for requirements.
    pub requirements: String,
    /// Stem for actors.
    pub actors: String,
    /// Stem for data objects.
    pub data_objects: String,
    /// Stem for use cases.
    pub use_cases: String,
}

impl Default for OutputKeyConfig {
    fn default() -> Self {
        Self {
            requirements: "ur".to_string(),
            actors: "ac".to_string(),
            data_objects: "do".to_string(),
            use_cases: "uc".to_string(),
        }
    }
}

impl OutputKeyConfig {
    /// Returns the stem for `key`.
    #[must_use]
    pub fn stem(&self, key: StageKey) -> &str {
        match key {
            StageKey::Requirements => &self.requirements,
            StageKey::Actors => &self.actors,
            StageKey::DataObjects => &self.data_objects,
            StageKey::UseCases => &self.use_cases,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Agent models.
    pub models: ModelConfig,
    /// Model endpoint.
    pub llm: LlmConfig,
    /// Filesystem locations.
    pub paths: PathsConfig,
    /// Ingestion settings.
    pub ingestion: IngestionConfig,
    /// Stage execution settings.
    pub pipeline: PipelineConfig,
    /// Export file stems.
    pub output_keys: OutputKeyConfig,
}

impl AppConfig {
    /// Loads defaults, then `path` if given, then the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// result fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        for (key, var) in [
            (StageKey::Requirements, "UR_AGENT_MODEL"),
            (StageKey::Actors, "AC_AGENT_MODEL"),
            (StageKey::DataObjects, "DO_AGENT_MODEL"),
            (StageKey::UseCases, "UC_AGENT_MODEL"),
        ] {
            if let Some(model) = get(var) {
                *self.models.model_mut(key) = model;
            }
        }

        if let Some(base) = get("ANALYSTFLOW_API_BASE") {
            self.llm.api_base = base;
        }
        if let Some(key) = get("ANALYSTFLOW_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(dir) = get("ANALYSTFLOW_WORKING_DIR") {
            self.paths.working_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("ANALYSTFLOW_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Some(secs) = get("ANALYSTFLOW_STAGE_TIMEOUT_SECS") {
            self.pipeline.stage_timeout_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "ANALYSTFLOW_STAGE_TIMEOUT_SECS must be a whole number of seconds, got '{secs}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Checks value ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingestion.extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "ingestion.extensions must not be empty".to_string(),
            ));
        }
        if self.ingestion.encodings.is_empty() {
            return Err(ConfigError::Invalid(
                "ingestion.encodings must not be empty".to_string(),
            ));
        }
        if let Some(unknown) = self
            .ingestion
            .encodings
            .iter()
            .find(|label| resolve_encoding(label).is_none())
        {
            return Err(ConfigError::Invalid(format!(
                "ingestion.encodings contains unknown encoding '{unknown}'"
            )));
        }
        if self.pipeline.stage_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.stage_timeout_secs must be greater than zero".to_string(),
            ));
        }
        for key in StageKey::ALL {
            if self.models.model_for(key).trim().is_empty() {
                return Err(ConfigError::Invalid(format!("models.{key} must not be empty")));
            }
            if self.output_keys.stem(key).trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "output_keys.{key} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.output_keys.stem(StageKey::DataObjects), "do");
        assert_eq!(config.pipeline.skip_policy, SkipPolicy::SkipExisting);
        assert_eq!(config.ingestion.preview_length, 500);
    }

    #[test]
    fn test_load_without_file_uses_valid_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert!(config.ingestion.encodings.iter().any(|e| e == "latin-1"));
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
            [models]
            actors = "gpt-4o"

            [pipeline]
            skip_policy = "always_rerun"

            [output_keys]
            actors = "actors"
            "#,
        )
        .unwrap();

        assert_eq!(config.models.model_for(StageKey::Actors), "gpt-4o");
        assert_eq!(config.models.model_for(StageKey::UseCases), "gpt-4o-mini");
        assert_eq!(config.pipeline.skip_policy, SkipPolicy::AlwaysRerun);
        assert_eq!(config.output_keys.stem(StageKey::Actors), "actors");
        assert_eq!(config.output_keys.stem(StageKey::Requirements), "ur");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env_from(env(&[
                ("UC_AGENT_MODEL", "claude-like"),
                ("OPENAI_API_KEY", "sk-fallback"),
                ("ANALYSTFLOW_OUTPUT_DIR", "/tmp/out"),
                ("ANALYSTFLOW_STAGE_TIMEOUT_SECS", "45"),
            ]))
            .unwrap();

        assert_eq!(config.models.use_cases, "claude-like");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-fallback"));
        assert_eq!(config.paths.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.pipeline.stage_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn test_dedicated_key_wins_over_fallback() {
        let mut config = AppConfig::default();
        config
            .apply_env_from(env(&[
                ("ANALYSTFLOW_API_KEY", "sk-own"),
                ("OPENAI_API_KEY", "sk-fallback"),
            ]))
            .unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-own"));
    }

    #[test]
    fn test_bad_timeout_env() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_from(env(&[("ANALYSTFLOW_STAGE_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.ingestion.encodings = vec!["utf-8".into(), "klingon".into()];
        assert!(config.validate().unwrap_err().to_string().contains("klingon"));

        let mut config = AppConfig::default();
        config.pipeline.stage_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ingestion.extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let llm = LlmConfig {
            api_key: Some("sk-secret".to_string()),
            ..LlmConfig::default()
        };
        let debug = format!("{llm:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
