//! Configuration for an annotation run, plus logging setup.
//!
//! A run is described by [`AnnotatorConfig`], loaded from JSON with
//! [`AnnotatorConfig::load_from_path`] or assembled by the CLI from flags.

mod logging;
mod schema;

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use logging::{init_tracing, LoggingConfig};
pub use schema::json_schema;

/// How downstream impact influences which trees are approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Only the target module's errors count.
    #[default]
    Local,
    /// Add the lower bound of downstream errors to the local effect.
    LowerBound,
    /// Add the upper bound of downstream errors to the local effect.
    UpperBound,
    /// Reject trees that trigger downstream errors not fixable on target.
    Strict,
}

impl AnalysisMode {
    pub fn uses_downstream(self) -> bool {
        !matches!(self, AnalysisMode::Local)
    }
}

/// Where the analyzer and the scanner read their per-build settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ModuleInfoConfig {
    #[schemars(with = "String")]
    pub checker_config: PathBuf,
    #[schemars(with = "String")]
    pub scanner_config: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DownstreamConfig {
    pub enabled: bool,
    /// Builds every downstream module with the analyzer attached.
    pub build_command: String,
    pub modules: Vec<ModuleInfoConfig>,
    /// Directory the library-model side files are written to.
    #[schemars(with = "String")]
    pub library_model_path: PathBuf,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            build_command: String::new(),
            modules: Vec::new(),
            library_model_path: PathBuf::from("library-model"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible API.
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            api_key_env: "OPENAI_API_KEY".to_owned(),
            timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Shell command building the target module with the analyzer attached.
    pub build_command: String,
    /// Analyzer output and reports land here.
    #[schemars(with = "String")]
    pub output_dir: PathBuf,
    pub target_module_info: ModuleInfoConfig,
    pub downstream: DownstreamConfig,
    pub mode: AnalysisMode,
    /// Maximum expansion depth per node in chain mode.
    pub depth: u32,
    pub chain: bool,
    pub bailout: bool,
    /// Upper bound on outer rounds; unbounded when absent.
    pub max_rounds: Option<u32>,
    pub serialization_version: u8,
    pub nullable_annotation: String,
    pub initializer_annotation: String,
    pub use_cache: bool,
    pub disable_outer_loop: bool,
    pub infer_initializers: bool,
    pub build_timeout_secs: Option<u64>,
    pub ai: AiConfig,
    pub logging: LoggingConfig,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            build_command: String::new(),
            output_dir: PathBuf::from("annotator-out"),
            target_module_info: ModuleInfoConfig::default(),
            downstream: DownstreamConfig::default(),
            mode: AnalysisMode::default(),
            depth: 5,
            chain: false,
            bailout: true,
            max_rounds: None,
            serialization_version: 3,
            nullable_annotation: "javax.annotation.Nullable".to_owned(),
            initializer_annotation: "com.uber.nullaway.annotations.Initializer".to_owned(),
            use_cache: true,
            disable_outer_loop: false,
            infer_initializers: false,
            build_timeout_secs: None,
            ai: AiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AnnotatorConfig {
    /// Loads and validates a JSON config file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: AnnotatorConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build_command.trim().is_empty() {
            return Err(ConfigError::Invalid("build_command must not be empty".into()));
        }
        if self.depth == 0 {
            return Err(ConfigError::Invalid("depth must be at least 1".into()));
        }
        if !matches!(self.serialization_version, 1 | 3) {
            return Err(ConfigError::Invalid(format!(
                "unsupported serialization_version {} (expected 1 or 3)",
                self.serialization_version
            )));
        }
        if self.nullable_annotation.trim().is_empty() {
            return Err(ConfigError::Invalid("nullable_annotation must not be empty".into()));
        }
        if self.mode.uses_downstream() && !self.downstream.enabled {
            return Err(ConfigError::Invalid(format!(
                "mode {:?} needs downstream.enabled",
                self.mode
            )));
        }
        if self.downstream.enabled && self.downstream.build_command.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "downstream.build_command must not be empty when downstream is enabled".into(),
            ));
        }
        if self.ai.enabled && (self.ai.endpoint.trim().is_empty() || self.ai.model.trim().is_empty()) {
            return Err(ConfigError::Invalid("ai.endpoint and ai.model are required when ai is enabled".into()));
        }
        Ok(())
    }

    /// Analyzer output directory of the target module.
    pub fn target_dir(&self) -> PathBuf {
        self.output_dir.join("0")
    }

    /// Analyzer output directory of the `index`th downstream module.
    pub fn downstream_dir(&self, index: usize) -> PathBuf {
        self.output_dir.join((index + 1).to_string())
    }

    pub fn build_timeout(&self) -> Option<std::time::Duration> {
        self.build_timeout_secs.map(std::time::Duration::from_secs)
    }
}
