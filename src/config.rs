//! Runtime configuration.
//!
//! Settings are layered, last one wins:
//! 1. Built-in defaults ([`AppConfig::default`])
//! 2. A YAML file, either the `--config` path or
//!    `<config_dir>/patrakaarita/config.yaml` when it exists
//! 3. Environment variables (a `.env` file is loaded first if present)
//!
//! The resulting [`AppConfig`] is built once at startup and passed by
//! reference into [`crate::pipeline::Pipeline::new`].
//!
//! # Example `config.yaml`
//!
//! ```yaml
//! api_base: https://api.groq.com/openai/v1
//! model: llama-3.3-70b-versatile
//! temperature: 0.2
//! # json_schema needs a model with structured output support
//! response_format: json_object
//! output_path: output/report.txt
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Environment variables checked for the model API key, in order.
const API_KEY_VARS: &[&str] = &["LLM_API_KEY", "GROQ_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
}

/// How the model is asked to produce structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Send the record's JSON schema as `response_format.json_schema`.
    JsonSchema,
    /// Only request a JSON object; the schema is carried in the prompt.
    /// Default, since most hosted models accept it.
    JsonObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`.
    pub api_base: String,
    /// Bearer token for the model API. Usually supplied through the environment.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
    /// Per-request timeout for model calls.
    pub request_timeout_secs: u64,
    /// Per-request timeout for fetching the article page.
    pub fetch_timeout_secs: u64,
    /// Whole-pipeline timeout; `0` disables it.
    pub pipeline_timeout_secs: u64,
    /// Raw page text beyond this many characters is dropped before extraction.
    pub max_content_chars: usize,
    /// Article bodies with fewer words are rejected before analysis.
    pub min_content_words: usize,
    /// Extra attempts when a model response fails schema validation.
    pub schema_reasks: u32,
    pub user_agent: String,
    /// Where the most recent rendered report is written.
    pub output_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.2,
            max_tokens: 2048,
            response_format: ResponseFormat::JsonObject,
            request_timeout_secs: 60,
            fetch_timeout_secs: 20,
            pipeline_timeout_secs: 180,
            max_content_chars: 24_000,
            min_content_words: 5,
            schema_reasks: 1,
            user_agent: format!(
                "Mozilla/5.0 (compatible; patrakaarita/{})",
                env!("CARGO_PKG_VERSION")
            ),
            output_path: PathBuf::from("output/report.txt"),
        }
    }
}

impl AppConfig {
    /// Build the configuration from defaults, an optional YAML file, and the environment.
    ///
    /// An explicitly given `path` must exist; the default location is only
    /// read when present.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(p) => Self::from_file(&p)?,
                None => {
                    debug!("No config file found; using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|var| std::env::var(var).ok())?;
        info!(
            api_base = %config.api_base,
            model = %config.model,
            has_api_key = config.api_key.is_some(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Overlay environment variables. `lookup` is injected so tests need not touch the process env.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = API_KEY_VARS
            .iter()
            .filter_map(|var| lookup(var))
            .find(|v| !v.trim().is_empty())
        {
            self.api_key = Some(key.trim().to_string());
        }
        if let Some(base) = lookup("LLM_API_BASE") {
            self.api_base = base;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.model = model;
        }
        if let Some(raw) = lookup("PIPELINE_TIMEOUT_SECS") {
            self.pipeline_timeout_secs = raw.trim().parse().map_err(|_| ConfigError::Env {
                var: "PIPELINE_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
        }
        Ok(())
    }

    /// `api_base` joined with `/chat/completions`.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

/// `<config_dir>/patrakaarita/config.yaml`, when the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("patrakaarita").join("config.yaml"))
}
