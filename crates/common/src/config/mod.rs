//! Configuration management for Switchyard
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    /// Generation backend configuration
    #[validate(nested)]
    pub generation: GenerationConfig,

    /// Document retrieval configuration
    #[validate(nested)]
    pub retrieval: RetrievalConfig,

    /// Tabular dataset configuration
    #[validate(nested)]
    pub tabular: TabularConfig,

    /// Workflow engine configuration
    #[validate(nested)]
    pub workflow: WorkflowConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat completions endpoint (OpenAI compatible)
    pub endpoint: String,

    /// API key; empty means offline replies
    pub api_key: String,

    /// Model name
    pub model: String,

    /// HTTP timeout in seconds
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Maximum output tokens
    pub max_tokens: usize,

    /// Sampling temperature
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of documents requested per query
    #[validate(range(min = 1))]
    pub top_k: usize,

    /// Target chunk size in characters
    #[validate(range(min = 1))]
    pub chunk_size: usize,

    /// Chunks shorter than this are dropped (unless the document has only one)
    pub min_chunk_size: usize,

    /// Minimum normalized relevance score
    pub min_score: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct TabularConfig {
    /// Directory holding `{SYMBOL}.csv` files
    pub data_dir: String,

    /// Write sample datasets when the directory has none
    pub seed_sample_data: bool,

    /// Window used for moving averages
    #[validate(range(min = 1))]
    pub moving_average_window: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Upper bound for every single collaborator call, in seconds
    #[validate(range(min = 1))]
    pub collaborator_timeout_secs: u64,

    /// Character budget per document snippet in the synthesis context
    #[validate(range(min = 1))]
    pub snippet_chars: usize,

    /// Documents included in the synthesis context
    pub max_context_documents: usize,

    /// Ask the generation backend for follow-up suggestions
    pub smart_suggestions: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1))]
    pub log_level: String,

    /// Enable JSON logging
    pub json_logging: bool,

    /// Service name attached to log lines
    pub service_name: String,
}

// Default value functions
fn default_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_model() -> String { "gpt-4o-mini".to_string() }
fn default_generation_timeout() -> u64 { 30 }
fn default_max_tokens() -> usize { 1000 }
fn default_temperature() -> f32 { 0.7 }
fn default_top_k() -> usize { 5 }
fn default_chunk_size() -> usize { 1000 }
fn default_min_chunk_size() -> usize { 100 }
fn default_min_score() -> f32 { 0.0 }
fn default_data_dir() -> String { "./data/stocks".to_string() }
fn default_seed() -> bool { true }
fn default_ma_window() -> usize { 3 }
fn default_collaborator_timeout() -> u64 { 30 }
fn default_snippet_chars() -> usize { 500 }
fn default_context_documents() -> usize { 2 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_service_name() -> String { "switchyard".to_string() }

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            model: default_model(),
            timeout_secs: default_generation_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            min_chunk_size: default_min_chunk_size(),
            min_score: default_min_score(),
        }
    }
}

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            seed_sample_data: default_seed(),
            moving_average_window: default_ma_window(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout_secs: default_collaborator_timeout(),
            snippet_chars: default_snippet_chars(),
            max_context_documents: default_context_documents(),
            smart_suggestions: false,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

impl WorkflowConfig {
    /// Get the per-call collaborator timeout as Duration
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }
}

impl GenerationConfig {
    /// Whether a real backend is configured
    pub fn is_online(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__WORKFLOW__COLLABORATOR_TIMEOUT_SECS=10
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        Self::checked(config.try_deserialize()?)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        Self::checked(config.try_deserialize()?)
    }

    /// Reject values the engine cannot run with, such as a zero window
    fn checked(config: Self) -> Result<Self, ConfigError> {
        config
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.workflow.snippet_chars, 500);
        assert_eq!(config.workflow.max_context_documents, 2);
        assert!(!config.workflow.smart_suggestions);
        assert!(!config.generation.is_online());
    }

    #[test]
    fn test_collaborator_timeout() {
        let config = AppConfig::default();
        assert_eq!(config.workflow.collaborator_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("workflow.snippet_chars", 120)
            .and_then(|builder| builder.build())
            .and_then(|built| built.try_deserialize())
            .unwrap();

        assert_eq!(config.workflow.snippet_chars, 120);
        assert_eq!(config.workflow.collaborator_timeout_secs, 30);
        assert_eq!(config.tabular.data_dir, "./data/stocks");
    }

    #[test]
    fn test_defaults_pass_validation() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let mut config = AppConfig::default();
        config.tabular.moving_average_window = 0;

        let field_errors = config.tabular.validate().unwrap_err();
        assert!(field_errors.field_errors().contains_key("moving_average_window"));

        let err = AppConfig::checked(config).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }
}
