//! Configuration for agent utilities
//!
//! Everything here is environment driven. Reads go through [`EnvSource`] so
//! tests can hand in a plain map instead of mutating the process environment.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Flag that turns span creation on
pub const ENABLE_TRACING_ENV: &str = "ENABLE_TRACING";
/// Overrides the trace name attached to every span
pub const TRACE_NAME_ENV: &str = "TRACE_NAME";
/// OTLP/HTTP collector endpoint
pub const OTEL_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Directory for JSON log files
pub const LOG_DIR_ENV: &str = "AGENT_UTILS_LOG_DIR";
/// Provider selection for [`crate::provider::ChatModelFactory`]
pub const LLM_PROVIDER_ENV: &str = "LLM_PROVIDER";

/// Trace name used when neither the wrapper nor the environment sets one
pub const DEFAULT_TRACE_NAME: &str = "ai-platform-engineer";

/// Source of environment variables
pub trait EnvSource {
    /// Value of `key`; empty values count as unset
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }
}

/// Interpret an environment flag (`true`, `1`, `yes`, `on`)
pub fn env_flag(env: &impl EnvSource, key: &str) -> bool {
    env.var(key)
        .map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Span creation settings
    pub tracing: TracingConfig,

    /// Logging and export settings
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Whether spans are created at all
    pub enabled: bool,

    /// Trace name override; wrappers fall back to their own name when unset
    pub trace_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Directory for JSON log files (no file logging when unset)
    pub log_dir: Option<PathBuf>,

    /// Enable verbose console logging
    pub verbose: bool,

    /// OTLP/HTTP endpoint for span export
    pub otel_endpoint: Option<String>,

    /// Service name reported to the collector
    pub service_name: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            trace_name: None,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            verbose: false,
            otel_endpoint: None,
            service_name: "agent-utils".to_string(),
        }
    }
}

impl TracingConfig {
    pub fn from_env(env: &impl EnvSource) -> Self {
        Self {
            enabled: env_flag(env, ENABLE_TRACING_ENV),
            trace_name: env.var(TRACE_NAME_ENV),
        }
    }

    /// Enable or disable span creation
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl TelemetryConfig {
    pub fn from_env(env: &impl EnvSource) -> Self {
        Self {
            log_dir: env.var(LOG_DIR_ENV).map(PathBuf::from),
            otel_endpoint: env.var(OTEL_ENDPOINT_ENV),
            ..Self::default()
        }
    }

    /// Set verbose logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set log directory
    pub fn with_log_dir(mut self, log_dir: PathBuf) -> Self {
        self.log_dir = Some(log_dir);
        self
    }
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_env(&ProcessEnv)
    }

    pub fn from_env(env: &impl EnvSource) -> Self {
        Self {
            tracing: TracingConfig::from_env(env),
            telemetry: TelemetryConfig::from_env(env),
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "azure-openai")]
    AzureOpenAI,
    #[serde(rename = "aws-bedrock")]
    AwsBedrock,
    #[serde(rename = "google-gemini")]
    GoogleGemini,
    #[serde(rename = "gcp-vertexai")]
    GcpVertexAI,
    #[serde(rename = "anthropic-claude")]
    AnthropicClaude,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 6] = [
        LlmProvider::OpenAI,
        LlmProvider::AzureOpenAI,
        LlmProvider::AwsBedrock,
        LlmProvider::GoogleGemini,
        LlmProvider::GcpVertexAI,
        LlmProvider::AnthropicClaude,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "openai",
            LlmProvider::AzureOpenAI => "azure-openai",
            LlmProvider::AwsBedrock => "aws-bedrock",
            LlmProvider::GoogleGemini => "google-gemini",
            LlmProvider::GcpVertexAI => "gcp-vertexai",
            LlmProvider::AnthropicClaude => "anthropic-claude",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        LlmProvider::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnsupportedProvider {
                name: s.to_string(),
                supported: LlmProvider::ALL
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}
