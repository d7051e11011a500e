//! Provider configuration

use crate::config::{EnvSource, LlmProvider};
use crate::error::ConfigError;
use serde::{Serialize, Serializer};

/// A credential that never shows up in logs or serialized output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw credential
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

/// OpenAI settings
#[derive(Debug, Clone, Serialize)]
pub struct OpenAISettings {
    pub api_key: Secret,
    pub model: String,
    /// Custom base URL (e.g. a proxy or compatible gateway)
    pub endpoint: Option<String>,
}

/// Azure OpenAI settings
#[derive(Debug, Clone, Serialize)]
pub struct AzureOpenAISettings {
    pub endpoint: String,
    pub api_key: Secret,
    pub api_version: String,
    pub deployment: String,
}

/// AWS Bedrock settings
#[derive(Debug, Clone, Serialize)]
pub struct BedrockSettings {
    pub model_id: String,
    pub region: String,
    pub access_key_id: Option<Secret>,
    pub secret_access_key: Option<Secret>,
    /// Named credentials profile (`AWS_BEDROCK_PROFILE`, then `AWS_PROFILE`)
    pub profile: Option<String>,
    /// Model vendor inferred from the model id (`anthropic`, `amazon`, ...)
    pub provider: Option<String>,
    /// Prompt caching, only true when requested and supported by the model
    pub prompt_cache: bool,
}

/// Google Gemini (AI Studio) settings
#[derive(Debug, Clone, Serialize)]
pub struct GeminiSettings {
    pub api_key: Secret,
    pub model: String,
}

/// GCP Vertex AI settings
#[derive(Debug, Clone, Serialize)]
pub struct VertexAISettings {
    pub model: String,
    pub project: Option<String>,
    pub location: Option<String>,
    pub credentials_path: Option<String>,
}

/// Anthropic settings
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicSettings {
    pub api_key: Secret,
    pub model: String,
}

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Fully resolved settings for one provider
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "provider")]
pub enum ProviderSettings {
    #[serde(rename = "openai")]
    OpenAI(OpenAISettings),
    #[serde(rename = "azure-openai")]
    AzureOpenAI(AzureOpenAISettings),
    #[serde(rename = "aws-bedrock")]
    AwsBedrock(BedrockSettings),
    #[serde(rename = "google-gemini")]
    GoogleGemini(GeminiSettings),
    #[serde(rename = "gcp-vertexai")]
    GcpVertexAI(VertexAISettings),
    #[serde(rename = "anthropic-claude")]
    AnthropicClaude(AnthropicSettings),
}

impl ProviderSettings {
    pub fn provider(&self) -> LlmProvider {
        match self {
            ProviderSettings::OpenAI(_) => LlmProvider::OpenAI,
            ProviderSettings::AzureOpenAI(_) => LlmProvider::AzureOpenAI,
            ProviderSettings::AwsBedrock(_) => LlmProvider::AwsBedrock,
            ProviderSettings::GoogleGemini(_) => LlmProvider::GoogleGemini,
            ProviderSettings::GcpVertexAI(_) => LlmProvider::GcpVertexAI,
            ProviderSettings::AnthropicClaude(_) => LlmProvider::AnthropicClaude,
        }
    }

    /// Model, deployment or model id, whichever the provider addresses by
    pub fn model(&self) -> &str {
        match self {
            ProviderSettings::OpenAI(s) => &s.model,
            ProviderSettings::AzureOpenAI(s) => &s.deployment,
            ProviderSettings::AwsBedrock(s) => &s.model_id,
            ProviderSettings::GoogleGemini(s) => &s.model,
            ProviderSettings::GcpVertexAI(s) => &s.model,
            ProviderSettings::AnthropicClaude(s) => &s.model,
        }
    }
}

/// Reads variables for one provider, collecting every missing required one
pub(crate) struct EnvReader<'a, E: EnvSource> {
    env: &'a E,
    missing: Vec<String>,
}

impl<'a, E: EnvSource> EnvReader<'a, E> {
    pub(crate) fn new(env: &'a E) -> Self {
        Self {
            env,
            missing: Vec::new(),
        }
    }

    /// Required variable; records it as missing and returns an empty string when unset
    pub(crate) fn required(&mut self, key: &str) -> String {
        match self.env.var(key) {
            Some(value) => value,
            None => {
                self.missing.push(key.to_string());
                String::new()
            }
        }
    }

    pub(crate) fn optional(&self, key: &str) -> Option<String> {
        self.env.var(key)
    }

    /// First set variable among `keys`
    pub(crate) fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.env.var(k))
    }

    pub(crate) fn finish(self, provider: LlmProvider) -> Result<(), ConfigError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingEnv {
                provider: provider.as_str(),
                missing: self.missing,
            })
        }
    }
}
