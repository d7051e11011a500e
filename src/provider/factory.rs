//! Provider selection from the environment

use super::bedrock;
use super::config::*;
use crate::config::{env_flag, EnvSource, LlmProvider, ProcessEnv, LLM_PROVIDER_ENV};
use crate::error::ConfigError;

/// Picks a provider and resolves its settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatModelFactory {
    provider: LlmProvider,
}

impl ChatModelFactory {
    /// Use `provider` when given, otherwise `LLM_PROVIDER`
    pub fn new(provider: Option<&str>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env(provider, &ProcessEnv)
    }

    pub fn from_env(provider: Option<&str>, env: &impl EnvSource) -> Result<Self, ConfigError> {
        let name = match provider {
            Some(name) => name.to_string(),
            None => env.var(LLM_PROVIDER_ENV).ok_or(ConfigError::ProviderNotSet)?,
        };
        let provider: LlmProvider = name.parse()?;
        tracing::debug!(provider = %provider, "Selected LLM provider");
        Ok(Self { provider })
    }

    pub fn for_provider(provider: LlmProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Resolve settings from the process environment
    pub fn settings(&self) -> Result<ProviderSettings, ConfigError> {
        self.settings_from(&ProcessEnv)
    }

    /// Resolve settings, reporting every missing required variable at once
    pub fn settings_from(&self, env: &impl EnvSource) -> Result<ProviderSettings, ConfigError> {
        let mut reader = EnvReader::new(env);

        let settings = match self.provider {
            LlmProvider::OpenAI => ProviderSettings::OpenAI(OpenAISettings {
                api_key: Secret::new(reader.required("OPENAI_API_KEY")),
                model: reader.required("OPENAI_MODEL_NAME"),
                endpoint: reader.optional("OPENAI_ENDPOINT"),
            }),
            LlmProvider::AzureOpenAI => ProviderSettings::AzureOpenAI(AzureOpenAISettings {
                endpoint: reader.required("AZURE_OPENAI_ENDPOINT"),
                api_key: Secret::new(reader.required("AZURE_OPENAI_API_KEY")),
                api_version: reader.required("AZURE_OPENAI_API_VERSION"),
                deployment: reader.required("AZURE_OPENAI_DEPLOYMENT"),
            }),
            LlmProvider::AwsBedrock => {
                let model_id = reader.required("AWS_BEDROCK_MODEL_ID");
                let region = reader.required("AWS_REGION");
                let cache_requested = env_flag(env, "AWS_BEDROCK_ENABLE_PROMPT_CACHE");
                ProviderSettings::AwsBedrock(BedrockSettings {
                    access_key_id: reader.optional("AWS_ACCESS_KEY_ID").map(Secret::new),
                    secret_access_key: reader.optional("AWS_SECRET_ACCESS_KEY").map(Secret::new),
                    profile: reader.first_of(&["AWS_BEDROCK_PROFILE", "AWS_PROFILE"]),
                    provider: bedrock_vendor(&model_id),
                    prompt_cache: bedrock_prompt_cache(&model_id, cache_requested),
                    model_id,
                    region,
                })
            }
            LlmProvider::GoogleGemini => ProviderSettings::GoogleGemini(GeminiSettings {
                api_key: Secret::new(reader.required("GOOGLE_API_KEY")),
                model: reader
                    .optional("GOOGLE_GEMINI_MODEL_NAME")
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            }),
            LlmProvider::GcpVertexAI => ProviderSettings::GcpVertexAI(VertexAISettings {
                model: reader.required("VERTEXAI_MODEL_NAME"),
                project: reader.first_of(&["VERTEXAI_PROJECT", "GOOGLE_CLOUD_PROJECT"]),
                location: reader.optional("VERTEXAI_LOCATION"),
                credentials_path: reader.optional("GOOGLE_APPLICATION_CREDENTIALS"),
            }),
            LlmProvider::AnthropicClaude => ProviderSettings::AnthropicClaude(AnthropicSettings {
                api_key: Secret::new(reader.required("ANTHROPIC_API_KEY")),
                model: reader
                    .optional("ANTHROPIC_MODEL_NAME")
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            }),
        };

        reader.finish(self.provider)?;

        tracing::info!(
            provider = %self.provider,
            model = settings.model(),
            "Resolved LLM provider settings"
        );
        Ok(settings)
    }
}

fn bedrock_vendor(model_id: &str) -> Option<String> {
    if model_id.is_empty() {
        return None;
    }
    match bedrock::infer_provider(model_id) {
        Some(vendor) => {
            tracing::info!("Inferred provider '{}' from Bedrock model id {}", vendor, model_id);
            Some(vendor.to_string())
        }
        None => {
            tracing::debug!(model_id, "Could not infer vendor from Bedrock model id");
            None
        }
    }
}

fn bedrock_prompt_cache(model_id: &str, requested: bool) -> bool {
    if !requested || model_id.is_empty() {
        return false;
    }
    if bedrock::is_cache_supported(model_id) {
        tracing::info!("Prompt caching enabled for Bedrock model {}", model_id);
        true
    } else {
        tracing::warn!(
            "Prompt caching requested but not supported for Bedrock model {}; continuing without it",
            model_id
        );
        false
    }
}
