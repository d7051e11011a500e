//! Error types
//!
//! Library errors are `thiserror` enums per concern; application code
//! (telemetry init, the CLI) works in `anyhow::Result`.

/// Failures raised while managing a trace span
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// The span provider is unreachable or misconfigured
    #[error("span provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Releasing the span failed
    #[error("span exit failed: {0}")]
    SpanExit(String),

    /// Recording an output value on the span failed
    #[error("failed to record span output: {0}")]
    RecordOutput(String),
}

/// Failures raised while resolving provider configuration from the environment
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no LLM provider given and LLM_PROVIDER is not set")]
    ProviderNotSet,

    #[error("unsupported LLM provider '{name}' (supported: {supported})")]
    UnsupportedProvider { name: String, supported: String },

    #[error("missing required environment variable(s) for {provider}: {}", .missing.join(", "))]
    MissingEnv {
        provider: &'static str,
        missing: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_lists_every_variable() {
        let err = ConfigError::MissingEnv {
            provider: "azure-openai",
            missing: vec![
                "AZURE_OPENAI_ENDPOINT".to_string(),
                "AZURE_OPENAI_API_KEY".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "missing required environment variable(s) for azure-openai: \
             AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_API_KEY"
        );
    }
}
