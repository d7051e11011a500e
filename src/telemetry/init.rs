//! Subscriber assembly
//!
//! Installs the global `tracing` subscriber: env filter, the level-override
//! layer, console and JSON file output, and OTLP export of agent spans.

use super::levels::{LevelOverrideLayer, LevelRegistry};
use crate::config::TelemetryConfig;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "agent_utils.log";

/// Handle on the installed telemetry stack
///
/// Keep it alive for the life of the process; dropping it stops the file
/// writer. Call [`shutdown`](Self::shutdown) to flush pending spans.
pub struct Telemetry {
    _file_guard: Option<WorkerGuard>,
    otel_provider: Option<SdkTracerProvider>,
    levels: Arc<LevelRegistry>,
}

impl Telemetry {
    /// Initialize the global subscriber
    ///
    /// A subscriber that is already installed (by a test harness or an
    /// embedding application) is left in place.
    pub fn init(config: &TelemetryConfig) -> anyhow::Result<Self> {
        let levels = LevelRegistry::global();

        let make_env_filter = || {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                if config.verbose {
                    EnvFilter::new("debug,hyper=info,reqwest=info,h2=info,opentelemetry=info")
                } else {
                    EnvFilter::new("info,hyper=warn,reqwest=warn,h2=warn,opentelemetry=warn")
                }
            })
        };

        let (file_layer, file_guard) = match &config.log_dir {
            Some(log_dir) => {
                std::fs::create_dir_all(log_dir)?;
                let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                (Some(fmt::layer().json().with_writer(non_blocking)), Some(guard))
            }
            None => (None, None),
        };

        // Without a log directory the console is the only sink
        let console_layer = (config.verbose || config.log_dir.is_none()).then(|| {
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact()
        });

        let otel_provider = match config.otel_endpoint.as_deref() {
            Some(endpoint) => {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .with_endpoint(endpoint)
                    .with_protocol(opentelemetry_otlp::Protocol::HttpBinary)
                    .build()?;

                Some(
                    SdkTracerProvider::builder()
                        .with_batch_exporter(exporter)
                        .with_resource(
                            Resource::builder()
                                .with_service_name(config.service_name.clone())
                                .build(),
                        )
                        .build(),
                )
            }
            None => None,
        };
        let otel_layer = otel_provider.as_ref().map(|provider| {
            let tracer = provider.tracer(config.service_name.clone());
            tracing_opentelemetry::layer().with_tracer(tracer)
        });

        tracing_subscriber::registry()
            .with(make_env_filter())
            .with(LevelOverrideLayer::new(Arc::clone(&levels)))
            .with(console_layer)
            .with(file_layer)
            .with(otel_layer)
            .try_init()
            .ok();

        tracing::info!(
            log_dir = config.log_dir.as_ref().map(|dir| dir.display().to_string()),
            otel_enabled = config.otel_endpoint.is_some(),
            service = %config.service_name,
            "Telemetry initialized"
        );

        Ok(Self {
            _file_guard: file_guard,
            otel_provider,
            levels,
        })
    }

    /// Registry the installed override layer reads from
    pub fn levels(&self) -> &Arc<LevelRegistry> {
        &self.levels
    }

    pub fn otel_enabled(&self) -> bool {
        self.otel_provider.is_some()
    }

    /// Flush and stop span export
    pub fn shutdown(self) -> anyhow::Result<()> {
        if let Some(provider) = self.otel_provider {
            provider
                .shutdown()
                .map_err(|err| anyhow::anyhow!("failed to shut down span exporter: {err:?}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_log_dir() {
        let temp = tempfile::tempdir().unwrap();
        let log_dir = temp.path().join("logs");
        let config = TelemetryConfig::default().with_log_dir(log_dir.clone());

        let telemetry = Telemetry::init(&config).unwrap();
        assert!(log_dir.is_dir());
        assert!(!telemetry.otel_enabled());
        assert!(Arc::ptr_eq(telemetry.levels(), &LevelRegistry::global()));
        telemetry.shutdown().unwrap();
    }
}
