//! Agent Utils CLI
//!
//! Run with: cargo run --bin agent-utils -- <command>

use agent_utils::{
    config::{Config, TracingConfig},
    provider::{bedrock, ChatModelFactory},
    telemetry::{from_fn, SpanPolicy, StreamRequest, StreamingOperation, TracingSpanProvider},
    StreamEvent, Telemetry, TracingManager,
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "agent-utils")]
#[command(about = "Tracing and provider utilities for streaming agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose console logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory for JSON log files
    #[arg(long, env = "AGENT_UTILS_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve provider settings from the environment and print them (secrets redacted)
    Provider {
        /// Provider name; defaults to LLM_PROVIDER
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Report how a Bedrock model id is treated for prompt caching
    BedrockCache {
        /// Bedrock model id, e.g. us.anthropic.claude-3-7-sonnet-20250219-v1:0
        model_id: String,
    },

    /// Run a canned agent stream through the tracing wrapper
    TraceDemo {
        /// Agent name used for the span
        #[arg(short, long, default_value = "demo")]
        agent: String,

        /// Query sent to the agent
        #[arg(short, long, default_value = "hello")]
        query: String,

        /// Trace id to propagate
        #[arg(short, long)]
        trace_id: Option<String>,

        /// Create spans even when ENABLE_TRACING is unset
        #[arg(long)]
        enable_tracing: bool,

        /// Stop after this many events
        #[arg(long)]
        take: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load();
    config.telemetry = config.telemetry.with_verbose(cli.verbose);
    if let Some(log_dir) = cli.log_dir {
        config.telemetry = config.telemetry.with_log_dir(log_dir);
    }
    let telemetry = Telemetry::init(&config.telemetry)?;

    match cli.command {
        Commands::Provider { name } => {
            let factory = ChatModelFactory::new(name.as_deref())?;
            let settings = factory.settings()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Commands::BedrockCache { model_id } => {
            let report = serde_json::json!({
                "model_id": model_id,
                "normalized": bedrock::normalize_model_id(&model_id),
                "cache_supported": bedrock::is_cache_supported(&model_id),
                "provider": bedrock::infer_provider(&model_id),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::TraceDemo {
            agent,
            query,
            trace_id,
            enable_tracing,
            take,
        } => {
            let tracing_config = TracingConfig {
                enabled: config.tracing.enabled || enable_tracing,
                ..config.tracing.clone()
            };
            let manager = Arc::new(TracingManager::new(
                &tracing_config,
                Arc::new(TracingSpanProvider),
            ));
            run_demo(manager, &agent, query, trace_id, take).await?;
        }
    }

    telemetry.shutdown()
}

async fn run_demo(
    manager: Arc<TracingManager>,
    agent: &str,
    query: String,
    trace_id: Option<String>,
    take: Option<usize>,
) -> Result<()> {
    let operation = from_fn(|request: StreamRequest| {
        let config = request.tracing.create_config(&request.context_id);
        tracing::debug!(run_id = %config.run_id, "Demo agent run configured");
        for callback in config.callbacks.iter().flatten() {
            callback.emit(
                "run_started",
                &serde_json::json!({ "run_id": config.run_id, "query": request.query }),
            );
        }

        let events: Vec<Result<StreamEvent>> = vec![
            Ok(StreamEvent::text("Processing...").with("is_task_complete", false)),
            Ok(StreamEvent::new().with("is_task_complete", false)),
            Ok(StreamEvent::text(format!("Answer to: {}", request.query))
                .with("is_task_complete", true)),
        ];
        futures::stream::iter(events).boxed()
    });
    let traced = SpanPolicy::new(agent).wrap(operation, manager);

    let mut request = StreamRequest::new(query, uuid::Uuid::new_v4().to_string());
    request.trace_id = trace_id;

    let mut stream = traced.stream(request);
    let mut seen = 0;
    while let Some(item) = stream.next().await {
        let event: StreamEvent = item?;
        println!("{}", serde_json::to_string(&event)?);
        seen += 1;
        if take.is_some_and(|limit| seen >= limit) {
            break;
        }
    }
    Ok(())
}
