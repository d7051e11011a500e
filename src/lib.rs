//! Agent Utils - tracing and provider plumbing for streaming LLM agents
//!
//! This crate provides:
//! - A tracing context manager and a stream wrapper that gives every agent
//!   call one span, propagates trace ids, and releases spans quietly
//! - Telemetry initialisation (console, JSON file, OTLP export)
//! - LLM provider configuration from the environment, including Bedrock
//!   prompt-cache heuristics
//! - Helpers for agent-to-agent (A2A) trace propagation

pub mod a2a;
pub mod config;
pub mod error;
pub mod events;
pub mod provider;
pub mod telemetry;

pub use config::{Config, LlmProvider};
pub use error::{ConfigError, TracingError};
pub use events::{EventStream, StreamEvent};
pub use provider::{ChatModelFactory, ProviderSettings};
pub use telemetry::{
    SpanPolicy, StreamRequest, StreamingOperation, Telemetry, TraceContext, Traced, TracedStream,
    TracingManager,
};
