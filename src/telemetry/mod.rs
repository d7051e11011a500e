//! Tracing for streaming agent operations
//!
//! - [`TracingManager`] holds tracing state and builds run configuration
//! - [`Traced`] wraps a [`StreamingOperation`] with one span per call
//! - [`quiet_span_exit`] releases spans without the cross-context detach noise
//! - [`Telemetry`] installs the subscriber stack (console, JSON file, OTLP)

mod context;
mod init;
pub mod levels;
mod manager;
pub mod quiet;
pub mod span;
pub mod stream;

pub use context::TraceContext;
pub use init::Telemetry;
pub use levels::{LevelOverrideLayer, LevelRegistry, SuppressionGuard};
pub use manager::{Configurable, RunnableConfig, TraceCallback, TracingManager, TRACE_CALLBACK_TARGET};
pub use quiet::{is_spurious, quiet_span_exit};
pub use span::{SpanAttributes, SpanFailure, SpanHandle, SpanProvider, TracingSpanProvider};
pub use stream::{
    from_fn, FnOperation, SpanOutcome, SpanPolicy, StreamRequest, StreamingOperation, Traced,
    TracedStream,
};
