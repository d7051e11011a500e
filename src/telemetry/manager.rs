//! Tracing context manager
//!
//! Owns the enablement flag, the span provider, and the shared trace-id slot,
//! and builds the run configuration handed to the downstream execution engine.
//!
//! The trace-id slot is last-writer-wins across every caller sharing the
//! manager. Concurrent wrapped calls sharing one manager will overwrite each
//! other's id there; per-call code should read the id from its
//! [`TraceContext`] instead, which carries an isolated copy.

use super::context::TraceContext;
use super::span::{SpanAttributes, SpanHandle, SpanProvider, TracingSpanProvider};
use crate::config::{ProcessEnv, TracingConfig};
use crate::error::TracingError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Target for events emitted through [`TraceCallback`]
pub const TRACE_CALLBACK_TARGET: &str = "agent_utils::trace";

/// Engine-facing run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnableConfig {
    pub configurable: Configurable,

    /// Present only while tracing is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callbacks: Option<Vec<TraceCallback>>,

    pub run_id: Uuid,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configurable {
    /// Logical thread/session the engine keys its state on
    pub thread_id: String,
}

/// Handler the downstream engine uses to emit trace events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceCallback {
    pub session_id: String,
    pub trace_id: Option<String>,
    pub trace_name: Option<String>,
}

impl TraceCallback {
    /// Emit one engine event into the current trace
    pub fn emit(&self, event: &str, payload: &Value) {
        tracing::info!(
            target: TRACE_CALLBACK_TARGET,
            session_id = %self.session_id,
            trace_id = self.trace_id.as_deref(),
            trace_name = self.trace_name.as_deref(),
            event,
            payload = %payload,
            "Trace callback event"
        );
    }
}

/// Process authority on tracing state
pub struct TracingManager {
    enabled: bool,
    trace_name: Option<String>,
    provider: Arc<dyn SpanProvider>,
    trace_id: RwLock<Option<String>>,
}

impl std::fmt::Debug for TracingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingManager")
            .field("enabled", &self.enabled)
            .field("trace_name", &self.trace_name)
            .field("trace_id", &*self.trace_id.read())
            .finish_non_exhaustive()
    }
}

impl TracingManager {
    pub fn new(config: &TracingConfig, provider: Arc<dyn SpanProvider>) -> Self {
        Self {
            enabled: config.enabled,
            trace_name: config.trace_name.clone(),
            provider,
            trace_id: RwLock::new(None),
        }
    }

    /// Manager with tracing switched off
    pub fn disabled() -> Self {
        Self::new(&TracingConfig::default(), Arc::new(TracingSpanProvider))
    }

    /// Manager configured from `ENABLE_TRACING` / `TRACE_NAME`
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::new(
            &TracingConfig::from_env(&ProcessEnv),
            Arc::new(TracingSpanProvider),
        )
    }

    /// Lazily built process-wide manager
    pub fn global() -> Arc<TracingManager> {
        static GLOBAL: OnceLock<Arc<TracingManager>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| {
                let manager = TracingManager::from_env();
                tracing::debug!(enabled = manager.enabled, "Tracing manager initialized");
                Arc::new(manager)
            })
            .clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Trace name configured through the environment
    pub fn trace_name(&self) -> Option<&str> {
        self.trace_name.as_deref()
    }

    /// Overwrite the shared trace id; `None` clears it
    pub fn set_trace_id(&self, trace_id: Option<String>) {
        *self.trace_id.write() = trace_id;
    }

    /// Last trace id written to the shared slot
    pub fn trace_id(&self) -> Option<String> {
        self.trace_id.read().clone()
    }

    /// Run configuration bound to `context_id`, using the shared trace id
    pub fn create_config(&self, context_id: &str) -> RunnableConfig {
        let trace_id = self.trace_id();
        self.build_config(context_id, trace_id.as_deref())
    }

    pub(crate) fn build_config(&self, context_id: &str, trace_id: Option<&str>) -> RunnableConfig {
        let mut metadata = Map::new();
        if let Some(trace_id) = trace_id {
            metadata.insert("trace_id".to_string(), Value::from(trace_id));
        }

        let callbacks = self.enabled.then(|| {
            vec![TraceCallback {
                session_id: context_id.to_string(),
                trace_id: trace_id.map(String::from),
                trace_name: self.trace_name.clone(),
            }]
        });

        RunnableConfig {
            configurable: Configurable {
                thread_id: context_id.to_string(),
            },
            callbacks,
            run_id: Uuid::new_v4(),
            metadata,
        }
    }

    /// Open a span through the configured provider
    pub fn start_span(
        &self,
        name: &str,
        attributes: &SpanAttributes,
    ) -> Result<Box<dyn SpanHandle>, TracingError> {
        self.provider.start_span(name, attributes)
    }

    /// Per-call context carrying its own copy of `trace_id`
    pub fn context(self: &Arc<Self>, trace_id: Option<String>) -> TraceContext {
        TraceContext::new(Arc::clone(self), trace_id)
    }
}
