//! Agent-to-agent (A2A) tracing helpers
//!
//! Agents called over A2A receive the caller's trace id in the request
//! context. These helpers pull it out, and let a process opt out of A2A
//! tracing altogether.

use crate::config::{env_flag, EnvSource, ProcessEnv};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};

/// Env var that disables A2A tracing when truthy
pub const A2A_TRACING_DISABLED_ENV: &str = "A2A_TRACING_DISABLED";

static A2A_DISABLED: AtomicBool = AtomicBool::new(false);

/// Turn off A2A tracing for the rest of the process
pub fn disable_a2a_tracing() {
    if !A2A_DISABLED.swap(true, Ordering::SeqCst) {
        tracing::info!("A2A tracing disabled");
    }
}

/// Whether A2A tracing is off, by [`disable_a2a_tracing`] or the environment
pub fn is_a2a_disabled() -> bool {
    is_a2a_disabled_in(&ProcessEnv)
}

pub fn is_a2a_disabled_in(env: &impl EnvSource) -> bool {
    A2A_DISABLED.load(Ordering::SeqCst) || env_flag(env, A2A_TRACING_DISABLED_ENV)
}

/// Trace id carried in an A2A request context
///
/// Checks `trace_id` at the top level, then `metadata.trace_id`. Only
/// non-empty strings count.
pub fn extract_trace_id_from_context(context: &Map<String, Value>) -> Option<String> {
    let non_empty = |value: Option<&Value>| {
        value
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(String::from)
    };

    non_empty(context.get("trace_id")).or_else(|| {
        non_empty(
            context
                .get("metadata")
                .and_then(Value::as_object)
                .and_then(|metadata| metadata.get("trace_id")),
        )
    })
}
