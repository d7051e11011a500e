//! Per-call trace context
//!
//! The value a wrapped streaming operation receives on
//! [`StreamRequest::tracing`](super::stream::StreamRequest). It exposes the
//! manager's tracing state plus a trace id owned by this call alone.

use super::manager::{RunnableConfig, TracingManager};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TraceContext {
    manager: Arc<TracingManager>,
    trace_id: Option<String>,
}

impl TraceContext {
    pub fn new(manager: Arc<TracingManager>, trace_id: Option<String>) -> Self {
        Self { manager, trace_id }
    }

    /// Context for a call that nothing has traced yet
    pub fn detached() -> Self {
        Self::new(Arc::new(TracingManager::disabled()), None)
    }

    pub fn is_enabled(&self) -> bool {
        self.manager.is_enabled()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Replace this call's trace id without touching other calls
    pub fn set_trace_id(&mut self, trace_id: Option<String>) {
        self.trace_id = trace_id;
    }

    /// Run configuration bound to `context_id` and this call's trace id
    pub fn create_config(&self, context_id: &str) -> RunnableConfig {
        self.manager.build_config(context_id, self.trace_id.as_deref())
    }

    pub fn manager(&self) -> &Arc<TracingManager> {
        &self.manager
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TracingConfig;
    use crate::telemetry::span::TracingSpanProvider;

    fn shared_manager() -> Arc<TracingManager> {
        Arc::new(TracingManager::new(
            &TracingConfig::default().with_enabled(true),
            Arc::new(TracingSpanProvider),
        ))
    }

    #[test]
    fn test_detached_context_is_disabled() {
        let cx = TraceContext::detached();
        assert!(!cx.is_enabled());
        assert!(cx.create_config("ctx").callbacks.is_none());
    }

    #[test]
    fn test_contexts_isolate_trace_ids() {
        let manager = shared_manager();

        let first = manager.context(Some("trace-a".to_string()));
        manager.set_trace_id(Some("trace-a".to_string()));
        let second = manager.context(Some("trace-b".to_string()));
        manager.set_trace_id(Some("trace-b".to_string()));

        // The shared slot only remembers the last writer
        assert_eq!(manager.trace_id().as_deref(), Some("trace-b"));

        assert_eq!(first.trace_id(), Some("trace-a"));
        assert_eq!(second.trace_id(), Some("trace-b"));

        let config = first.create_config("ctx-a");
        let callbacks = config.callbacks.unwrap();
        assert_eq!(callbacks[0].trace_id.as_deref(), Some("trace-a"));
    }

    #[test]
    fn test_set_trace_id_is_local() {
        let manager = shared_manager();
        let mut cx = manager.context(None);

        cx.set_trace_id(Some("t1".to_string()));
        assert_eq!(cx.trace_id(), Some("t1"));
        assert_eq!(manager.trace_id(), None);

        cx.set_trace_id(None);
        assert_eq!(cx.trace_id(), None);
    }
}
