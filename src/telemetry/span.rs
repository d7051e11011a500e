//! Span provider capability
//!
//! The tracing wrapper never talks to an observability backend directly. It
//! asks a [`SpanProvider`] for a [`SpanHandle`], records output on it, and
//! releases it exactly once. [`TracingSpanProvider`] is the default: it
//! opens `tracing` spans, which the OpenTelemetry layer installed by
//! [`crate::telemetry::Telemetry::init`] exports over OTLP.

use crate::error::TracingError;
use std::fmt;

/// Target for spans opened by [`TracingSpanProvider`]
pub const AGENT_SPAN_TARGET: &str = "agent_utils::agent";

/// Attributes attached to an agent stream span
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanAttributes {
    pub agent_type: String,
    pub query: String,
    pub context_id: String,
    pub trace_id: Option<String>,
    pub trace_name: Option<String>,
    /// Re-attach the query as span input whenever output is recorded
    pub update_input: bool,
}

/// Failure information passed to a span on release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanFailure {
    pub message: String,
}

impl SpanFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_error(err: &impl fmt::Display) -> Self {
        Self::new(err.to_string())
    }
}

/// One in-flight span, exclusively owned by the call that opened it
pub trait SpanHandle: Send {
    /// Record the call's output on the span
    fn update_output(&mut self, output: &str) -> Result<(), TracingError>;

    /// Release the span, optionally marking it failed
    fn exit(self: Box<Self>, failure: Option<&SpanFailure>) -> Result<(), TracingError>;

    /// The `tracing` span to enter while the wrapped stream is polled
    fn tracing_span(&self) -> Option<&tracing::Span> {
        None
    }
}

/// Source of spans
pub trait SpanProvider: Send + Sync {
    /// Open and enter a new span
    fn start_span(
        &self,
        name: &str,
        attributes: &SpanAttributes,
    ) -> Result<Box<dyn SpanHandle>, TracingError>;
}

/// Provider backed by the `tracing` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSpanProvider;

impl SpanProvider for TracingSpanProvider {
    fn start_span(
        &self,
        name: &str,
        attributes: &SpanAttributes,
    ) -> Result<Box<dyn SpanHandle>, TracingError> {
        let span = tracing::info_span!(
            target: AGENT_SPAN_TARGET,
            "agent_stream",
            otel.name = name,
            otel.status_code = tracing::field::Empty,
            agent.type = attributes.agent_type.as_str(),
            context_id = attributes.context_id.as_str(),
            trace_id = attributes.trace_id.as_deref(),
            trace_name = attributes.trace_name.as_deref(),
            input = attributes.query.as_str(),
            output = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        // Filtered out by the subscriber: the call still runs, untraced
        if span.is_disabled() {
            tracing::debug!(span = name, "Agent span filtered out; continuing without it");
            return Ok(Box::new(FilteredSpan));
        }

        Ok(Box::new(TracingSpanHandle {
            span,
            query: attributes.query.clone(),
            update_input: attributes.update_input,
        }))
    }
}

/// Stand-in for a span no subscriber records
struct FilteredSpan;

impl SpanHandle for FilteredSpan {
    fn update_output(&mut self, _output: &str) -> Result<(), TracingError> {
        Ok(())
    }

    fn exit(self: Box<Self>, _failure: Option<&SpanFailure>) -> Result<(), TracingError> {
        Ok(())
    }
}

struct TracingSpanHandle {
    span: tracing::Span,
    query: String,
    update_input: bool,
}

impl SpanHandle for TracingSpanHandle {
    fn update_output(&mut self, output: &str) -> Result<(), TracingError> {
        if self.update_input {
            self.span.record("input", self.query.as_str());
        }
        self.span.record("output", output);
        Ok(())
    }

    fn exit(self: Box<Self>, failure: Option<&SpanFailure>) -> Result<(), TracingError> {
        match failure {
            Some(failure) => {
                self.span.record("otel.status_code", "ERROR");
                self.span.record("error", failure.message.as_str());
            }
            None => {
                self.span.record("otel.status_code", "OK");
            }
        }
        // Dropping the last handle closes the span
        drop(self);
        Ok(())
    }

    fn tracing_span(&self) -> Option<&tracing::Span> {
        Some(&self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing::span::{Attributes, Id, Record};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::Layer;

    /// Captures field names recorded on agent spans and counts closes
    #[derive(Clone, Default)]
    struct SpanRecorder {
        fields: Arc<Mutex<Vec<(String, String)>>>,
        closed: Arc<Mutex<usize>>,
    }

    struct FieldVisitor<'a>(&'a Mutex<Vec<(String, String)>>);

    impl tracing::field::Visit for FieldVisitor<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
            self.0
                .lock()
                .unwrap()
                .push((field.name().to_string(), format!("{:?}", value)));
        }

        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.0
                .lock()
                .unwrap()
                .push((field.name().to_string(), value.to_string()));
        }
    }

    impl<S> Layer<S> for SpanRecorder
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            attrs.record(&mut FieldVisitor(&self.fields));
        }

        fn on_record(&self, _id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
            values.record(&mut FieldVisitor(&self.fields));
        }

        fn on_close(&self, _id: Id, _ctx: Context<'_, S>) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    impl SpanRecorder {
        fn value(&self, name: &str) -> Option<String> {
            self.fields
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value.clone())
        }
    }

    fn attributes() -> SpanAttributes {
        SpanAttributes {
            agent_type: "argocd".to_string(),
            query: "list apps".to_string(),
            context_id: "ctx-1".to_string(),
            trace_id: Some("trace-1".to_string()),
            trace_name: Some("workflow".to_string()),
            update_input: false,
        }
    }

    #[test]
    fn test_filtered_span_is_a_no_op() {
        tracing::subscriber::with_default(tracing::subscriber::NoSubscriber::default(), || {
            let mut span = TracingSpanProvider
                .start_span("argocd-agent", &attributes())
                .unwrap();
            assert!(span.tracing_span().is_none());
            span.update_output("3 apps").unwrap();
            span.exit(Some(&SpanFailure::new("boom"))).unwrap();
        });
    }

    #[test]
    fn test_span_below_filter_level_is_a_no_op() {
        let recorder = SpanRecorder::default();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new("warn"))
            .with(recorder.clone());

        tracing::subscriber::with_default(subscriber, || {
            let mut span = TracingSpanProvider
                .start_span("argocd-agent", &attributes())
                .unwrap();
            span.update_output("3 apps").unwrap();
            span.exit(None).unwrap();
        });

        assert_eq!(recorder.value("otel.name"), None);
        assert_eq!(*recorder.closed.lock().unwrap(), 0);
    }

    #[test]
    fn test_records_output_and_failure() {
        let recorder = SpanRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());

        tracing::subscriber::with_default(subscriber, || {
            let mut span = TracingSpanProvider
                .start_span("argocd-agent", &attributes())
                .unwrap();
            span.update_output("3 apps").unwrap();
            span.exit(Some(&SpanFailure::new("boom"))).unwrap();
        });

        assert_eq!(recorder.value("otel.name").as_deref(), Some("argocd-agent"));
        assert_eq!(recorder.value("trace_id").as_deref(), Some("trace-1"));
        assert_eq!(recorder.value("output").as_deref(), Some("3 apps"));
        assert_eq!(recorder.value("error").as_deref(), Some("boom"));
        assert_eq!(recorder.value("otel.status_code").as_deref(), Some("ERROR"));
        assert_eq!(*recorder.closed.lock().unwrap(), 1);
    }
}
