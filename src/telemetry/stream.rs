//! Stream tracing wrapper
//!
//! [`Traced`] wraps any [`StreamingOperation`] and gives every call one span:
//! opened before the inner stream is created, fed the last non-empty
//! `content` the stream yields, and released exactly once when the stream
//! finishes, fails, or is dropped early. Events pass through unmodified and
//! in order.

use super::context::TraceContext;
use super::levels::LevelRegistry;
use super::manager::TracingManager;
use super::quiet::{quiet_span_exit, DEFAULT_NOISY_TARGET};
use super::span::{SpanAttributes, SpanFailure, SpanHandle};
use crate::config::DEFAULT_TRACE_NAME;
use crate::error::TracingError;
use crate::events::{EventStream, StreamEvent};
use futures::Stream;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

/// Arguments to one streaming call
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub query: String,
    pub context_id: String,
    /// Trace id propagated by the caller, if any
    pub trace_id: Option<String>,
    /// Per-call trace context, filled in by [`Traced`] before delegating
    pub tracing: TraceContext,
}

impl StreamRequest {
    pub fn new(query: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context_id: context_id.into(),
            trace_id: None,
            tracing: TraceContext::detached(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// An operation that answers a request with a stream of events
pub trait StreamingOperation: Send + Sync {
    type Error: Send + 'static;

    fn stream(&self, request: StreamRequest) -> EventStream<Self::Error>;
}

/// [`StreamingOperation`] backed by a closure
pub struct FnOperation<F, E> {
    f: F,
    _error: PhantomData<fn() -> E>,
}

/// Build a [`StreamingOperation`] from a closure
pub fn from_fn<F, E>(f: F) -> FnOperation<F, E>
where
    F: Fn(StreamRequest) -> EventStream<E> + Send + Sync,
    E: Send + 'static,
{
    FnOperation {
        f,
        _error: PhantomData,
    }
}

impl<F, E> StreamingOperation for FnOperation<F, E>
where
    F: Fn(StreamRequest) -> EventStream<E> + Send + Sync,
    E: Send + 'static,
{
    type Error = E;

    fn stream(&self, request: StreamRequest) -> EventStream<E> {
        (self.f)(request)
    }
}

/// How a wrapped call's span is named and released
#[derive(Debug, Clone)]
pub struct SpanPolicy {
    agent_name: String,
    trace_name: Option<String>,
    update_input: bool,
    noisy_target: String,
    levels: Arc<LevelRegistry>,
}

impl SpanPolicy {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            trace_name: Some(DEFAULT_TRACE_NAME.to_string()),
            update_input: false,
            noisy_target: DEFAULT_NOISY_TARGET.to_string(),
            levels: LevelRegistry::global(),
        }
    }

    /// `None` falls back to the manager's configured trace name
    pub fn with_trace_name(mut self, trace_name: Option<String>) -> Self {
        self.trace_name = trace_name;
        self
    }

    /// Re-attach the query as span input whenever output is recorded
    pub fn with_update_input(mut self, update_input: bool) -> Self {
        self.update_input = update_input;
        self
    }

    /// Log target silenced while the span is released on the failure paths
    pub fn with_noisy_target(mut self, target: impl Into<String>) -> Self {
        self.noisy_target = target.into();
        self
    }

    pub fn with_levels(mut self, levels: Arc<LevelRegistry>) -> Self {
        self.levels = levels;
        self
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn span_name(&self) -> String {
        format!("{}-agent", self.agent_name)
    }

    /// Output recorded when the stream never yielded any content
    pub fn completion_message(&self) -> String {
        format!("{} agent execution completed", title_case(&self.agent_name))
    }

    /// Wrap `inner` so every call is traced through `manager`
    pub fn wrap<Op>(self, inner: Op, manager: Arc<TracingManager>) -> Traced<Op>
    where
        Op: StreamingOperation,
    {
        Traced::new(inner, manager, self)
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest
fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_word = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// A [`StreamingOperation`] with span lifecycle management around it
pub struct Traced<Op> {
    inner: Op,
    manager: Arc<TracingManager>,
    policy: SpanPolicy,
}

impl<Op> Traced<Op> {
    pub fn new(inner: Op, manager: Arc<TracingManager>, policy: SpanPolicy) -> Self {
        Self {
            inner,
            manager,
            policy,
        }
    }

    pub fn inner(&self) -> &Op {
        &self.inner
    }

    pub fn policy(&self) -> &SpanPolicy {
        &self.policy
    }
}

impl<Op> Traced<Op>
where
    Op: StreamingOperation,
    Op::Error: From<TracingError> + fmt::Display,
{
    /// Open the span and the inner stream
    ///
    /// Unlike [`StreamingOperation::stream`], this hands back the concrete
    /// [`TracedStream`] so callers can [`close`](TracedStream::close) it and
    /// observe release failures, and it reports a span that could not be
    /// started as an `Err` instead of a one-item error stream.
    pub fn start(&self, mut request: StreamRequest) -> Result<TracedStream<Op::Error>, TracingError> {
        let agent = self.policy.agent_name.as_str();

        tracing::info!(
            agent,
            query = %request.query,
            context_id = %request.context_id,
            "Agent stream started"
        );
        tracing::info!(agent, enabled = self.manager.is_enabled(), "Tracing state");

        match request.trace_id.as_deref() {
            Some(trace_id) => {
                tracing::info!(agent, trace_id, context_id = %request.context_id, "Using propagated trace_id");
            }
            None => {
                tracing::warn!(agent, context_id = %request.context_id, "No trace_id provided by caller");
                tracing::warn!(agent, "Trace propagation chain is broken; this call starts a new trace");
            }
        }

        self.manager.set_trace_id(request.trace_id.clone());
        request.tracing = self.manager.context(request.trace_id.clone());

        if !self.manager.is_enabled() {
            let inner = self.inner.stream(request);
            return Ok(TracedStream::new(inner, SpanState::Disabled, &self.policy));
        }

        let attributes = SpanAttributes {
            agent_type: self.policy.agent_name.clone(),
            query: request.query.clone(),
            context_id: request.context_id.clone(),
            trace_id: request.trace_id.clone(),
            trace_name: self
                .policy
                .trace_name
                .clone()
                .or_else(|| self.manager.trace_name().map(String::from)),
            update_input: self.policy.update_input,
        };

        let span = self.manager.start_span(&self.policy.span_name(), &attributes)?;
        let inner = match span.tracing_span() {
            Some(scope) => scope.in_scope(|| self.inner.stream(request)),
            None => self.inner.stream(request),
        };

        Ok(TracedStream::new(inner, SpanState::Open(span), &self.policy))
    }
}

impl<Op> StreamingOperation for Traced<Op>
where
    Op: StreamingOperation,
    Op::Error: From<TracingError> + fmt::Display,
{
    type Error = Op::Error;

    fn stream(&self, request: StreamRequest) -> EventStream<Op::Error> {
        match self.start(request) {
            Ok(stream) => Box::pin(stream),
            Err(err) => {
                tracing::error!(agent = %self.policy.agent_name, error = %err, "Failed to start agent span");
                Box::pin(futures::stream::iter([Err::<StreamEvent, _>(Op::Error::from(err))]))
            }
        }
    }
}

/// How a span ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanOutcome {
    /// Inner stream exhausted, output recorded, span released normally
    Completed,
    /// Stream dropped or closed before exhaustion
    Cancelled,
    /// Inner stream yielded an error, or recording output failed
    Failed,
}

enum SpanState {
    Disabled,
    Open(Box<dyn SpanHandle>),
    Closed(SpanOutcome),
}

/// Stream returned by [`Traced`]
///
/// Dropping it before exhaustion releases the span; use
/// [`close`](Self::close) instead to see a release failure.
pub struct TracedStream<E> {
    inner: Option<EventStream<E>>,
    state: SpanState,
    last_output: Option<String>,
    trailing: VecDeque<E>,
    completion_message: String,
    noisy_target: String,
    levels: Arc<LevelRegistry>,
}

// Only the boxed inner stream is polled, and it is already pinned
impl<E> Unpin for TracedStream<E> {}

impl<E> TracedStream<E> {
    fn new(inner: EventStream<E>, state: SpanState, policy: &SpanPolicy) -> Self {
        Self {
            inner: Some(inner),
            state,
            last_output: None,
            trailing: VecDeque::new(),
            completion_message: policy.completion_message(),
            noisy_target: policy.noisy_target.clone(),
            levels: Arc::clone(&policy.levels),
        }
    }

    /// Whether a span was opened for this call
    pub fn is_traced(&self) -> bool {
        !matches!(self.state, SpanState::Disabled)
    }

    /// How the span ended, `None` while open or when untraced
    pub fn outcome(&self) -> Option<SpanOutcome> {
        match self.state {
            SpanState::Closed(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Last non-empty `content` seen so far
    pub fn last_output(&self) -> Option<&str> {
        self.last_output.as_deref()
    }

    /// Stop consuming and release the span
    ///
    /// Returns the release failure that dropping would only log. The
    /// cross-context detach failure is never returned.
    pub fn close(mut self) -> Result<(), TracingError> {
        self.release_early()
    }

    fn take_span(&mut self, outcome: SpanOutcome) -> Option<Box<dyn SpanHandle>> {
        match std::mem::replace(&mut self.state, SpanState::Closed(outcome)) {
            SpanState::Open(span) => Some(span),
            previous => {
                self.state = previous;
                None
            }
        }
    }

    fn quiet_exit(
        &self,
        span: Box<dyn SpanHandle>,
        failure: Option<&SpanFailure>,
    ) -> Result<(), TracingError> {
        quiet_span_exit(span, failure, &self.levels, &self.noisy_target)
    }

    fn release_early(&mut self) -> Result<(), TracingError> {
        self.inner = None;
        let Some(mut span) = self.take_span(SpanOutcome::Cancelled) else {
            return Ok(());
        };

        if let Some(output) = self.last_output.as_deref() {
            if let Err(err) = span.update_output(output) {
                tracing::debug!(error = %err, "Ignoring output update failure on early stop");
            }
        }
        self.quiet_exit(span, None)
    }

    /// Inner stream failed: release with the failure and end
    fn fail(&mut self, failure: SpanFailure) -> Option<TracingError> {
        self.inner = None;
        let span = self.take_span(SpanOutcome::Failed)?;
        self.quiet_exit(span, Some(&failure)).err()
    }

    /// Inner stream exhausted: record output and release normally
    fn complete(&mut self) -> Vec<TracingError> {
        self.inner = None;
        let Some(mut span) = self.take_span(SpanOutcome::Completed) else {
            return Vec::new();
        };

        let output = self
            .last_output
            .clone()
            .unwrap_or_else(|| self.completion_message.clone());

        match span.update_output(&output) {
            Ok(()) => span.exit(None).err().into_iter().collect(),
            Err(err) => {
                self.state = SpanState::Closed(SpanOutcome::Failed);
                let failure = SpanFailure::from_error(&err);
                let mut errors = vec![err];
                errors.extend(self.quiet_exit(span, Some(&failure)).err());
                errors
            }
        }
    }
}

impl<E> Stream for TracedStream<E>
where
    E: From<TracingError> + fmt::Display,
{
    type Item = Result<StreamEvent, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(err) = this.trailing.pop_front() {
            return Poll::Ready(Some(Err(err)));
        }

        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        let polled = match &this.state {
            SpanState::Open(span) => match span.tracing_span() {
                Some(scope) => scope.in_scope(|| inner.as_mut().poll_next(cx)),
                None => inner.as_mut().poll_next(cx),
            },
            _ => inner.as_mut().poll_next(cx),
        };

        match ready!(polled) {
            Some(Ok(event)) => {
                if matches!(this.state, SpanState::Open(_)) {
                    if let Some(content) = event.content_text() {
                        this.last_output = Some(content);
                    }
                }
                Poll::Ready(Some(Ok(event)))
            }
            // Untraced calls relay the inner stream as is, errors included
            Some(Err(err)) if !this.is_traced() => Poll::Ready(Some(Err(err))),
            Some(Err(err)) => {
                if let Some(release) = this.fail(SpanFailure::from_error(&err)) {
                    this.trailing.push_back(E::from(release));
                }
                Poll::Ready(Some(Err(err)))
            }
            None => {
                let mut errors = this.complete().into_iter().map(E::from);
                match errors.next() {
                    Some(first) => {
                        this.trailing.extend(errors);
                        Poll::Ready(Some(Err(first)))
                    }
                    None => Poll::Ready(None),
                }
            }
        }
    }
}

impl<E> Drop for TracedStream<E> {
    fn drop(&mut self) {
        if let Err(err) = self.release_early() {
            tracing::error!(error = %err, "Failed to release agent span on early stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("argocd"), "Argocd");
        assert_eq!(title_case("github-ops"), "Github-Ops");
        assert_eq!(title_case("AWS bedrock"), "Aws Bedrock");
        assert_eq!(title_case("k8s"), "K8S");
    }

    #[test]
    fn test_policy_names() {
        let policy = SpanPolicy::new("argocd");
        assert_eq!(policy.span_name(), "argocd-agent");
        assert_eq!(policy.completion_message(), "Argocd agent execution completed");
        assert_eq!(policy.trace_name.as_deref(), Some(DEFAULT_TRACE_NAME));
    }

    #[test]
    fn test_request_defaults_to_detached_context() {
        let request = StreamRequest::new("list apps", "ctx-1").with_trace_id("t1");
        assert_eq!(request.trace_id.as_deref(), Some("t1"));
        assert!(!request.tracing.is_enabled());
        assert_eq!(request.tracing.trace_id(), None);
    }
}
