//! Shared test fixtures: a span provider that records every call

#![allow(dead_code)]

use agent_utils::config::TracingConfig;
use agent_utils::telemetry::{
    quiet::DEFAULT_NOISY_TARGET, LevelRegistry, SpanAttributes, SpanFailure, SpanHandle,
    SpanPolicy, SpanProvider,
};
use agent_utils::{EventStream, StreamEvent, TracingError, TracingManager};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;

pub const SPURIOUS_EXIT: &str = "<Token var=<ContextVar name='current_context'>> was created in a different Context";

/// Error type of the test agents
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{0}")]
    Agent(String),

    #[error(transparent)]
    Tracing(#[from] TracingError),
}

/// Everything the provider saw
#[derive(Debug, Default)]
pub struct Recording {
    pub starts: Vec<(String, SpanAttributes)>,
    pub outputs: Vec<String>,
    pub exits: Vec<Option<SpanFailure>>,
    /// Override on the noisy target at the moment of each exit
    pub levels_at_exit: Vec<Option<LevelFilter>>,
}

#[derive(Clone)]
pub struct RecordingProvider {
    pub recording: Arc<Mutex<Recording>>,
    pub levels: Arc<LevelRegistry>,
    exit_error: Option<String>,
    output_error: Option<String>,
    fail_start: bool,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            recording: Arc::default(),
            levels: Arc::new(LevelRegistry::new()),
            exit_error: None,
            output_error: None,
            fail_start: false,
        }
    }

    pub fn with_exit_error(mut self, message: &str) -> Self {
        self.exit_error = Some(message.to_string());
        self
    }

    pub fn with_output_error(mut self, message: &str) -> Self {
        self.output_error = Some(message.to_string());
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Manager with tracing enabled, backed by this provider
    pub fn manager(&self) -> Arc<TracingManager> {
        Arc::new(TracingManager::new(
            &TracingConfig::default().with_enabled(true),
            Arc::new(self.clone()),
        ))
    }

    /// Policy for agent `test` releasing through this provider's registry
    pub fn policy(&self) -> SpanPolicy {
        SpanPolicy::new("test").with_levels(Arc::clone(&self.levels))
    }

    pub fn starts(&self) -> usize {
        self.recording.lock().starts.len()
    }

    pub fn outputs(&self) -> Vec<String> {
        self.recording.lock().outputs.clone()
    }

    pub fn exits(&self) -> Vec<Option<SpanFailure>> {
        self.recording.lock().exits.clone()
    }

    pub fn levels_at_exit(&self) -> Vec<Option<LevelFilter>> {
        self.recording.lock().levels_at_exit.clone()
    }
}

impl SpanProvider for RecordingProvider {
    fn start_span(
        &self,
        name: &str,
        attributes: &SpanAttributes,
    ) -> Result<Box<dyn SpanHandle>, TracingError> {
        if self.fail_start {
            return Err(TracingError::ProviderUnavailable("collector unreachable".to_string()));
        }
        self.recording
            .lock()
            .starts
            .push((name.to_string(), attributes.clone()));
        Ok(Box::new(RecordingSpan {
            provider: self.clone(),
        }))
    }
}

struct RecordingSpan {
    provider: RecordingProvider,
}

impl SpanHandle for RecordingSpan {
    fn update_output(&mut self, output: &str) -> Result<(), TracingError> {
        if let Some(message) = &self.provider.output_error {
            return Err(TracingError::RecordOutput(message.clone()));
        }
        self.provider.recording.lock().outputs.push(output.to_string());
        Ok(())
    }

    fn exit(self: Box<Self>, failure: Option<&SpanFailure>) -> Result<(), TracingError> {
        let level = self.provider.levels.level(DEFAULT_NOISY_TARGET);
        {
            let mut recording = self.provider.recording.lock();
            recording.exits.push(failure.cloned());
            recording.levels_at_exit.push(level);
        }
        match &self.provider.exit_error {
            Some(message) => Err(TracingError::SpanExit(message.clone())),
            None => Ok(()),
        }
    }
}

/// Stream that yields `items` in order
pub fn scripted(items: Vec<Result<StreamEvent, AgentError>>) -> EventStream<AgentError> {
    Box::pin(futures::stream::iter(items))
}

pub fn text(content: &str) -> Result<StreamEvent, AgentError> {
    Ok(StreamEvent::text(content))
}
