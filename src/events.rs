//! Stream event types
//!
//! A streaming agent operation yields a sequence of loosely-typed events,
//! one JSON object each. The only key this crate reads is `content`.

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;

/// One event produced by a streaming operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamEvent(Map<String, Value>);

impl StreamEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event carrying only a `content` field
    pub fn text(content: impl Into<String>) -> Self {
        Self::new().with("content", content.into())
    }

    /// Set `key` and return the event
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `content` field as text, if it holds anything meaningful
    ///
    /// Null, `false`, zero and empty strings/arrays/objects count as no
    /// content. Non-string values are rendered as JSON.
    pub fn content_text(&self) -> Option<String> {
        match self.0.get("content")? {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Array(a) if a.is_empty() => None,
            Value::Object(o) if o.is_empty() => None,
            Value::Number(n) if n.as_f64() == Some(0.0) => None,
            other => Some(other.to_string()),
        }
    }

    /// Whether the agent marked this event as its final answer
    pub fn is_task_complete(&self) -> bool {
        self.0
            .get("is_task_complete")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for StreamEvent {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Stream of events from a streaming operation
pub type EventStream<E> = Pin<Box<dyn Stream<Item = Result<StreamEvent, E>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_text() {
        assert_eq!(StreamEvent::text("hello").content_text().as_deref(), Some("hello"));
        assert_eq!(StreamEvent::text("").content_text(), None);
        assert_eq!(StreamEvent::new().content_text(), None);
        assert_eq!(StreamEvent::new().with("content", Value::Null).content_text(), None);
        assert_eq!(
            StreamEvent::new().with("content", json!({"k": 1})).content_text().as_deref(),
            Some(r#"{"k":1}"#)
        );
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let event = StreamEvent::text("Processing...").with("is_task_complete", false);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"content": "Processing...", "is_task_complete": false}));
        assert!(!event.is_task_complete());

        let parsed: StreamEvent =
            serde_json::from_str(r#"{"content": "done", "is_task_complete": true}"#).unwrap();
        assert!(parsed.is_task_complete());
    }
}
