//! Progress events streamed from long-running discovery and backtest runs
//!
//! This is the wire contract for streaming consumers: every event carries a
//! `type` of `step`, `result`, `error`, or `done`. `error` and `done` both
//! terminate the stream. Consumers key off `type`, so the vocabulary must not
//! grow or change shape casually.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One progress event in a discovery or backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// A step is starting
    Step { message: String },

    /// A step completed, optionally carrying structured data
    Result {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },

    /// The run failed; no further events follow
    Error { message: String },

    /// The run finished; `data` is the final payload
    Done { data: Value },
}

impl ProgressEvent {
    pub fn step(message: impl Into<String>) -> Self {
        ProgressEvent::Step {
            message: message.into(),
        }
    }

    pub fn result(message: impl Into<String>) -> Self {
        ProgressEvent::Result {
            message: message.into(),
            data: None,
        }
    }

    pub fn result_with(message: impl Into<String>, data: Value) -> Self {
        ProgressEvent::Result {
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }

    pub fn done(data: Value) -> Self {
        ProgressEvent::Done { data }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Error { .. } | ProgressEvent::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_tags() {
        let step = serde_json::to_value(ProgressEvent::step("loading")).unwrap();
        assert_eq!(step, json!({"type": "step", "message": "loading"}));

        let result = serde_json::to_value(ProgressEvent::result("done loading")).unwrap();
        assert_eq!(result, json!({"type": "result", "message": "done loading"}));

        let with_data =
            serde_json::to_value(ProgressEvent::result_with("counted", json!({"count": 3})))
                .unwrap();
        assert_eq!(
            with_data,
            json!({"type": "result", "message": "counted", "data": {"count": 3}})
        );

        let error = serde_json::to_value(ProgressEvent::error("boom")).unwrap();
        assert_eq!(error, json!({"type": "error", "message": "boom"}));

        let done = serde_json::to_value(ProgressEvent::done(json!({"followers": []}))).unwrap();
        assert_eq!(done, json!({"type": "done", "data": {"followers": []}}));
    }

    #[test]
    fn test_terminal_events() {
        assert!(!ProgressEvent::step("x").is_terminal());
        assert!(!ProgressEvent::result("x").is_terminal());
        assert!(ProgressEvent::error("x").is_terminal());
        assert!(ProgressEvent::done(json!({})).is_terminal());
    }
}
