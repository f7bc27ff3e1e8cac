//! Assistant stream events
//!
//! Each frame on the assistant event stream is one JSON object with a
//! `type` discriminant. The tagged enum keeps dispatch exhaustive: adding
//! an event kind is a checked change at every consumer.

use serde::{Deserialize, Serialize};

/// A code example retrieved from the knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeExample {
    /// Routine the example came from
    pub routine_name: String,
    /// Similarity to the query, in [0, 1]
    pub similarity_score: f64,
    /// Size of the routine in rungs
    #[serde(default)]
    pub rung_count: u32,
    /// File the routine was indexed from
    pub source_file: String,
    /// Truncated code preview, if the server included one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_preview: Option<String>,
}

/// One event on the assistant stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Transient progress indicator; never mutates message content
    Status {
        /// Progress text
        message: String,
    },
    /// One retrieved example, emitted in retrieval order
    Example {
        /// The example payload
        data: CodeExample,
    },
    /// A fragment of the answer, concatenated in receipt order
    Content {
        /// Text fragment
        text: String,
    },
    /// Terminal: the answer is complete
    Done,
    /// Terminal: the server failed mid-stream
    Error {
        /// Server-supplied failure message
        message: String,
    },
}

impl StreamEvent {
    /// Whether this event terminates the stream
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_each_discriminant() {
        let status: StreamEvent =
            serde_json::from_str(r#"{"type": "status", "message": "Thinking..."}"#).unwrap();
        assert_eq!(
            status,
            StreamEvent::Status {
                message: "Thinking...".to_string()
            }
        );

        let content: StreamEvent =
            serde_json::from_str(r#"{"type": "content", "text": "XIC DI01 "}"#).unwrap();
        assert!(!content.is_terminal());

        let done: StreamEvent = serde_json::from_str(r#"{"type": "done"}"#).unwrap();
        assert!(done.is_terminal());

        let error: StreamEvent =
            serde_json::from_str(r#"{"type": "error", "message": "LLM unavailable"}"#).unwrap();
        assert!(error.is_terminal());
    }

    #[test]
    fn decodes_example_payload() {
        let json = r#"{
            "type": "example",
            "data": {
                "routine_name": "R_Conveyor",
                "similarity_score": 0.82,
                "rung_count": 14,
                "source_file": "plant_a.L5X",
                "code_preview": "XIC DI01 OTE DO02"
            }
        }"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        match event {
            StreamEvent::Example { data } => {
                assert_eq!(data.routine_name, "R_Conveyor");
                assert!((0.0..=1.0).contains(&data.similarity_score));
            }
            other => panic!("expected example, got {other:?}"),
        }
    }

    #[test]
    fn unknown_discriminant_is_an_error() {
        let result = serde_json::from_str::<StreamEvent>(r#"{"type": "shrug"}"#);
        assert!(result.is_err());
    }
}
