//! Session-level errors
//!
//! Wraps the API taxonomy and adds the failures only the orchestration
//! layer can produce: guard rejections, stage violations, and bad machine
//! indices. Every failure is recovered at the component boundary and
//! turned into something showable.

use crate::workflow::Stage;
use lwb_client::ApiError;
use lwb_model::TranscriptError;

/// Errors from the orchestration layer
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A backend interaction failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A transcript invariant was violated
    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    /// A parsed document failed local invariant checks
    #[error("document invariant violated: {0}")]
    Document(#[from] lwb_model::DocumentError),

    /// An in-flight guard rejected a second invocation
    #[error("{0} already in progress")]
    Busy(&'static str),

    /// The action is not available at the current stage
    #[error("action not available at stage {}", stage.number())]
    StageViolation {
        /// Stage the workflow was in
        stage: Stage,
    },

    /// Machine index outside the parsed document
    #[error("machine index {index} out of range ({count} machines)")]
    MachineIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Machines in the document
        count: usize,
    },

    /// An operation was attempted with no session active
    #[error("no assistant session is active")]
    NotActive,
}

impl SessionError {
    /// Text fit for the user: server messages verbatim, transport
    /// failures as a generic connectivity message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Api(ApiError::ServerRejected { detail, .. }) => detail.clone(),
            SessionError::Api(ApiError::Stream(message)) => message.clone(),
            SessionError::Api(ApiError::Transport(_)) => {
                "Could not reach the generation service. Check your connection and try again."
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}
