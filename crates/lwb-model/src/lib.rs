//! LWB Model - data model for the Logic Workbench client
//!
//! Wire-faithful types for everything the backend sends or the client
//! accumulates locally:
//! - Parsed logic documents (machines, steps, interlocks)
//! - Generation results with validation and refinement traces
//! - Chat transcript with transactional exchange semantics
//! - Tagged stream events for the assistant event stream
//!
//! The shapes here mirror the backend's JSON exactly; anything derived
//! (cycle paths, interlock summaries) is computed, never serialized.

#![warn(unreachable_pub)]

pub mod chat;
pub mod document;
pub mod generation;
pub mod stream;

pub use chat::{ChatMessage, Role, Transcript, TranscriptError};
pub use document::{Condition, DocumentError, Machine, ParsedDocument, Step};
pub use generation::{
    GenerationResult, MaxIterations, RefinementConfig, RefinementIteration, RefinementTrace,
    Severity, ValidationIssue, ValidationReport,
};
pub use stream::{CodeExample, StreamEvent};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
