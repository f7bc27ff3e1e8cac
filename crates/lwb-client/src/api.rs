//! Backend API boundary
//!
//! The `Backend` trait is the sole seam between the orchestration layer
//! and the network: the session crate depends on this trait, never on
//! `reqwest` directly, so tests run against an in-process stub and the
//! production path runs against [`HttpBackend`](crate::HttpBackend).

use crate::error::ApiError;
use bytes::Bytes;
use futures::stream::Stream;
use lwb_model::{GenerationResult, ParsedDocument, RefinementConfig, StreamEvent};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A stream of assistant events, delivered in receipt order
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ApiError>> + Send>>;

/// The raw uploaded file.
///
/// Retained verbatim for the lifetime of a workflow: generation and
/// download resubmit these exact bytes, never the derived structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Original filename, extension included
    pub filename: String,
    /// File content, byte for byte
    pub bytes: Bytes,
}

impl SourceFile {
    /// Wrap a file reference
    #[must_use]
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Whether the filename carries the given extension (case-insensitive)
    #[must_use]
    pub fn has_extension(&self, ext: &str) -> bool {
        std::path::Path::new(&self.filename)
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// Successful parse response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParsedUpload {
    /// Server's summary message ("Successfully parsed 2 machine(s)")
    pub message: String,
    /// The parsed structural summary
    pub document: ParsedDocument,
}

/// One generation request.
///
/// Single request builder for both generation shapes: a populated
/// `refinement` selects the server-side refinement loop, `None` selects
/// single-shot generation. The transport alone decides the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Which machine in the parsed document to generate for
    pub machine_index: usize,
    /// Refinement configuration, if iterative refinement was requested
    pub refinement: Option<RefinementConfig>,
}

impl GenerateRequest {
    /// Single-shot generation for one machine
    #[inline]
    #[must_use]
    pub fn new(machine_index: usize) -> Self {
        Self {
            machine_index,
            refinement: None,
        }
    }

    /// Request server-side refinement
    #[inline]
    #[must_use]
    pub fn with_refinement(mut self, config: RefinementConfig) -> Self {
        self.refinement = Some(config);
        self
    }
}

/// Non-streaming assistant query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskRequest {
    /// Natural-language question
    pub query: String,
    /// How many knowledge-base examples to retrieve
    pub n_examples: usize,
    /// Whether to include code previews in the response
    pub include_code: bool,
}

impl AskRequest {
    /// Query with the backend's default retrieval settings
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            n_examples: 3,
            include_code: true,
        }
    }

    /// With a retrieval count
    #[inline]
    #[must_use]
    pub fn with_examples(mut self, n_examples: usize) -> Self {
        self.n_examples = n_examples;
        self
    }
}

/// Non-streaming assistant answer
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AskResponse {
    /// The query as echoed by the server
    pub query: String,
    /// Markdown-formatted answer
    pub answer: String,
    /// Retrieved examples, in retrieval order
    #[serde(default)]
    pub code_examples: Vec<lwb_model::CodeExample>,
    /// How many examples informed the answer
    #[serde(default)]
    pub examples_used: usize,
}

/// The backend service contract.
///
/// Every method is one network round trip (or one opened stream); callers
/// own sequencing, guards, and rollback.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Submit a logic sheet for parsing
    async fn parse(&self, file: &SourceFile) -> Result<ParsedUpload, ApiError>;

    /// Generate code for one machine, single-shot or refined
    async fn generate(
        &self,
        file: &SourceFile,
        request: &GenerateRequest,
    ) -> Result<GenerationResult, ApiError>;

    /// Generate and fetch the artifact as a binary body.
    ///
    /// Decoded on a separate path from [`generate`](Backend::generate):
    /// the response is the artifact itself, never JSON.
    async fn download(&self, file: &SourceFile, machine_index: usize) -> Result<Bytes, ApiError>;

    /// Ask the assistant, non-streaming
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ApiError>;

    /// Open one assistant event stream for a query.
    ///
    /// Dropping the returned stream closes the connection.
    async fn ask_stream(&self, query: &str, n_examples: usize) -> Result<EventStream, ApiError>;

    /// Liveness probe; affects only the connectivity indicator
    async fn health(&self) -> Result<bool, ApiError>;
}
