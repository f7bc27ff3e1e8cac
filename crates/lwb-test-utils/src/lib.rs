//! Testing utilities for the LWB workspace
//!
//! [`StubBackend`] stands in for the generation service: scripted
//! responses, failure injection, and call/connection counters, behind the
//! same [`Backend`] trait the production client implements. Session tests
//! drive the full orchestration layer against it without a server.

use bytes::Bytes;
use futures::StreamExt;
use lwb_client::{
    ApiError, AskRequest, AskResponse, Backend, EventStream, GenerateRequest, ParsedUpload,
    SourceFile,
};
use lwb_model::{
    CodeExample, Condition, GenerationResult, Machine, ParsedDocument, RefinementIteration,
    RefinementTrace, Step, StreamEvent, ValidationReport,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

/// Initialize tracing once for a test binary
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A three-step sample machine cycling 1 → 2 → 3 → 1
#[must_use]
pub fn sample_machine(name: &str) -> Machine {
    let step = |n: u32, next: u32, tags: &[&str]| Step {
        step: n,
        description: format!("step {n}"),
        interlocks: tags.iter().map(|t| (*t).to_string()).collect(),
        condition: Condition::Yes,
        next_step: next,
    };
    Machine {
        name: name.to_string(),
        steps: vec![
            step(1, 2, &["DI01"]),
            step(2, 3, &[]),
            step(3, 1, &["DI02"]),
        ],
    }
}

/// A one-machine sample document
#[must_use]
pub fn sample_document() -> ParsedDocument {
    ParsedDocument {
        machines: vec![sample_machine("Main Conveyor")],
        total_machines: 1,
    }
}

/// A well-formed sample upload file
#[must_use]
pub fn sample_file() -> SourceFile {
    SourceFile::new(
        "plant.csv",
        &b"Logic,LogicDescription,Interlock1,Condition,Logic\n1,step 1,DI01,Yes,2\n"[..],
    )
}

/// A retrieved example for stream scripts
#[must_use]
pub fn sample_example(name: &str) -> CodeExample {
    CodeExample {
        routine_name: name.to_string(),
        similarity_score: 0.87,
        rung_count: 12,
        source_file: "plant_a.L5X".to_string(),
        code_preview: Some("XIC DI01 OTE DO02".to_string()),
    }
}

#[derive(Default)]
struct StubState {
    document: Option<ParsedDocument>,
    next_parse_error: Option<ApiError>,
    next_generate_error: Option<ApiError>,
    next_stream_error: Option<ApiError>,
    stream_script: Option<Vec<Result<StreamEvent, ApiError>>>,
    healthy: bool,
}

/// Counters observed by tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StubCounters {
    /// Parse requests served (or rejected)
    pub parse_calls: usize,
    /// Generate requests served (or rejected)
    pub generate_calls: usize,
    /// Download requests served
    pub download_calls: usize,
    /// Event-stream connections ever opened
    pub streams_opened: usize,
}

/// Scriptable in-process backend
pub struct StubBackend {
    state: Mutex<StubState>,
    counters: Mutex<StubCounters>,
    open_streams: Arc<AtomicUsize>,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StubBackend {
    /// A healthy backend serving the sample document
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubState {
                document: Some(sample_document()),
                healthy: true,
                ..StubState::default()
            }),
            counters: Mutex::new(StubCounters::default()),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Serve a specific document on parse
    #[must_use]
    pub fn with_document(self, document: ParsedDocument) -> Self {
        self.state.lock().document = Some(document);
        self
    }

    /// Script the next event stream
    pub fn script_stream(&self, events: Vec<Result<StreamEvent, ApiError>>) {
        self.state.lock().stream_script = Some(events);
    }

    /// Fail the next parse request
    pub fn fail_next_parse(&self, error: ApiError) {
        self.state.lock().next_parse_error = Some(error);
    }

    /// Fail the next generate request
    pub fn fail_next_generate(&self, error: ApiError) {
        self.state.lock().next_generate_error = Some(error);
    }

    /// Fail the next stream open (connection refused, before any event)
    pub fn fail_next_stream_open(&self, error: ApiError) {
        self.state.lock().next_stream_error = Some(error);
    }

    /// Flip the liveness probe
    pub fn set_healthy(&self, healthy: bool) {
        self.state.lock().healthy = healthy;
    }

    /// Counter snapshot
    #[must_use]
    pub fn counters(&self) -> StubCounters {
        *self.counters.lock()
    }

    /// Event-stream connections currently open
    #[must_use]
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }
}

/// Decrements the open-connection count when the stream is dropped
struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Backend for StubBackend {
    async fn parse(&self, file: &SourceFile) -> Result<ParsedUpload, ApiError> {
        self.counters.lock().parse_calls += 1;
        let mut state = self.state.lock();
        if let Some(error) = state.next_parse_error.take() {
            return Err(error);
        }
        let document = state
            .document
            .clone()
            .ok_or(ApiError::MissingInput("no document scripted"))?;
        Ok(ParsedUpload {
            message: format!(
                "Successfully parsed {} machine(s) from {}",
                document.total_machines, file.filename
            ),
            document,
        })
    }

    async fn generate(
        &self,
        _file: &SourceFile,
        request: &GenerateRequest,
    ) -> Result<GenerationResult, ApiError> {
        self.counters.lock().generate_calls += 1;
        let mut state = self.state.lock();
        if let Some(error) = state.next_generate_error.take() {
            return Err(error);
        }
        let document = state
            .document
            .clone()
            .ok_or(ApiError::MissingInput("no document scripted"))?;
        let machine = document
            .machine(request.machine_index)
            .ok_or(ApiError::ServerRejected {
                status: 400,
                detail: "Machine index out of range".to_string(),
            })?;

        let l5x_code = format!("<RSLogix5000Content Machine=\"{}\"/>", machine.name);
        // The stub "server" converges in two passes, capped by the request.
        let refinement = request.refinement.map(|config| {
            let passes = config.max_iterations.value().min(2);
            let iterations = (1..=passes)
                .map(|iteration| RefinementIteration {
                    iteration,
                    is_valid: iteration == passes,
                    error_count: usize::from(iteration != passes),
                    warning_count: 0,
                    info_count: 0,
                    issues: Vec::new(),
                })
                .collect();
            RefinementTrace {
                iterations,
                total_iterations: passes,
                final_valid: true,
            }
        });

        Ok(GenerationResult {
            machine_name: machine.name.clone(),
            code_length: l5x_code.len(),
            l5x_code,
            similar_count: 3,
            validation: ValidationReport {
                is_valid: true,
                issues: Vec::new(),
            },
            refinement,
        })
    }

    async fn download(&self, _file: &SourceFile, machine_index: usize) -> Result<Bytes, ApiError> {
        self.counters.lock().download_calls += 1;
        let state = self.state.lock();
        let document = state
            .document
            .clone()
            .ok_or(ApiError::MissingInput("no document scripted"))?;
        let machine = document.machine(machine_index).ok_or(ApiError::ServerRejected {
            status: 400,
            detail: "Machine index out of range".to_string(),
        })?;
        Ok(Bytes::from(format!(
            "<RSLogix5000Content Machine=\"{}\"/>",
            machine.name
        )))
    }

    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ApiError> {
        Ok(AskResponse {
            query: request.query.clone(),
            answer: "Use a TON timer per step; see R_Conveyor.".to_string(),
            code_examples: vec![sample_example("R_Conveyor")],
            examples_used: 1,
        })
    }

    async fn ask_stream(&self, _query: &str, _n_examples: usize) -> Result<EventStream, ApiError> {
        let script = {
            let mut state = self.state.lock();
            if let Some(error) = state.next_stream_error.take() {
                return Err(error);
            }
            state.stream_script.take().unwrap_or_else(|| {
                vec![
                    Ok(StreamEvent::Status {
                        message: "Thinking...".to_string(),
                    }),
                    Ok(StreamEvent::Content {
                        text: "stub answer".to_string(),
                    }),
                    Ok(StreamEvent::Done),
                ]
            })
        };

        self.counters.lock().streams_opened += 1;
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        let guard = OpenGuard(Arc::clone(&self.open_streams));

        Ok(Box::pin(futures::stream::iter(script).map(move |item| {
            let _open = &guard;
            item
        })))
    }

    async fn health(&self) -> Result<bool, ApiError> {
        Ok(self.state.lock().healthy)
    }
}
