//! Generation orchestration
//!
//! Issues one generation request per invocation against the retained
//! source file. The server owns all iteration logic; the returned
//! refinement trace is rendered, never recomputed. The `generating`
//! guard is released on every exit path.

use crate::error::SessionError;
use crate::guard::InFlightGuard;
use bytes::Bytes;
use lwb_client::{ApiError, Backend, GenerateRequest, SourceFile};
use lwb_model::{GenerationResult, MaxIterations, ParsedDocument, RefinementConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Extension of the downloaded artifact
const ARTIFACT_EXTENSION: &str = "L5X";

/// User-selected generation options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Whether to run the server-side refinement loop
    pub use_refinement: bool,
    /// Iteration ceiling when refinement is on
    pub max_iterations: MaxIterations,
}

impl GenerateOptions {
    /// Single-shot generation
    #[inline]
    #[must_use]
    pub fn single_shot() -> Self {
        Self {
            use_refinement: false,
            max_iterations: MaxIterations::default(),
        }
    }

    /// Refined generation with the given ceiling
    #[inline]
    #[must_use]
    pub fn refined(max_iterations: MaxIterations) -> Self {
        Self {
            use_refinement: true,
            max_iterations,
        }
    }

    fn request(&self, machine_index: usize) -> GenerateRequest {
        let request = GenerateRequest::new(machine_index);
        if self.use_refinement {
            request.with_refinement(RefinementConfig::new(self.max_iterations))
        } else {
            request
        }
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self::single_shot()
    }
}

/// A downloaded artifact with its derived filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Suggested filename
    pub filename: String,
    /// Artifact bytes, exactly as served
    pub bytes: Bytes,
}

/// Filename for a machine's artifact: whitespace collapsed to `_`.
#[must_use]
pub fn artifact_filename(machine_name: &str) -> String {
    let stem = machine_name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{stem}.{ARTIFACT_EXTENSION}")
}

/// Drives generation and artifact download for one machine at a time
pub struct RefinementOrchestrator {
    backend: Arc<dyn Backend>,
    generating: bool,
}

impl RefinementOrchestrator {
    /// Orchestrator over the given backend
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            generating: false,
        }
    }

    /// Whether a generation request is in flight
    #[inline]
    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Pre-flight checks shared by generate and download: both inputs
    /// present, index in bounds. Fails before any network call.
    fn preflight<'a>(
        file: Option<&'a SourceFile>,
        document: Option<&'a ParsedDocument>,
        machine_index: usize,
    ) -> Result<(&'a SourceFile, &'a ParsedDocument), SessionError> {
        let file = file.ok_or(ApiError::MissingInput("source file"))?;
        let document = document.ok_or(ApiError::MissingInput("parsed document"))?;
        if machine_index >= document.machines.len() {
            return Err(SessionError::MachineIndexOutOfRange {
                index: machine_index,
                count: document.machines.len(),
            });
        }
        Ok((file, document))
    }

    /// Issue one generation request, single-shot or refined.
    ///
    /// The caller commits the returned result, replacing any previous
    /// one; results never accumulate.
    pub async fn generate(
        &mut self,
        file: Option<&SourceFile>,
        document: Option<&ParsedDocument>,
        machine_index: usize,
        options: GenerateOptions,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, SessionError> {
        let _guard = InFlightGuard::acquire(&mut self.generating, "generation")?;
        let (file, _) = Self::preflight(file, document, machine_index)?;
        let request = options.request(machine_index);

        let backend = Arc::clone(&self.backend);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = backend.generate(file, &request) => result,
        };

        outcome.map_err(|e| {
            tracing::warn!(machine_index, error = %e, "generation failed");
            SessionError::from(e)
        })
    }

    /// Resubmit the same payload against the download endpoint.
    ///
    /// The response is a binary artifact, decoded on a separate path
    /// from the JSON results above.
    pub async fn download(
        &mut self,
        file: Option<&SourceFile>,
        document: Option<&ParsedDocument>,
        machine_index: usize,
        cancel: &CancellationToken,
    ) -> Result<Artifact, SessionError> {
        let _guard = InFlightGuard::acquire(&mut self.generating, "generation")?;
        let (file, document) = Self::preflight(file, document, machine_index)?;
        let machine_name = document.machines[machine_index].name.clone();

        let backend = Arc::clone(&self.backend);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = backend.download(file, machine_index) => result,
        };

        let bytes = outcome?;
        Ok(Artifact {
            filename: artifact_filename(&machine_name),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn filename_collapses_whitespace() {
        assert_eq!(artifact_filename("Main Conveyor"), "Main_Conveyor.L5X");
        assert_eq!(artifact_filename("  Infeed   Belt 2 "), "Infeed_Belt_2.L5X");
        assert_eq!(artifact_filename("Palletizer"), "Palletizer.L5X");
    }

    #[test]
    fn options_select_request_shape() {
        let single = GenerateOptions::single_shot().request(1);
        assert!(single.refinement.is_none());

        let refined = GenerateOptions::refined(MaxIterations::Five).request(0);
        assert_eq!(refined.refinement.unwrap().max_iterations.value(), 5);
    }

    #[test]
    fn preflight_requires_both_inputs() {
        let document = lwb_model::ParsedDocument {
            machines: vec![],
            total_machines: 0,
        };
        let err =
            RefinementOrchestrator::preflight(None, Some(&document), 0).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Api(ApiError::MissingInput("source file"))
        ));

        let file = SourceFile::new("a.csv", &b"x"[..]);
        let err = RefinementOrchestrator::preflight(Some(&file), None, 0).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Api(ApiError::MissingInput("parsed document"))
        ));
    }

    #[test]
    fn preflight_bounds_checks_index() {
        let file = SourceFile::new("a.csv", &b"x"[..]);
        let document = lwb_model::ParsedDocument {
            machines: vec![],
            total_machines: 0,
        };
        let err =
            RefinementOrchestrator::preflight(Some(&file), Some(&document), 0).unwrap_err();
        assert!(matches!(
            err,
            SessionError::MachineIndexOutOfRange { index: 0, count: 0 }
        ));
    }

    struct StallingBackend;

    #[async_trait::async_trait]
    impl Backend for StallingBackend {
        async fn parse(
            &self,
            _file: &SourceFile,
        ) -> Result<lwb_client::ParsedUpload, ApiError> {
            unreachable!()
        }
        async fn generate(
            &self,
            _file: &SourceFile,
            _request: &GenerateRequest,
        ) -> Result<GenerationResult, ApiError> {
            std::future::pending().await
        }
        async fn download(
            &self,
            _file: &SourceFile,
            _machine_index: usize,
        ) -> Result<Bytes, ApiError> {
            unreachable!()
        }
        async fn ask(
            &self,
            _request: &lwb_client::AskRequest,
        ) -> Result<lwb_client::AskResponse, ApiError> {
            unreachable!()
        }
        async fn ask_stream(
            &self,
            _query: &str,
            _n_examples: usize,
        ) -> Result<lwb_client::EventStream, ApiError> {
            unreachable!()
        }
        async fn health(&self) -> Result<bool, ApiError> {
            unreachable!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_generate_releases_the_guard() {
        let mut orchestrator = RefinementOrchestrator::new(Arc::new(StallingBackend));
        let file = SourceFile::new("a.csv", &b"x"[..]);
        let document = lwb_model::ParsedDocument {
            machines: vec![lwb_model::Machine {
                name: "Press".to_string(),
                steps: vec![],
            }],
            total_machines: 1,
        };
        let cancel = CancellationToken::new();

        // Abandon the first attempt at the await point.
        let attempt = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            orchestrator.generate(
                Some(&file),
                Some(&document),
                0,
                GenerateOptions::single_shot(),
                &cancel,
            ),
        )
        .await;
        assert!(attempt.is_err(), "backend never resolves");
        assert!(!orchestrator.is_generating());

        // The retry must reach the select again, not bounce off Busy.
        cancel.cancel();
        let err = orchestrator
            .generate(
                Some(&file),
                Some(&document),
                0,
                GenerateOptions::single_shot(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::Cancelled)));
    }
}
