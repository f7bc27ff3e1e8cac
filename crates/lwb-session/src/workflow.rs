//! Linear workflow over upload, review, configure and download
//!
//! The workbench owns the coordinators and the artifacts they produce,
//! and enforces the stage order: each stage is reachable only when the
//! prior stage produced its artifact, and going back discards the
//! artifacts of every stage after the target.

use crate::error::SessionError;
use crate::generate::{Artifact, GenerateOptions, RefinementOrchestrator};
use crate::upload::UploadCoordinator;
use lwb_client::{Backend, SourceFile};
use lwb_model::{GenerationResult, ParsedDocument};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Workflow stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Pick and parse a source file
    Upload,
    /// Inspect the parsed machines
    Review,
    /// Choose a machine and refinement settings, generate code
    Configure,
    /// Fetch the generated artifact
    Download,
}

impl Stage {
    /// 1-based position for display
    #[inline]
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Stage::Upload => 1,
            Stage::Review => 2,
            Stage::Configure => 3,
            Stage::Download => 4,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Upload => "upload",
            Stage::Review => "review",
            Stage::Configure => "configure",
            Stage::Download => "download",
        };
        f.write_str(name)
    }
}

/// Stage-gated orchestration facade
pub struct Workbench {
    stage: Stage,
    source: Option<SourceFile>,
    upload_message: Option<String>,
    document: Option<ParsedDocument>,
    generation: Option<GenerationResult>,
    uploader: UploadCoordinator,
    generator: RefinementOrchestrator,
    cancel: CancellationToken,
}

impl Workbench {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            stage: Stage::Upload,
            source: None,
            upload_message: None,
            document: None,
            generation: None,
            uploader: UploadCoordinator::new(Arc::clone(&backend)),
            generator: RefinementOrchestrator::new(backend),
            cancel: CancellationToken::new(),
        }
    }

    /// Current stage
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Parsed document, once the upload stage has completed
    #[inline]
    #[must_use]
    pub fn document(&self) -> Option<&ParsedDocument> {
        self.document.as_ref()
    }

    /// Server confirmation for the committed upload
    #[inline]
    #[must_use]
    pub fn upload_message(&self) -> Option<&str> {
        self.upload_message.as_deref()
    }

    /// Latest generation result, if any
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Option<&GenerationResult> {
        self.generation.as_ref()
    }

    /// Token governing the in-flight operation, for external cancel
    #[inline]
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn require(&self, stage: Stage) -> Result<(), SessionError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(SessionError::StageViolation { stage: self.stage })
        }
    }

    /// Upload stage: parse the file and, on success, advance to review.
    pub async fn upload(&mut self, file: SourceFile) -> Result<(), SessionError> {
        self.require(Stage::Upload)?;
        let cancel = self.cancel.child_token();
        let committed = self.uploader.submit(file, &cancel).await?;
        tracing::info!(
            machines = committed.document.total_machines,
            "upload committed, advancing to review"
        );
        self.source = Some(committed.file);
        self.upload_message = Some(committed.message);
        self.document = Some(committed.document);
        self.stage = Stage::Review;
        Ok(())
    }

    /// Review stage exit: advance once the parse has been inspected.
    pub fn proceed_to_configure(&mut self) -> Result<(), SessionError> {
        self.require(Stage::Review)?;
        if self.document.is_none() {
            return Err(SessionError::StageViolation { stage: self.stage });
        }
        self.stage = Stage::Configure;
        Ok(())
    }

    /// Configure stage: generate code for one machine. A repeat call
    /// replaces the previous result; the stage does not advance until
    /// the operator proceeds.
    pub async fn generate(
        &mut self,
        machine_index: usize,
        options: GenerateOptions,
    ) -> Result<(), SessionError> {
        self.require(Stage::Configure)?;
        let cancel = self.cancel.child_token();
        let result = self
            .generator
            .generate(
                self.source.as_ref(),
                self.document.as_ref(),
                machine_index,
                options,
                &cancel,
            )
            .await?;
        self.generation = Some(result);
        Ok(())
    }

    /// Configure stage exit: requires a generation result.
    pub fn proceed_to_download(&mut self) -> Result<(), SessionError> {
        self.require(Stage::Configure)?;
        if self.generation.is_none() {
            return Err(SessionError::StageViolation { stage: self.stage });
        }
        self.stage = Stage::Download;
        Ok(())
    }

    /// Download stage: fetch the artifact for one machine.
    pub async fn download(&mut self, machine_index: usize) -> Result<Artifact, SessionError> {
        self.require(Stage::Download)?;
        let cancel = self.cancel.child_token();
        let artifact = self
            .generator
            .download(self.source.as_ref(), self.document.as_ref(), machine_index, &cancel)
            .await?;
        Ok(artifact)
    }

    /// Return to an earlier stage, discarding artifacts produced after
    /// it, and cancel anything in flight.
    ///
    /// Going back to review keeps the document but drops the generation
    /// result; going back to upload clears everything.
    pub fn back_to(&mut self, target: Stage) -> Result<(), SessionError> {
        if target >= self.stage {
            return Err(SessionError::StageViolation { stage: self.stage });
        }
        self.cancel.cancel();
        self.cancel = CancellationToken::new();

        if target <= Stage::Review {
            self.generation = None;
        }
        if target == Stage::Upload {
            self.source = None;
            self.upload_message = None;
            self.document = None;
        }
        tracing::debug!(stage = %target, "moved back");
        self.stage = target;
        Ok(())
    }

}
