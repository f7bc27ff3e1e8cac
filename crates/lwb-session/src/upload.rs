//! Upload coordination
//!
//! Validates and submits one logic sheet. File-type and size checks run
//! before any network traffic; the `uploading` guard admits one request
//! at a time and is released on every exit path, including cancellation.

use crate::error::SessionError;
use crate::guard::InFlightGuard;
use lwb_client::{ApiError, Backend, SourceFile, MAX_UPLOAD_BYTES};
use lwb_model::ParsedDocument;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The accepted upload format
const ACCEPTED_EXTENSION: &str = "csv";

/// A successful upload, ready for the workflow to commit.
///
/// Carries the raw file back out: later stages resubmit these exact
/// bytes, never the derived structure.
#[derive(Debug, Clone)]
pub struct CommittedUpload {
    /// The file as uploaded, retained verbatim
    pub file: SourceFile,
    /// Server's summary message
    pub message: String,
    /// Parsed structural summary
    pub document: ParsedDocument,
}

/// Validates and submits source documents
pub struct UploadCoordinator {
    backend: Arc<dyn Backend>,
    uploading: bool,
}

impl UploadCoordinator {
    /// Coordinator over the given backend
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            uploading: false,
        }
    }

    /// Whether an upload is in flight
    #[inline]
    #[must_use]
    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    /// Validate and submit one file.
    ///
    /// Exactly one multipart request is issued; pre-flight rejections
    /// (`InvalidFileType`) never touch the network.
    pub async fn submit(
        &mut self,
        file: SourceFile,
        cancel: &CancellationToken,
    ) -> Result<CommittedUpload, SessionError> {
        let _guard = InFlightGuard::acquire(&mut self.uploading, "upload")?;
        if !file.has_extension(ACCEPTED_EXTENSION) {
            return Err(ApiError::InvalidFileType(format!(
                "'{}' is not a .csv logic sheet",
                file.filename
            ))
            .into());
        }
        if file.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::InvalidFileType(format!(
                "'{}' exceeds the {} MiB upload limit",
                file.filename,
                MAX_UPLOAD_BYTES / (1024 * 1024)
            ))
            .into());
        }

        let backend = Arc::clone(&self.backend);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = backend.parse(&file) => result,
        };

        let upload = outcome.map_err(|e| {
            tracing::warn!(file = %file.filename, error = %e, "upload failed");
            SessionError::from(e)
        })?;

        // The backend is authoritative, but a document that violates its
        // own invariants would corrupt every later stage.
        upload.document.validate()?;

        Ok(CommittedUpload {
            file,
            message: upload.message,
            document: upload.document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverBackend;

    #[async_trait::async_trait]
    impl Backend for NeverBackend {
        async fn parse(
            &self,
            _file: &SourceFile,
        ) -> Result<lwb_client::ParsedUpload, ApiError> {
            panic!("pre-flight rejection must not reach the network");
        }
        async fn generate(
            &self,
            _file: &SourceFile,
            _request: &lwb_client::GenerateRequest,
        ) -> Result<lwb_model::GenerationResult, ApiError> {
            unreachable!()
        }
        async fn download(
            &self,
            _file: &SourceFile,
            _machine_index: usize,
        ) -> Result<bytes::Bytes, ApiError> {
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

    #[tokio::test]
    async fn wrong_extension_rejected_before_network() {
        let mut coordinator = UploadCoordinator::new(Arc::new(NeverBackend));
        let file = SourceFile::new("logic.xlsx", &b"not a csv"[..]);

        let err = coordinator
            .submit(file, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Api(ApiError::InvalidFileType(_))
        ));
        assert!(!coordinator.is_uploading());
    }

    #[tokio::test]
    async fn oversized_file_rejected_before_network() {
        let mut coordinator = UploadCoordinator::new(Arc::new(NeverBackend));
        let file = SourceFile::new("big.csv", vec![b'x'; MAX_UPLOAD_BYTES + 1]);

        let err = coordinator
            .submit(file, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Api(ApiError::InvalidFileType(_))
        ));
    }

    struct StallingBackend;

    #[async_trait::async_trait]
    impl Backend for StallingBackend {
        async fn parse(
            &self,
            _file: &SourceFile,
        ) -> Result<lwb_client::ParsedUpload, ApiError> {
            std::future::pending().await
        }
        async fn generate(
            &self,
            _file: &SourceFile,
            _request: &lwb_client::GenerateRequest,
        ) -> Result<lwb_model::GenerationResult, ApiError> {
            unreachable!()
        }
        async fn download(
            &self,
            _file: &SourceFile,
            _machine_index: usize,
        ) -> Result<bytes::Bytes, ApiError> {
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
    async fn abandoned_submit_releases_the_guard() {
        let mut coordinator = UploadCoordinator::new(Arc::new(StallingBackend));
        let file = SourceFile::new("logic.csv", &b"a,b,c"[..]);
        let cancel = CancellationToken::new();

        // Abandon the first attempt at the await point.
        let attempt = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            coordinator.submit(file.clone(), &cancel),
        )
        .await;
        assert!(attempt.is_err(), "backend never resolves");
        assert!(!coordinator.is_uploading());

        // The retry must reach the select again, not bounce off Busy.
        cancel.cancel();
        let err = coordinator.submit(file, &cancel).await.unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::Cancelled)));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_without_commit() {
        let mut coordinator = UploadCoordinator::new(Arc::new(NeverBackend));
        let file = SourceFile::new("logic.csv", &b"a,b,c"[..]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = coordinator.submit(file, &cancel).await.unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::Cancelled)));
        assert!(!coordinator.is_uploading());
    }
}
