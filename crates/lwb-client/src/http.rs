//! HTTP backend
//!
//! Production implementation of [`Backend`] over reqwest. Each method is
//! one request against the generation service; JSON and binary bodies are
//! decoded on strictly separate paths.

use crate::api::{
    AskRequest, AskResponse, Backend, EventStream, GenerateRequest, ParsedUpload, SourceFile,
};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::sse;
use bytes::Bytes;
use lwb_model::{GenerationResult, ParsedDocument};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// Wire shape of the upload wrapper
#[derive(Debug, Deserialize)]
struct UploadResponseWire {
    #[allow(dead_code)]
    status: String,
    message: String,
    parsed_data: Option<ParsedDocument>,
}

/// Reqwest-based backend client
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    /// Build a client for the configured backend
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// The active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn multipart(file: &SourceFile) -> Result<Form, ApiError> {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.filename.clone())
            .mime_str("text/csv")?;
        Ok(Form::new().part("file", part))
    }

    /// Turn a non-success response into `ServerRejected`, preferring the
    /// FastAPI `{"detail": ...}` body over raw text.
    async fn reject(response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        #[derive(Deserialize)]
        struct Detail {
            detail: String,
        }
        let detail = serde_json::from_str::<Detail>(&body)
            .map(|d| d.detail)
            .unwrap_or(body);

        ApiError::ServerRejected { status, detail }
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn parse(&self, file: &SourceFile) -> Result<ParsedUpload, ApiError> {
        let response = self
            .http
            .post(self.config.api_url("/upload"))
            .multipart(Self::multipart(file)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        let wire: UploadResponseWire = response.json().await?;
        let document = wire
            .parsed_data
            .ok_or_else(|| ApiError::Transport("upload response carried no document".to_string()))?;

        tracing::info!(
            machines = document.total_machines,
            "parsed logic sheet {}",
            file.filename
        );
        Ok(ParsedUpload {
            message: wire.message,
            document,
        })
    }

    async fn generate(
        &self,
        file: &SourceFile,
        request: &GenerateRequest,
    ) -> Result<GenerationResult, ApiError> {
        // One builder, two endpoints: the refinement config alone decides.
        let index = request.machine_index.to_string();
        let builder = match request.refinement {
            Some(config) => {
                let iterations = config.max_iterations.value().to_string();
                self.http
                    .post(self.config.api_url("/generate-refined"))
                    .query(&[
                        ("machine_index", index.as_str()),
                        ("max_iterations", iterations.as_str()),
                    ])
            }
            None => self
                .http
                .post(self.config.api_url("/generate"))
                .query(&[("machine_index", index.as_str())]),
        };

        let response = builder.multipart(Self::multipart(file)?).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        let result: GenerationResult = response.json().await?;
        tracing::info!(
            machine = %result.machine_name,
            chars = result.code_length,
            valid = result.validation.is_valid,
            refined = result.refinement.is_some(),
            "generation completed"
        );
        Ok(result)
    }

    async fn download(&self, file: &SourceFile, machine_index: usize) -> Result<Bytes, ApiError> {
        let response = self
            .http
            .post(self.config.api_url("/generate-download"))
            .query(&[("machine_index", machine_index.to_string().as_str())])
            .multipart(Self::multipart(file)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        // Binary path: the body is the artifact itself, never JSON.
        Ok(response.bytes().await?)
    }

    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ApiError> {
        let response = self
            .http
            .post(self.config.api_url("/ask"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(response.json().await?)
    }

    async fn ask_stream(&self, query: &str, n_examples: usize) -> Result<EventStream, ApiError> {
        let response = self
            .http
            .get(self.config.api_url("/ask-stream"))
            .query(&[
                ("query", query),
                ("n_examples", n_examples.to_string().as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        tracing::debug!(n_examples, "assistant stream opened");
        Ok(sse::decode_events(response.bytes_stream()))
    }

    async fn health(&self) -> Result<bool, ApiError> {
        let response = self
            .http
            .get(self.config.root_url("/health"))
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}
