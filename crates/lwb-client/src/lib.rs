//! LWB Client - backend API boundary
//!
//! Everything the orchestration layer needs to talk to the generation
//! service, and nothing else:
//! - [`Backend`]: the service contract, as a trait so tests run in-process
//! - [`HttpBackend`]: the reqwest implementation (multipart, JSON, SSE)
//! - [`ApiError`]: the failure taxonomy, pre-flight through mid-stream
//! - [`ClientConfig`]: where the service lives and how patient to be
//!
//! # Example
//!
//! ```rust,ignore
//! use lwb_client::{ClientConfig, HttpBackend, Backend, SourceFile};
//!
//! # async fn example() -> Result<(), lwb_client::ApiError> {
//! let backend = HttpBackend::new(ClientConfig::new("http://localhost:8000"))?;
//! let file = SourceFile::new("plant.csv", std::fs::read("plant.csv").unwrap());
//! let upload = backend.parse(&file).await?;
//! println!("{} machines", upload.document.total_machines);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod api;
pub mod config;
pub mod error;
mod http;
mod sse;

pub use api::{
    AskRequest, AskResponse, Backend, EventStream, GenerateRequest, ParsedUpload, SourceFile,
};
pub use config::{ClientConfig, MAX_UPLOAD_BYTES};
pub use error::ApiError;
pub use http::HttpBackend;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
