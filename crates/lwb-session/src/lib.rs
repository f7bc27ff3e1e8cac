//! Client-side orchestration for the logic workbench.
//!
//! This crate holds the stateful coordinators that sit between a frontend
//! and the [`lwb_client`] transport:
//!
//! - [`UploadCoordinator`]: pre-flight checks, one in-flight upload, parse
//!   commit.
//! - [`RefinementOrchestrator`]: single-shot or server-refined generation
//!   and artifact download.
//! - [`StreamingAssistantSession`]: a cancellable event-stream consumer
//!   with a transactional transcript.
//! - [`Workbench`]: the linear stage machine tying the above together.
//!
//! Every network-touching operation takes a [`CancellationToken`] and
//! holds a busy guard that is released on every exit path, so a caller
//! can never start a second copy of an operation that is still running.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod assistant;
pub mod connectivity;
pub mod error;
pub mod generate;
mod guard;
pub mod upload;
pub mod workflow;

pub use assistant::{SessionState, StreamingAssistantSession};
pub use connectivity::ConnectivityMonitor;
pub use error::SessionError;
pub use generate::{artifact_filename, Artifact, GenerateOptions, RefinementOrchestrator};
pub use upload::{CommittedUpload, UploadCoordinator};
pub use workflow::{Stage, Workbench};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
