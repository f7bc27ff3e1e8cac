//! Streaming assistant session
//!
//! A per-query, single-shot, cancellable event-stream consumer. Each
//! query is one session: the transcript gains a user message and an
//! unsealed placeholder, one connection is opened, events are applied
//! strictly in receipt order, and exactly one terminal branch fires:
//! `done` seals the placeholder, anything else rolls the pair back.
//!
//! States: `Idle → Sent → Streaming → {Done | Errored} → Idle`.

use crate::error::SessionError;
use futures::StreamExt;
use lwb_client::{ApiError, AskRequest, Backend, EventStream};
use lwb_model::{CodeExample, StreamEvent, Transcript};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session active; a new query may be submitted
    Idle,
    /// Connection opened, no event received yet
    Sent,
    /// Events are being applied
    Streaming,
}

enum Pulled {
    Cancelled,
    Item(Option<Result<StreamEvent, ApiError>>),
}

/// One streaming Q&A session at a time against the knowledge base
pub struct StreamingAssistantSession {
    backend: Arc<dyn Backend>,
    transcript: Transcript,
    state: SessionState,
    /// Transient progress indicator; never part of message content
    status: Option<String>,
    content_buf: String,
    examples_buf: Vec<CodeExample>,
    connection: Option<EventStream>,
}

impl StreamingAssistantSession {
    /// Session manager over the given backend
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            transcript: Transcript::new(),
            state: SessionState::Idle,
            status: None,
            content_buf: String::new(),
            examples_buf: Vec::new(),
            connection: None,
        }
    }

    /// The message history
    #[inline]
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a session is active (guard for new submissions)
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != SessionState::Idle
    }

    /// Transient progress text, if the server sent one
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Answer text accumulated so far for the open exchange
    #[inline]
    #[must_use]
    pub fn partial_answer(&self) -> &str {
        &self.content_buf
    }

    /// Submit a query: append the user message and placeholder as one
    /// transaction, then open the event stream.
    ///
    /// Rejected with `Busy` while a session is active; the guard, not
    /// the server, prevents a second connection.
    pub async fn submit(
        &mut self,
        query: &str,
        n_examples: usize,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        if self.is_active() {
            return Err(SessionError::Busy("assistant session"));
        }
        self.transcript.begin_exchange(query)?;

        let backend = Arc::clone(&self.backend);
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = backend.ask_stream(query, n_examples) => result,
        };

        match opened {
            Ok(connection) => {
                self.connection = Some(connection);
                self.state = SessionState::Sent;
                tracing::debug!(n_examples, "assistant session opened");
                Ok(())
            }
            Err(error) => {
                // Connection never opened; undo the optimistic append.
                self.transcript.rollback()?;
                self.state = SessionState::Idle;
                Err(error.into())
            }
        }
    }

    /// Consume the stream to its terminal event.
    ///
    /// On `done` the buffers are sealed into the placeholder; on a
    /// structured error or transport failure the exchange is rolled back
    /// and the error returned. Cancellation closes the connection
    /// immediately and rolls back; no buffer is touched afterwards.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), SessionError> {
        loop {
            let pulled = {
                let connection = self.connection.as_mut().ok_or(SessionError::NotActive)?;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Pulled::Cancelled,
                    item = connection.next() => Pulled::Item(item),
                }
            };

            match pulled {
                Pulled::Cancelled => return self.fail(ApiError::Cancelled),
                Pulled::Item(None) => {
                    // Stream ended without a terminal event.
                    return self.fail(ApiError::Transport(
                        "stream ended before completion".to_string(),
                    ));
                }
                Pulled::Item(Some(Err(error))) => return self.fail(error),
                Pulled::Item(Some(Ok(event))) => {
                    if self.apply(event)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Submit and consume in one call
    pub async fn ask(
        &mut self,
        query: &str,
        n_examples: usize,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.submit(query, n_examples, cancel).await?;
        self.run(cancel).await
    }

    /// Non-streaming fallback: one request, sealed transcript exchange.
    pub async fn ask_once(
        &mut self,
        request: &AskRequest,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        if self.is_active() {
            return Err(SessionError::Busy("assistant session"));
        }
        self.transcript.begin_exchange(&request.query)?;

        let backend = Arc::clone(&self.backend);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = backend.ask(request) => result,
        };

        match outcome {
            Ok(response) => {
                self.transcript
                    .seal(response.answer, response.code_examples)?;
                Ok(())
            }
            Err(error) => {
                self.transcript.rollback()?;
                Err(error.into())
            }
        }
    }

    /// Tear down an active session without sealing anything.
    ///
    /// Closes the connection and rolls the open exchange back; a no-op
    /// when idle.
    pub fn close(&mut self) {
        if self.is_active() {
            let _ = self.fail(ApiError::Cancelled);
        }
    }

    /// Apply one event in receipt order. Returns `true` when the stream
    /// sealed. The match is exhaustive: a new event kind is a checked
    /// change here.
    fn apply(&mut self, event: StreamEvent) -> Result<bool, SessionError> {
        match event {
            StreamEvent::Status { message } => {
                self.status = Some(message);
                self.state = SessionState::Streaming;
                Ok(false)
            }
            StreamEvent::Example { data } => {
                // Append-only: retrieval order is preserved exactly.
                self.examples_buf.push(data);
                self.state = SessionState::Streaming;
                Ok(false)
            }
            StreamEvent::Content { text } => {
                self.content_buf.push_str(&text);
                self.state = SessionState::Streaming;
                Ok(false)
            }
            StreamEvent::Done => {
                // The only path that finalizes a message: both buffers
                // move into the placeholder atomically.
                let content = std::mem::take(&mut self.content_buf);
                let examples = std::mem::take(&mut self.examples_buf);
                self.transcript.seal(content, examples)?;
                self.finish();
                tracing::debug!("assistant session sealed");
                Ok(true)
            }
            StreamEvent::Error { message } => {
                self.fail(ApiError::Stream(message)).map(|()| true)
            }
        }
    }

    /// Terminal failure branch: full rollback of the optimistic pair,
    /// then release the guard and close the connection exactly once.
    fn fail(&mut self, error: ApiError) -> Result<(), SessionError> {
        tracing::warn!(error = %error, "assistant session failed; rolling back");
        if self.transcript.exchange_open() {
            self.transcript.rollback()?;
        }
        self.finish();
        Err(error.into())
    }

    /// Shared terminal cleanup; `Option::take` makes double-close
    /// impossible.
    fn finish(&mut self) {
        self.content_buf.clear();
        self.examples_buf.clear();
        self.status = None;
        self.state = SessionState::Idle;
        drop(self.connection.take());
    }
}

impl Drop for StreamingAssistantSession {
    fn drop(&mut self) {
        // Teardown mid-stream: the connection closes with the session.
        drop(self.connection.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lwb_test_utils::StubBackend;
    use pretty_assertions::assert_eq;

    fn sent_session() -> StreamingAssistantSession {
        let mut session = StreamingAssistantSession::new(Arc::new(StubBackend::new()));
        session.transcript.begin_exchange("q").unwrap();
        session.state = SessionState::Sent;
        session
    }

    #[test]
    fn status_event_marks_the_session_streaming() {
        let mut session = sent_session();
        session
            .apply(StreamEvent::Status {
                message: "Searching examples...".to_string(),
            })
            .unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.status(), Some("Searching examples..."));
    }

    #[test]
    fn content_event_marks_the_session_streaming() {
        let mut session = sent_session();
        session
            .apply(StreamEvent::Content {
                text: "ab".to_string(),
            })
            .unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.partial_answer(), "ab");
    }
}
