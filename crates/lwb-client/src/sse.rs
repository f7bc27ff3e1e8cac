//! Server-sent event decoding
//!
//! The assistant stream arrives as `text/event-stream`: frames separated
//! by a blank line, payload carried on `data:` lines, one JSON event per
//! frame. The decoder is incremental: network chunks can split a frame
//! (or a UTF-8 JSON payload) anywhere and events are still emitted whole
//! and in order.

use crate::api::EventStream;
use crate::error::ApiError;
use bytes::{Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};
use lwb_model::StreamEvent;
use std::collections::VecDeque;
use std::pin::Pin;

/// Incremental SSE frame decoder.
///
/// Buffers raw bytes and converts to text only once a frame is complete,
/// so a chunk boundary inside a multibyte character cannot corrupt the
/// payload.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: BytesMut,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk; returns every event completed by it.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, ApiError>> {
        // CR is ASCII and never occurs inside a multibyte sequence, so
        // dropping it at the byte level normalizes CRLF frames even when
        // a chunk boundary splits the pair.
        self.buf.extend(chunk.iter().filter(|&&b| b != b'\r'));

        let mut events = Vec::new();
        while let Some(boundary) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let frame = self.buf.split_to(boundary + 2);
            let frame = String::from_utf8_lossy(&frame);
            if let Some(result) = decode_frame(&frame) {
                events.push(result);
            }
        }
        events
    }
}

/// Decode one complete frame; `None` for comment/empty frames.
fn decode_frame(frame: &str) -> Option<Result<StreamEvent, ApiError>> {
    let mut payload = String::new();
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            if !payload.is_empty() {
                payload.push('\n');
            }
            payload.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if payload.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str::<StreamEvent>(&payload)
            .map_err(|e| ApiError::MalformedEvent(format!("{e}: {payload}"))),
    )
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<StreamEvent, ApiError>>,
    finished: bool,
}

/// Adapt a raw byte stream into an ordered [`StreamEvent`] stream.
///
/// A transport error ends the stream after being yielded once.
pub(crate) fn decode_events<S, E>(body: S) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.pending.extend(state.decoder.feed(&chunk)),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(ApiError::Transport(e.to_string())), state));
                }
                None => return None,
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn frame(json: &str) -> String {
        format!("data: {json}\n\n")
    }

    #[test]
    fn whole_frames_decode_in_order() {
        let mut dec = SseDecoder::new();
        let input = format!(
            "{}{}{}",
            frame(r#"{"type": "status", "message": "Thinking..."}"#),
            frame(r#"{"type": "content", "text": "ab"}"#),
            frame(r#"{"type": "done"}"#),
        );
        let events: Vec<_> = dec.feed(input.as_bytes()).into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Status {
                    message: "Thinking...".to_string()
                },
                StreamEvent::Content {
                    text: "ab".to_string()
                },
                StreamEvent::Done,
            ]
        );
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut dec = SseDecoder::new();
        let whole = frame(r#"{"type": "content", "text": "hello world"}"#);
        let (a, b) = whole.split_at(17); // splits inside the JSON payload

        assert!(dec.feed(a.as_bytes()).is_empty());
        let events = dec.feed(b.as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Content {
                text: "hello world".to_string()
            }
        );
    }

    #[test]
    fn multibyte_character_split_across_chunks_stays_intact() {
        let mut dec = SseDecoder::new();
        let whole = frame(r#"{"type": "content", "text": "réglage"}"#);
        // Split between the two bytes of 'é'.
        let split = whole.find('é').unwrap() + 1;
        let bytes = whole.as_bytes();

        assert!(dec.feed(&bytes[..split]).is_empty());
        let events = dec.feed(&bytes[split..]);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Content {
                text: "réglage".to_string()
            }
        );
    }

    #[test]
    fn crlf_frames_are_normalized() {
        let mut dec = SseDecoder::new();
        let input = "data: {\"type\": \"done\"}\r\n\r\n";
        let events = dec.feed(input.as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::Done);
    }

    #[test]
    fn comment_frames_are_skipped() {
        let mut dec = SseDecoder::new();
        let input = ": keep-alive\n\ndata: {\"type\": \"done\"}\n\n";
        let events = dec.feed(input.as_bytes());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn malformed_payload_is_surfaced_not_dropped() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: {not json}\n\n");
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Err(ApiError::MalformedEvent(_))
        ));
    }

    #[tokio::test]
    async fn decode_events_preserves_order_across_chunks() {
        let chunks: Vec<Result<Bytes, Infallible>> = vec![
            Ok(Bytes::from(frame(r#"{"type": "content", "text": "ab"}"#))),
            Ok(Bytes::from(
                "data: {\"type\": \"content\",".to_string(),
            )),
            Ok(Bytes::from(" \"text\": \"cd\"}\n\ndata: {\"type\": \"done\"}\n\n".to_string())),
        ];
        let mut stream = decode_events(futures::stream::iter(chunks));

        let mut texts = Vec::new();
        while let Some(event) = stream.next().await {
            match event.unwrap() {
                StreamEvent::Content { text } => texts.push(text),
                StreamEvent::Done => break,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(texts, vec!["ab".to_string(), "cd".to_string()]);
    }
}
