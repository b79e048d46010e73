//! Cancellable consumption of a streamed response body.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::decode;
use crate::error::QuillError;

/// Shared cancellation flag for one in-flight request.
///
/// Clones observe the same flag. `cancel` is idempotent and safe to call
/// after the request has already finished.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Drain a byte stream, forwarding extracted text deltas as they arrive.
///
/// The cancel token is checked at every fragment boundary, so cancellation
/// latency is bounded by one fragment. Each delta is appended to the
/// aggregate and handed to `on_delta` before the next fragment is touched;
/// callback order is decode order. Fragment boundaries may fall inside a
/// multi-byte UTF-8 sequence; the incomplete bytes are carried to the next
/// fragment rather than decoded piecemeal. An undecoded remainder at end
/// of stream is dropped, never an error.
pub async fn read_stream<S, E>(
    stream: S,
    cancel: &CancelToken,
    mut on_delta: impl FnMut(&str),
) -> Result<String, QuillError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut stream = pin!(stream);
    let mut pending: Vec<u8> = Vec::new();
    let mut buffer = String::new();
    let mut aggregate = String::new();

    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(QuillError::Cancelled);
        }

        let bytes =
            chunk.map_err(|e| QuillError::Request(format!("stream read error: {e}")))?;
        pending.extend_from_slice(&bytes);
        let incoming = take_complete_utf8(&mut pending);

        let (deltas, remainder) = decode::decode_fragment(&buffer, &incoming);
        buffer = remainder;

        for delta in deltas {
            aggregate.push_str(&delta);
            on_delta(&delta);
        }
    }

    if !buffer.trim().is_empty() || !pending.is_empty() {
        tracing::debug!(len = buffer.len() + pending.len(), "dropping undecoded trailing fragment");
    }

    Ok(aggregate)
}

// Decodes as much of `pending` as forms complete UTF-8, leaving an
// unfinished trailing sequence in place for the next fragment. A character
// split across network reads must not be replaced piecemeal.
fn take_complete_utf8(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(text) => {
            let text = text.to_string();
            pending.clear();
            text
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
            pending.drain(..valid);
            text
        }
        // Invalid bytes in the middle: replace them and move on.
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            text
        }
    }
}

/// Single-pass extraction for a response that arrived as one JSON document.
pub fn read_document(body: &str, mut on_delta: impl FnMut(&str)) -> String {
    let mut aggregate = String::new();
    for delta in decode::decode_document(body) {
        aggregate.push_str(&delta);
        on_delta(&delta);
    }
    aggregate
}
