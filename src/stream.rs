//! Streaming token relay: turn a chunked SSE response body into an ordered
//! stream of text tokens.
//!
//! ## Framing
//!
//! The upstream body is a sequence of lines:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//! data: [DONE]
//! ```
//!
//! Network reads split these lines anywhere, including inside a multi-byte
//! UTF-8 character. [`TokenRelay`] keeps the unterminated tail in a byte
//! buffer and only decodes complete lines.
//!
//! ## States
//!
//! *Accumulating* until a `data: [DONE]` line or the end of the body, then
//! *Done*. Lines without the `data:` prefix and payloads that fail to parse
//! are dropped silently. A transport error ends the relay with one error item.
//!
//! ## Cancellation
//!
//! [`relay_stream`] owns the upstream, so dropping the returned stream drops
//! the HTTP body. [`forward`] pumps tokens into an `mpsc` channel and stops
//! reading as soon as the receiver goes away.

use crate::error::PdfToolsError;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

/// A boxed stream of relayed token bytes.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<Bytes, PdfToolsError>> + Send>>;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// What one complete line means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Token(String),
    Done,
    /// Not an event, a keep-alive, an empty delta or unparseable JSON.
    Ignored,
}

/// Classify one complete line (without its terminator).
pub fn parse_line(line: &str) -> StreamFrame {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return StreamFrame::Ignored;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return StreamFrame::Done;
    }
    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|t| !t.is_empty())
            .map_or(StreamFrame::Ignored, StreamFrame::Token),
        Err(_) => StreamFrame::Ignored,
    }
}

/// Incremental line reassembly.
#[derive(Debug, Default)]
pub struct TokenRelay {
    buffer: Vec<u8>,
    done: bool,
}

impl TokenRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once the sentinel or the end of input was seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Append a network read and return the tokens completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(bytes);

        let mut tokens = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.take_line(&line[..line.len() - 1], &mut tokens) {
                self.buffer.clear();
                break;
            }
        }
        tokens
    }

    /// Signal end of input; a trailing unterminated line is still processed.
    pub fn finish(&mut self) -> Vec<String> {
        let mut tokens = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.take_line(&line, &mut tokens);
        }
        self.done = true;
        self.buffer.clear();
        tokens
    }

    /// Returns `true` when the line ended the stream.
    fn take_line(&mut self, line: &[u8], tokens: &mut Vec<String>) -> bool {
        match parse_line(&String::from_utf8_lossy(line)) {
            StreamFrame::Token(t) => tokens.push(t),
            StreamFrame::Done => {
                self.done = true;
                return true;
            }
            StreamFrame::Ignored => {}
        }
        false
    }
}

struct RelayState<S> {
    upstream: Option<Pin<Box<S>>>,
    relay: TokenRelay,
    pending: VecDeque<String>,
}

/// Relay an SSE body as a stream of token bytes.
///
/// The output ends after `[DONE]`, after the upstream ends, or after the
/// first upstream error (yielded as [`PdfToolsError::StreamTransport`]).
pub fn relay_stream<S, E>(upstream: S) -> TokenStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display,
{
    let state = RelayState {
        upstream: Some(Box::pin(upstream)),
        relay: TokenRelay::new(),
        pending: VecDeque::new(),
    };

    let s = stream::unfold(state, |mut st| async move {
        loop {
            if let Some(token) = st.pending.pop_front() {
                return Some((Ok(Bytes::from(token)), st));
            }
            let upstream = st.upstream.as_mut()?;
            match upstream.next().await {
                Some(Ok(chunk)) => {
                    st.pending.extend(st.relay.push(&chunk));
                    if st.relay.is_done() {
                        debug!("relay: stream complete");
                        st.upstream = None;
                    }
                }
                Some(Err(e)) => {
                    st.upstream = None;
                    st.pending.clear();
                    return Some((Err(PdfToolsError::StreamTransport(e.to_string())), st));
                }
                None => {
                    st.pending.extend(st.relay.finish());
                    st.upstream = None;
                }
            }
        }
    });
    Box::pin(s)
}

/// Pump `tokens` into `tx` until the stream ends or the receiver is dropped.
///
/// Returns the number of items delivered.
pub async fn forward(mut tokens: TokenStream, tx: mpsc::Sender<Result<Bytes, PdfToolsError>>) -> usize {
    let mut delivered = 0;
    loop {
        let item = tokio::select! {
            _ = tx.closed() => {
                debug!("relay: receiver gone, releasing upstream");
                break;
            }
            item = tokens.next() => item,
        };
        let Some(item) = item else { break };
        let is_err = item.is_err();
        if tx.send(item).await.is_err() {
            break;
        }
        delivered += 1;
        if is_err {
            break;
        }
    }
    delivered
}

/// Drain a token stream into one string.
pub async fn collect_text(mut tokens: TokenStream) -> Result<String, PdfToolsError> {
    let mut out = Vec::new();
    while let Some(item) = tokens.next().await {
        out.extend_from_slice(&item?);
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}
