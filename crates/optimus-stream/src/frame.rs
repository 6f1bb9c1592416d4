//! Frame decoding for the agent event stream.
//!
//! The response body is a sequence of text records separated by a blank line.
//! Chunks arrive with arbitrary boundaries, so raw bytes are buffered until a
//! delimiter is seen. Delimiters are pure ASCII and can never occur inside a
//! multi-byte UTF-8 sequence, which means a record is only decoded once all of
//! its bytes are present and a character split across two chunks survives.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt as _};
use tracing::debug;

/// Field prefix of payload-carrying lines.
const DATA_PREFIX: &str = "data:";

/// One complete record from the stream, prior to JSON decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    text: String,
}

impl Record {
    /// Create a record from its raw text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Raw text of the record.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Payloads carried by `data:` lines; other lines are ignored.
    pub fn payloads(&self) -> impl Iterator<Item = &str> {
        self.text.lines().filter_map(|line| {
            let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim();
            (!payload.is_empty()).then_some(payload)
        })
    }

    /// The first payload of the record, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.payloads().next()
    }
}

/// Incremental splitter from byte chunks into [`Record`]s.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    scanned: usize,
}

impl FrameDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every record it completes.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Record> {
        self.buf.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some((idx, delim_len)) = find_delimiter(&self.buf, self.scanned) {
            let text = String::from_utf8_lossy(&self.buf[..idx]).into_owned();
            self.buf.drain(..idx + delim_len);
            self.scanned = 0;
            if !text.trim().is_empty() {
                records.push(Record { text });
            }
        }
        // A delimiter may straddle the next chunk; rescan the tail.
        self.scanned = self.buf.len().saturating_sub(3);
        records
    }

    /// Bytes held back waiting for a delimiter.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// End of transfer. A trailing record without its terminator is not valid
    /// and is discarded; returns the number of bytes dropped.
    pub fn finish(self) -> usize {
        let dropped = self.buf.len();
        if dropped > 0 {
            debug!(bytes = dropped, "discarding unterminated trailing record");
        }
        dropped
    }
}

/// Locate the first blank-line delimiter at or after `from`.
///
/// A delimiter is two consecutive line terminators, each either LF or CRLF.
/// Returns the index where it starts and its length.
fn find_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i < buf.len() {
        if buf[i] == b'\n' {
            let rest = &buf[i + 1..];
            let second = if rest.starts_with(b"\n") {
                Some(1)
            } else if rest.starts_with(b"\r\n") {
                Some(2)
            } else {
                None
            };
            if let Some(second) = second {
                let start = if i > 0 && buf[i - 1] == b'\r' { i - 1 } else { i };
                return Some((start, i + 1 + second - start));
            }
        }
        i += 1;
    }
    None
}

/// Turn a live byte stream into a lazy stream of records.
///
/// The returned stream ends when the transfer ends and is not restartable.
/// A transfer error is forwarded once and then the stream stops.
pub fn records<S, B, E>(bytes: S) -> impl Stream<Item = Result<Record, E>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    struct State<S> {
        bytes: S,
        decoder: Option<FrameDecoder>,
        pending: VecDeque<Record>,
    }

    stream::try_unfold(
        State {
            bytes,
            decoder: Some(FrameDecoder::new()),
            pending: VecDeque::new(),
        },
        |mut state| async move {
            loop {
                if let Some(record) = state.pending.pop_front() {
                    return Ok(Some((record, state)));
                }
                let Some(decoder) = state.decoder.as_mut() else {
                    return Ok(None);
                };

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        state.pending.extend(decoder.push_chunk(chunk.as_ref()));
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        if let Some(decoder) = state.decoder.take() {
                            decoder.finish();
                        }
                    }
                }
            }
        },
    )
}
