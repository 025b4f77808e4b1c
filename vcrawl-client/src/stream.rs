//! Event-stream decoding for the streamed collaborator endpoints.
//!
//! Link collection and batch crawl answer with a `text/event-stream` body made
//! of frames separated by a blank line. Each frame carries one `data:` line
//! holding a JSON object tagged by `type` (or `kind`). Chunks arrive in
//! arbitrary sizes, so frames are reassembled in a buffer before decoding.

use bytes::Bytes;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

use crate::error::{ClientError, FrameError};
use crate::result::LinkCollection;

const FRAME_DELIMITER: &str = "\n\n";

/// Per-link state reported during a batch crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    #[default]
    Pending,
    Crawling,
    Done,
    Failed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Pending => "pending",
            ProgressStatus::Crawling => "crawling",
            ProgressStatus::Done => "done",
            ProgressStatus::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, ProgressStatus::Done | ProgressStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// 1-based position of the link in the submitted list.
    #[serde(default)]
    pub current: usize,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: ProgressStatus,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Final summary of a batch crawl.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    #[serde(default)]
    pub folder_path: String,
    #[serde(default)]
    pub total_success: usize,
    #[serde(default)]
    pub total_failed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Log { message: String },
    Progress(ProgressEvent),
    Done(LinkCollection),
    Complete(BatchSummary),
    Error { message: String },
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Log { .. } => "log",
            StreamEvent::Progress(_) => "progress",
            StreamEvent::Done(_) => "done",
            StreamEvent::Complete(_) => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// `done`, `complete` and `error` end an operation.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            StreamEvent::Done(_) | StreamEvent::Complete(_) | StreamEvent::Error { .. }
        )
    }
}

/// Decodes one complete frame. Only the first `data:` line is read; `event:`,
/// `id:`, comments and any other lines are ignored.
pub fn parse_frame(frame: &str) -> Result<StreamEvent, FrameError> {
    let payload = frame
        .lines()
        .find_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .ok_or(FrameError::MissingData)?;

    let value: Value = serde_json::from_str(payload)?;
    let tag = value
        .get("type")
        .or_else(|| value.get("kind"))
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingTag)?
        .to_string();

    let message = || {
        value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    match tag.as_str() {
        "log" => Ok(StreamEvent::Log { message: message() }),
        "error" => Ok(StreamEvent::Error { message: message() }),
        "progress" => Ok(StreamEvent::Progress(serde_json::from_value(value)?)),
        "done" => Ok(StreamEvent::Done(serde_json::from_value(value)?)),
        "complete" => Ok(StreamEvent::Complete(serde_json::from_value(value)?)),
        _ => Err(FrameError::UnknownTag(tag)),
    }
}

/// Push-driven frame reassembler.
///
/// Each call to [`FrameDecoder::push`] appends text to the buffer and returns
/// every event whose frame is now complete, in arrival order. A frame that
/// fails to decode is logged and skipped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    skipped: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) -> Vec<StreamEvent> {
        self.buffer.push_str(text);
        // A lone '\r' at the end waits here until its '\n' arrives.
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find(FRAME_DELIMITER) {
            let frame: String = self.buffer.drain(..pos + FRAME_DELIMITER.len()).collect();
            let frame = &frame[..pos];
            if frame.trim().is_empty() {
                continue;
            }

            match parse_frame(frame) {
                Ok(event) => events.push(event),
                Err(e) => {
                    self.skipped += 1;
                    debug!(error = %e, "Skipping malformed frame");
                }
            }
        }

        events
    }

    /// Ends the input. Any incomplete trailing frame is dropped.
    pub fn finish(&mut self) {
        if !self.buffer.trim().is_empty() {
            debug!(
                bytes = self.buffer.len(),
                "Discarding incomplete frame at end of stream"
            );
        }
        self.buffer.clear();
    }

    /// Number of frames dropped so far because they could not be decoded.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Stream adapter turning a chunked HTTP body into [`StreamEvent`]s.
///
/// A transport error is yielded once and ends the stream; events decoded
/// before it have already been delivered.
pub struct EventStream {
    inner: ByteStream,
    decoder: FrameDecoder,
    utf8_tail: Vec<u8>,
    queue: VecDeque<StreamEvent>,
    finished: bool,
}

impl EventStream {
    pub fn new<S, E>(byte_stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<ClientError>,
    {
        use futures::StreamExt;

        Self {
            inner: Box::pin(byte_stream.map(|chunk| chunk.map_err(Into::into))),
            decoder: FrameDecoder::new(),
            utf8_tail: Vec::new(),
            queue: VecDeque::new(),
            finished: false,
        }
    }

    /// Decodes as much of `bytes` as forms valid UTF-8, carrying an
    /// incomplete trailing sequence over to the next chunk.
    fn feed(&mut self, bytes: &[u8]) {
        self.utf8_tail.extend_from_slice(bytes);
        let text = match std::str::from_utf8(&self.utf8_tail) {
            Ok(text) => {
                let text = text.to_string();
                self.utf8_tail.clear();
                text
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let rest = self.utf8_tail.split_off(valid);
                let text = String::from_utf8_lossy(&self.utf8_tail).into_owned();
                self.utf8_tail = rest;
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.utf8_tail).into_owned();
                self.utf8_tail.clear();
                text
            }
        };

        self.queue.extend(self.decoder.push(&text));
    }
}

impl Stream for EventStream {
    type Item = Result<StreamEvent, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.queue.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.feed(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    this.decoder.finish();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    if !this.utf8_tail.is_empty() {
                        let tail = std::mem::take(&mut this.utf8_tail);
                        let text = String::from_utf8_lossy(&tail).into_owned();
                        this.queue.extend(this.decoder.push(&text));
                    }
                    this.decoder.finish();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
