//! Event-stream ingestor: consumes raw SSE chunks from a long-lived
//! request, buffers by line, and turns `data: {json}` payloads into
//! document updates.
//!
//! Chunk boundaries carry no meaning — a JSON payload may arrive split
//! across chunks and a chunk may carry many lines. Malformed JSON on a
//! data line is logged and skipped; a backend-reported error event is
//! logged without killing the stream; the literal `[DONE]` marker ends the
//! logical stream and is not itself an event.

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::audit::AuditLog;
use crate::transcript::{Segment, estimate_duration_ms, synthetic_id};
use crate::writer::WriterCommand;

/// Identity of the one synthesized segment that accumulates plain-text
/// deltas when the backend streams no timed segments.
const RUNNING_SEGMENT_ID: &str = "stream-delta";

/// SSE terminal marker.
const DONE_MARKER: &str = "[DONE]";

/// One streaming event. The wire carries many event shapes; field presence
/// decides the kind, and unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct StreamEvent {
    segment: Option<WireSegment>,
    segments: Option<Vec<WireSegment>>,
    text: Option<String>,
    delta: Option<String>,
    error: Option<Value>,
}

/// A timed segment as backends send it: seconds, optional id, optional end.
#[derive(Debug, Deserialize)]
struct WireSegment {
    id: Option<Value>,
    start: Option<f64>,
    end: Option<f64>,
    #[serde(default)]
    text: String,
}

pub struct EventStreamIngestor {
    writer: mpsc::Sender<WriterCommand>,
    audit: Arc<Mutex<AuditLog>>,
    /// Total media duration, when known — bounds synthesized segments.
    media_duration_ms: Option<u64>,
    buffer: String,
    delta_text: String,
    done: bool,
}

impl EventStreamIngestor {
    pub fn new(
        writer: mpsc::Sender<WriterCommand>,
        audit: Arc<Mutex<AuditLog>>,
        media_duration_ms: Option<u64>,
    ) -> Self {
        Self {
            writer,
            audit,
            media_duration_ms,
            buffer: String::new(),
            delta_text: String::new(),
            done: false,
        }
    }

    /// Whether the terminal marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feeds one raw chunk, processing every complete line it closes.
    /// Order-preserving; a trailing partial line waits for the next chunk.
    pub async fn feed(&mut self, chunk: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.handle_line(line).await;
        }
    }

    /// Drains whatever the last chunk left without a trailing newline.
    /// The stream is over, so a residual buffered line is complete by
    /// definition. Idempotent — the buffer is empty afterwards.
    pub async fn finish(&mut self) {
        let line = std::mem::take(&mut self.buffer);
        let line = line.trim();
        if !line.is_empty() {
            self.handle_line(line).await;
        }
    }

    async fn handle_line(&mut self, line: &str) {
        let Some(payload) = line.strip_prefix("data:") else {
            // event:/id:/comment lines — audited, otherwise ignored
            self.audit().record_raw(line);
            return;
        };
        let payload = payload.trim();
        if payload == DONE_MARKER {
            self.audit().record_raw(line);
            self.done = true;
            return;
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => {
                self.audit().record_parsed(line, value.clone());
                self.apply(value).await;
            }
            Err(e) => {
                self.audit().record_parse_error(line, &e.to_string());
                warn!(error = %e, "skipping malformed stream data line");
            }
        }
    }

    async fn apply(&mut self, value: Value) {
        let event: StreamEvent = match serde_json::from_value(value) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "stream event has unusable shape, skipping");
                return;
            }
        };

        if let Some(error) = event.error {
            warn!(%error, "backend reported an in-stream error");
            return;
        }
        if let Some(segment) = event.segment {
            let segment = self.from_wire(segment);
            let _ = self.writer.send(WriterCommand::Upsert(segment)).await;
            return;
        }
        if let Some(segments) = event.segments {
            self.apply_final(segments, event.text).await;
            return;
        }
        if let Some(delta) = event.delta {
            self.append_delta(&delta).await;
            return;
        }
        if let Some(text) = event.text {
            // flat-text final (no segments field at all)
            self.apply_final(Vec::new(), Some(text)).await;
            return;
        }
        debug!("stream event carried no recognized fields, ignoring");
    }

    /// Final transcript: a non-empty segment list replaces the whole
    /// document; with only flat text, a single synthesized segment does.
    /// An empty final payload keeps the accumulated interim segments —
    /// never a destructive reset.
    async fn apply_final(&mut self, segments: Vec<WireSegment>, text: Option<String>) {
        if !segments.is_empty() {
            let converted: Vec<Segment> = segments
                .into_iter()
                .map(|s| self.from_wire(s))
                .filter(|s| !s.is_blank())
                .collect();
            if !converted.is_empty() {
                let _ = self.writer.send(WriterCommand::ResetAll(converted)).await;
                return;
            }
        }
        match text {
            Some(text) if !text.trim().is_empty() => {
                let text = text.trim().to_string();
                let end_ms = self
                    .media_duration_ms
                    .unwrap_or_else(|| estimate_duration_ms(&text));
                let segment = Segment::new(synthetic_id(0, end_ms, &text), 0, end_ms, &text);
                let _ = self
                    .writer
                    .send(WriterCommand::ResetAll(vec![segment]))
                    .await;
            }
            _ => {
                debug!("final transcript payload empty, keeping interim segments");
            }
        }
    }

    /// Plain-text delta: concatenate onto the one running synthesized
    /// segment and re-estimate its duration.
    async fn append_delta(&mut self, delta: &str) {
        self.delta_text.push_str(delta);
        let text = self.delta_text.trim().to_string();
        if text.is_empty() {
            return;
        }
        let end_ms = self
            .media_duration_ms
            .unwrap_or_else(|| estimate_duration_ms(&text));
        let segment = Segment::new(RUNNING_SEGMENT_ID, 0, end_ms, &text);
        let _ = self.writer.send(WriterCommand::Upsert(segment)).await;
    }

    fn from_wire(&self, wire: WireSegment) -> Segment {
        let start_ms = (wire.start.unwrap_or(0.0).max(0.0) * 1000.0).round() as u64;
        let end_ms = match wire.end {
            Some(end) => (end.max(0.0) * 1000.0).round() as u64,
            None => start_ms + estimate_duration_ms(&wire.text),
        };
        let id = match wire.id {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => synthetic_id(start_ms, end_ms, &wire.text),
        };
        Segment::new(id, start_ms, end_ms, &wire.text)
    }

    fn audit(&self) -> std::sync::MutexGuard<'_, AuditLog> {
        self.audit.lock().unwrap_or_else(|e| e.into_inner())
    }
}
