//! `data: <json>` framing for the generation event stream.
//!
//! Each event is one `data:` line followed by a blank line; the stream ends
//! with the literal `data: [DONE]` sentinel frame.

use actix_web::web::Bytes;

use crate::orchestrator::GenerationEvent;

pub const DONE_SENTINEL: &str = "[DONE]";
const DATA_PREFIX: &str = "data:";

/// Encodes one event as a complete frame.
pub fn encode(event: &GenerationEvent) -> Bytes {
    if matches!(event, GenerationEvent::Done) {
        return Bytes::from(format!("{DATA_PREFIX} {DONE_SENTINEL}\n\n"));
    }
    match serde_json::to_string(event) {
        Ok(json) => Bytes::from(format!("{DATA_PREFIX} {json}\n\n")),
        Err(e) => {
            log::error!("Failed to serialize generation event: {}", e);
            let fallback = serde_json::json!({ "type": "error", "error": "Failed to encode event" });
            Bytes::from(format!("{DATA_PREFIX} {fallback}\n\n"))
        }
    }
}

/// A decoded frame: an event, or the end-of-stream sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(GenerationEvent),
    Done,
}

/// Incremental decoder for a generation stream.
///
/// Bytes may arrive split at arbitrary points; partial lines are buffered
/// until their newline arrives.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame completed by it.
    /// Lines that are not `data:` frames or do not parse are skipped.
    pub fn push(&mut self, chunk: &str) -> Vec<Frame> {
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
                continue;
            };
            let payload = payload.trim();
            if payload == DONE_SENTINEL {
                frames.push(Frame::Done);
                continue;
            }
            match serde_json::from_str::<GenerationEvent>(payload) {
                Ok(event) => frames.push(Frame::Event(event)),
                Err(e) => log::warn!("Skipping unparsable frame: {} - Data: {}", e, payload),
            }
        }
        frames
    }

    /// Bytes received after the last complete line.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}
