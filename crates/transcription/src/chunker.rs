//! Chunked fallback splitter for backends without native streaming.
//!
//! Long audio is cut into fixed windows, each transcribed sequentially;
//! window results are time-shifted by their offset and merged into the
//! aggregate document, persisting after every chunk so partial progress is
//! visible while the rest still transcribes.

use std::path::Path;

use tracing::{debug, info};

use crate::backend::SrtProducer;
use crate::error::TranscribeError;
use crate::srt;
use crate::transcoder::Transcoder;
use crate::transcript::Segment;
use crate::writer::SubtitleWriter;

/// Fixed chunk window.
pub const CHUNK_WINDOW_MS: u64 = 10_000;

/// Prepared audio format, for deriving duration from payload size when the
/// caller does not know it: mono 16 kHz s16.
const SAMPLE_RATE: u64 = 16_000;
const BYTES_PER_SAMPLE: u64 = 2;
const WAV_HEADER_BYTES: u64 = 44;

/// The fixed-size windows covering `duration_ms`: `ceil(D/W)` windows, the
/// last truncated to the remaining duration.
pub fn window_plan(duration_ms: u64) -> Vec<(u64, u64)> {
    let mut windows = Vec::new();
    let mut start = 0;
    while start < duration_ms {
        let len = CHUNK_WINDOW_MS.min(duration_ms - start);
        windows.push((start, len));
        start += len;
    }
    windows
}

/// Duration of a prepared mono 16 kHz s16 payload, from its byte size.
fn duration_from_payload(bytes: u64) -> u64 {
    bytes.saturating_sub(WAV_HEADER_BYTES) * 1_000 / (SAMPLE_RATE * BYTES_PER_SAMPLE)
}

/// Transcribes `audio` through `backend`, splitting into windows when it
/// exceeds one chunk. Returns the number of inference requests made.
///
/// Each window's temporary file is removed even when its inference fails;
/// a chunk failure aborts the whole splitter with the underlying error
/// after that cleanup.
pub async fn transcribe_chunked(
    audio: &Path,
    media_duration_ms: Option<u64>,
    backend: &dyn SrtProducer,
    transcoder: &dyn Transcoder,
    writer: &SubtitleWriter,
) -> Result<usize, TranscribeError> {
    let duration_ms = match media_duration_ms {
        Some(d) => d,
        None => {
            let payload = tokio::fs::metadata(audio).await?.len();
            duration_from_payload(payload)
        }
    };

    if duration_ms <= CHUNK_WINDOW_MS {
        debug!(duration_ms, "audio fits one window, transcribing whole file");
        let body = backend.transcribe_to_srt(audio).await?;
        append_blocks(writer, srt::parse(&body)).await;
        writer.flush().await;
        return Ok(1);
    }

    let windows = window_plan(duration_ms);
    info!(
        duration_ms,
        windows = windows.len(),
        "splitting audio into fixed windows"
    );

    for (i, &(start_ms, len_ms)) in windows.iter().enumerate() {
        let window_file = tempfile::Builder::new()
            .prefix("subgen-chunk-")
            .suffix(".wav")
            .tempfile()?;

        let result = async {
            transcoder
                .extract_window(
                    audio,
                    window_file.path(),
                    start_ms as f64 / 1_000.0,
                    len_ms as f64 / 1_000.0,
                )
                .await?;
            backend.transcribe_to_srt(window_file.path()).await
        }
        .await;

        // the temp window is deleted here whether or not the chunk worked
        drop(window_file);
        let body = result?;

        let mut blocks = srt::parse(&body);
        srt::shift(&mut blocks, start_ms as i64);
        debug!(
            chunk = i + 1,
            total = windows.len(),
            start_ms,
            blocks = blocks.len(),
            "chunk transcribed"
        );
        append_blocks(writer, blocks).await;
        writer.flush().await;
    }

    Ok(windows.len())
}

async fn append_blocks(writer: &SubtitleWriter, blocks: Vec<srt::SrtBlock>) {
    for block in blocks {
        writer.upsert(Segment::from_block(block)).await;
    }
}
