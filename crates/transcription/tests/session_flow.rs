//! End-to-end flows over scripted backends: chunked splitting, progressive
//! persistence and the ingest-then-finalize ordering, without a real
//! inference server.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use subgen_transcription::chunker::{self, CHUNK_WINDOW_MS};
use subgen_transcription::srt;
use subgen_transcription::{
    NoopReload, Segment, SrtProducer, SubtitleWriter, TranscribeError, Transcoder,
};

/// Backend that answers every request with one block spanning the whole
/// window it was given, numbering requests as it goes.
struct ScriptedBackend {
    requests: AtomicUsize,
    window_ms: u64,
}

#[async_trait]
impl SrtProducer for ScriptedBackend {
    async fn transcribe_to_srt(&self, _audio: &Path) -> Result<String, TranscribeError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!(
            "1\n{} --> {}\nchunk {}\n\n",
            srt::format_timestamp(0),
            srt::format_timestamp(self.window_ms as i64),
            n
        ))
    }
}

/// Backend that fails on a chosen request number.
struct FailingBackend {
    requests: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl SrtProducer for FailingBackend {
    async fn transcribe_to_srt(&self, _audio: &Path) -> Result<String, TranscribeError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            Err(TranscribeError::Inference("backend exploded".to_string()))
        } else {
            Ok(format!(
                "1\n00:00:00,000 --> 00:00:10,000\nchunk {}\n\n",
                n
            ))
        }
    }
}

/// Transcoder that records the windows it was asked for and the temp
/// paths it wrote to, and writes an empty placeholder file.
#[derive(Default)]
struct RecordingTranscoder {
    windows: std::sync::Mutex<Vec<(f64, f64)>>,
    outputs: std::sync::Mutex<Vec<std::path::PathBuf>>,
}

#[async_trait]
impl Transcoder for RecordingTranscoder {
    async fn prepare_audio(&self, _input: &Path, output: &Path) -> Result<(), TranscribeError> {
        std::fs::write(output, b"")?;
        Ok(())
    }

    async fn extract_window(
        &self,
        _input: &Path,
        output: &Path,
        start_secs: f64,
        duration_secs: f64,
    ) -> Result<(), TranscribeError> {
        self.windows
            .lock()
            .unwrap()
            .push((start_secs, duration_secs));
        self.outputs.lock().unwrap().push(output.to_path_buf());
        std::fs::write(output, b"")?;
        Ok(())
    }
}

#[tokio::test]
async fn test_chunked_splits_shifts_and_merges() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("audio.wav");
    std::fs::write(&audio, b"").unwrap();
    let out = dir.path().join("subtitles.srt");

    let backend = ScriptedBackend {
        requests: AtomicUsize::new(0),
        window_ms: CHUNK_WINDOW_MS,
    };
    let transcoder = RecordingTranscoder::default();
    let writer = SubtitleWriter::spawn(out.clone(), Arc::new(NoopReload));

    // 25s → 3 windows: 10s, 10s, 5s
    let chunks = chunker::transcribe_chunked(&audio, Some(25_000), &backend, &transcoder, &writer)
        .await
        .unwrap();
    assert_eq!(chunks, 3);

    let windows = transcoder.windows.lock().unwrap().clone();
    assert_eq!(windows, vec![(0.0, 10.0), (10.0, 10.0), (20.0, 5.0)]);

    assert_eq!(writer.shutdown().await, 3);
    let content = std::fs::read_to_string(&out).unwrap();
    // every chunk shifted by its window offset, no gaps at boundaries
    assert!(content.contains("1\n00:00:00,000 --> 00:00:10,000\nchunk 1\n"));
    assert!(content.contains("2\n00:00:10,000 --> 00:00:20,000\nchunk 2\n"));
    assert!(content.contains("3\n00:00:20,000 --> 00:00:30,000\nchunk 3\n"));
}

#[tokio::test]
async fn test_short_audio_is_one_request() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("audio.wav");
    std::fs::write(&audio, b"").unwrap();
    let out = dir.path().join("subtitles.srt");

    let backend = ScriptedBackend {
        requests: AtomicUsize::new(0),
        window_ms: 4_000,
    };
    let transcoder = RecordingTranscoder::default();
    let writer = SubtitleWriter::spawn(out.clone(), Arc::new(NoopReload));

    let chunks = chunker::transcribe_chunked(&audio, Some(4_000), &backend, &transcoder, &writer)
        .await
        .unwrap();
    assert_eq!(chunks, 1);
    assert!(transcoder.windows.lock().unwrap().is_empty());
    assert_eq!(writer.shutdown().await, 1);
}

#[tokio::test]
async fn test_chunk_failure_aborts_but_keeps_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("audio.wav");
    std::fs::write(&audio, b"").unwrap();
    let out = dir.path().join("subtitles.srt");

    let backend = FailingBackend {
        requests: AtomicUsize::new(0),
        fail_on: 2,
    };
    let transcoder = RecordingTranscoder::default();
    let writer = SubtitleWriter::spawn(out.clone(), Arc::new(NoopReload));

    let err = chunker::transcribe_chunked(&audio, Some(25_000), &backend, &transcoder, &writer)
        .await
        .unwrap_err();
    assert!(matches!(err, TranscribeError::Inference(_)));

    // the first chunk was persisted before the failure — best-effort salvage
    assert_eq!(writer.shutdown().await, 1);
    let content = std::fs::read_to_string(&out).unwrap();
    assert!(content.contains("chunk 1"));

    // no window temp files left behind, including the failed chunk's
    let outputs = transcoder.outputs.lock().unwrap().clone();
    assert_eq!(outputs.len(), 2);
    for path in &outputs {
        assert!(!path.exists(), "leftover window file {}", path.display());
    }
}

#[tokio::test]
async fn test_progressive_writes_are_visible_between_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("audio.wav");
    std::fs::write(&audio, b"").unwrap();
    let out = dir.path().join("subtitles.srt");

    /// Asserts the output file already holds the previous chunk when the
    /// next request arrives.
    struct CheckingBackend {
        requests: AtomicUsize,
        out: std::path::PathBuf,
    }

    #[async_trait]
    impl SrtProducer for CheckingBackend {
        async fn transcribe_to_srt(&self, _audio: &Path) -> Result<String, TranscribeError> {
            let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
            if n > 1 {
                let content = std::fs::read_to_string(&self.out).unwrap_or_default();
                assert!(content.contains(&format!("chunk {}", n - 1)));
            }
            Ok(format!("1\n00:00:00,000 --> 00:00:10,000\nchunk {}\n\n", n))
        }
    }

    let backend = CheckingBackend {
        requests: AtomicUsize::new(0),
        out: out.clone(),
    };
    let transcoder = RecordingTranscoder::default();
    let writer = SubtitleWriter::spawn(out.clone(), Arc::new(NoopReload));

    chunker::transcribe_chunked(&audio, Some(30_000), &backend, &transcoder, &writer)
        .await
        .unwrap();
    assert_eq!(writer.shutdown().await, 3);
}

#[tokio::test]
async fn test_writer_document_stays_sorted_across_sources() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("subtitles.srt");
    let writer = SubtitleWriter::spawn(out.clone(), Arc::new(NoopReload));

    writer.upsert(Segment::new("late", 20_000, 22_000, "late line")).await;
    writer.upsert(Segment::new("early", 1_000, 2_000, "early line")).await;
    writer.upsert(Segment::new("mid", 9_000, 11_000, "mid line")).await;
    writer.shutdown().await;

    let content = std::fs::read_to_string(&out).unwrap();
    let early = content.find("early line").unwrap();
    let mid = content.find("mid line").unwrap();
    let late = content.find("late line").unwrap();
    assert!(early < mid && mid < late);
    assert!(content.starts_with("1\n"));
}
