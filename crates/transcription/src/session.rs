//! One-shot session orchestration.
//!
//! A session owns exactly one backend for one media file: start, ingest,
//! teardown. The backend handle is explicit — created here, threaded
//! through the phases, and stopped on every exit path — so there is no
//! module-level "current session" to race on, and teardown errors are
//! logged without ever masking the primary result.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::backend::{BackendServer, RemoteStreamBackend};
use crate::chunker;
use crate::config::SessionConfig;
use crate::error::TranscribeError;
use crate::ingest::{EventStreamIngestor, IncrementalIngestor, LogPoller};
use crate::transcoder::Transcoder;
use crate::writer::{ReloadHook, SubtitleWriter};

/// How the chosen backend delivers results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Spawn the local server and stream interim results from its log.
    LocalStreaming,
    /// Spawn the local server and feed it fixed windows of audio
    /// (fallback for audio too long for one request).
    LocalChunked,
    /// Remote streaming API over server-sent events.
    RemoteStream,
}

/// One transcription request for prepared (mono 16 kHz) audio.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
    /// Total media duration, when the host knows it.
    pub media_duration_ms: Option<u64>,
    pub mode: BackendMode,
}

/// What a finished session produced.
#[derive(Debug)]
pub struct SessionReport {
    pub segments: usize,
    pub output_path: PathBuf,
}

/// Runs one transcription session end to end.
///
/// The subtitle file is written progressively while results arrive; on
/// fatal errors whatever was already written stays on disk as best-effort
/// salvage, and the backend is torn down regardless.
pub async fn run_session(
    config: &SessionConfig,
    request: &TranscriptionRequest,
    transcoder: &dyn Transcoder,
    reload: Arc<dyn ReloadHook>,
) -> Result<SessionReport, TranscribeError> {
    info!(
        audio = %request.audio_path.display(),
        output = %request.output_path.display(),
        mode = ?request.mode,
        "transcription session starting"
    );

    let writer = SubtitleWriter::spawn(request.output_path.clone(), reload);
    let audit = Arc::new(Mutex::new(AuditLog::new()));

    let result = match request.mode {
        BackendMode::LocalStreaming => {
            run_local_streaming(config, request, &writer, &audit).await
        }
        BackendMode::LocalChunked => {
            run_local_chunked(config, request, transcoder, &writer).await
        }
        BackendMode::RemoteStream => run_remote_stream(config, request, &writer, &audit).await,
    };

    let segments = writer.shutdown().await;
    persist_audit(&audit, &request.output_path);

    match result {
        Ok(()) => {
            info!(segments, "transcription session finished");
            Ok(SessionReport {
                segments,
                output_path: request.output_path.clone(),
            })
        }
        Err(e) => Err(e),
    }
}

async fn run_local_streaming(
    config: &SessionConfig,
    request: &TranscriptionRequest,
    writer: &SubtitleWriter,
    audit: &Arc<Mutex<AuditLog>>,
) -> Result<(), TranscribeError> {
    let mut server = BackendServer::start(config).await?;
    let ingestor = IncrementalIngestor::LogPolling(LogPoller::spawn(
        server.log_path().to_path_buf(),
        writer.sender(),
        audit.clone(),
    ));

    let outcome = server.request_inference(&request.audio_path).await;
    match &outcome {
        Ok(body) => ingestor.finalize(Some(body)).await,
        Err(_) => ingestor.finalize(None).await,
    }

    if let Err(e) = server.stop().await {
        warn!(error = %e, "backend teardown reported an error");
    }
    outcome.map(|_| ())
}

async fn run_local_chunked(
    config: &SessionConfig,
    request: &TranscriptionRequest,
    transcoder: &dyn Transcoder,
    writer: &SubtitleWriter,
) -> Result<(), TranscribeError> {
    let mut server = BackendServer::start(config).await?;
    let outcome = chunker::transcribe_chunked(
        &request.audio_path,
        request.media_duration_ms,
        &server,
        transcoder,
        writer,
    )
    .await;

    if let Err(e) = server.stop().await {
        warn!(error = %e, "backend teardown reported an error");
    }
    outcome.map(|_| ())
}

async fn run_remote_stream(
    config: &SessionConfig,
    request: &TranscriptionRequest,
    writer: &SubtitleWriter,
    audit: &Arc<Mutex<AuditLog>>,
) -> Result<(), TranscribeError> {
    let backend = RemoteStreamBackend::new(config)?;
    let mut ingestor =
        EventStreamIngestor::new(writer.sender(), audit.clone(), request.media_duration_ms);
    let outcome = backend
        .stream_transcription(&request.audio_path, &mut ingestor)
        .await;
    IncrementalIngestor::EventStream(ingestor).finalize(None).await;
    outcome
}

/// Writes the audit artifact next to the subtitle output. Best effort.
fn persist_audit(audit: &Mutex<AuditLog>, output_path: &Path) {
    let audit = audit.lock().unwrap_or_else(|e| e.into_inner());
    if audit.is_empty() {
        return;
    }
    let path = audit_path(output_path);
    if let Err(e) = audit.persist(&path) {
        warn!(error = %e, "failed to write audit artifact");
    }
}

fn audit_path(output_path: &Path) -> PathBuf {
    let mut name = output_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "subtitles.srt".into());
    name.push(".debug.json");
    output_path.with_file_name(name)
}
