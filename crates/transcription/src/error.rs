use thiserror::Error;

/// Error taxonomy for a transcription session.
///
/// Fatal variants abort the whole operation; per-line/per-event parse
/// problems are logged and skipped at the ingestion layer and never
/// surface here. Cleanup failures during teardown are returned by the
/// cleanup functions themselves and logged by callers, never raised
/// through a session result.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// Missing executable, model file or credentials. Raised before any
    /// backend process is started.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backend process could not be spawned or produced no pid.
    #[error("backend startup failed: {0}")]
    Startup(String),

    /// The backend never answered its health probe within the deadline.
    /// Teardown has already been attempted when this is returned.
    #[error("backend not ready after {waited_secs:.1}s: {last_error}")]
    ReadinessTimeout { waited_secs: f64, last_error: String },

    /// The backend answered an inference request with a failure status.
    #[error("inference request failed: {0}")]
    Inference(String),

    /// The external transcoder exited non-zero.
    #[error("audio transcode failed: {0}")]
    Transcode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}
