//! Subtitle generation session core.
//!
//! Orchestrates an external speech-to-text backend — a locally spawned
//! inference server or a remote streaming API — and progressively writes a
//! standard SRT file as results arrive, safe to reload by a concurrent
//! viewer at any point. Speech recognition itself, audio extraction and
//! the host player's UI stay outside; this crate owns the backend
//! lifecycle, incremental result parsing, transcript merging and
//! persistence.

pub mod args;
pub mod audit;
pub mod backend;
pub mod chunker;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pid;
pub mod session;
pub mod srt;
pub mod transcoder;
pub mod transcript;
pub mod writer;

pub use backend::{BackendServer, RemoteStreamBackend, SrtProducer};
pub use config::SessionConfig;
pub use error::TranscribeError;
pub use session::{BackendMode, SessionReport, TranscriptionRequest, run_session};
pub use transcoder::{FfmpegTranscoder, Transcoder};
pub use transcript::{Segment, TranscriptDoc};
pub use writer::{NoopReload, ReloadHook, SubtitleWriter};
