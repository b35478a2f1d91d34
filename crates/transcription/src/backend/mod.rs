//! Inference backends: the local spawned server and the remote streaming API.

pub mod server;
pub mod stream;

use std::path::Path;

use async_trait::async_trait;

use crate::error::TranscribeError;

pub use server::BackendServer;
pub use stream::RemoteStreamBackend;

/// One synchronous inference request producing a complete SRT document.
///
/// The local server implements this directly; the chunked fallback splitter
/// is written against this seam so tests can plug in a scripted producer.
#[async_trait]
pub trait SrtProducer: Send + Sync {
    async fn transcribe_to_srt(&self, audio: &Path) -> Result<String, TranscribeError>;
}
