//! Incremental result ingestion.
//!
//! Two variants share one output contract — turn raw backend output into
//! [`crate::writer::WriterCommand`]s: a log file polled at an interval for
//! servers that stream via their log, and a server-sent-event consumer for
//! APIs that stream over HTTP.

pub mod event_stream;
pub mod log_poll;

pub use event_stream::EventStreamIngestor;
pub use log_poll::LogPoller;

/// Tagged ingestion variant, so session orchestration stays agnostic of
/// how a given backend delivers incremental results.
pub enum IncrementalIngestor {
    LogPolling(LogPoller),
    EventStream(EventStreamIngestor),
}

impl IncrementalIngestor {
    /// Stops ingestion and performs the variant's final authoritative pass.
    ///
    /// For log polling, a non-empty `final_srt` (the backend's own returned
    /// document) supersedes everything streamed from the log. The
    /// event-stream variant has no out-of-band final document — its final
    /// events arrive in-stream — so its pass drains any data line the last
    /// chunk left without a trailing newline.
    pub async fn finalize(self, final_srt: Option<&str>) {
        match self {
            IncrementalIngestor::LogPolling(poller) => poller.finalize(final_srt).await,
            IncrementalIngestor::EventStream(mut ingestor) => ingestor.finish().await,
        }
    }
}
