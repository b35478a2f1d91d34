//! Single-writer subtitle actor.
//!
//! One spawned task owns the [`TranscriptDoc`] and drains an ordered queue
//! of update commands; every change is rendered and persisted as a
//! whole-file atomic replace before the host viewer is asked to reload.
//! Because the queue is processed strictly in order, no two writes for the
//! same session ever overlap, and `flush()` gives callers a "everything
//! enqueued so far is on disk" barrier for shutdown ordering.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::transcript::{Segment, TranscriptDoc};

/// Asks the host to reload the subtitle track from disk.
///
/// Implementations handle their own failures (log, never propagate) — a
/// viewer that cannot reload must not abort transcription.
pub trait ReloadHook: Send + Sync {
    fn reload(&self, path: &Path);
}

/// Reload hook that only logs. Used by headless callers and tests.
pub struct NoopReload;

impl ReloadHook for NoopReload {
    fn reload(&self, path: &Path) {
        debug!(path = %path.display(), "subtitle reload requested (no viewer attached)");
    }
}

/// Commands accepted by the writer task, processed strictly in order.
#[derive(Debug)]
pub enum WriterCommand {
    Upsert(Segment),
    ResetAll(Vec<Segment>),
    /// Replies with the current segment count once every prior command has
    /// been applied and persisted.
    Flush(oneshot::Sender<usize>),
}

/// Handle to the writer task.
pub struct SubtitleWriter {
    tx: mpsc::Sender<WriterCommand>,
    task: tokio::task::JoinHandle<()>,
}

impl SubtitleWriter {
    /// Spawns the writer task for `output_path`.
    pub fn spawn(output_path: PathBuf, reload: Arc<dyn ReloadHook>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(writer_loop(rx, output_path, reload));
        Self { tx, task }
    }

    /// Queue endpoint for ingestors.
    pub fn sender(&self) -> mpsc::Sender<WriterCommand> {
        self.tx.clone()
    }

    pub async fn upsert(&self, segment: Segment) {
        let _ = self.tx.send(WriterCommand::Upsert(segment)).await;
    }

    pub async fn reset_all(&self, segments: Vec<Segment>) {
        let _ = self.tx.send(WriterCommand::ResetAll(segments)).await;
    }

    /// Blocks until every command enqueued before this call has been
    /// applied and written. Returns the segment count at that point.
    pub async fn flush(&self) -> usize {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriterCommand::Flush(ack_tx)).await.is_err() {
            return 0;
        }
        ack_rx.await.unwrap_or(0)
    }

    /// Final flush, then stops the task.
    pub async fn shutdown(self) -> usize {
        let count = self.flush().await;
        drop(self.tx);
        let _ = self.task.await;
        count
    }
}

async fn writer_loop(
    mut rx: mpsc::Receiver<WriterCommand>,
    output_path: PathBuf,
    reload: Arc<dyn ReloadHook>,
) {
    let mut doc = TranscriptDoc::new();
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Upsert(segment) => {
                if doc.upsert(segment) {
                    persist(&doc, &output_path, reload.as_ref()).await;
                }
            }
            WriterCommand::ResetAll(segments) => {
                doc.reset_all(segments);
                persist(&doc, &output_path, reload.as_ref()).await;
            }
            WriterCommand::Flush(ack) => {
                let _ = ack.send(doc.len());
            }
        }
    }
    debug!(path = %output_path.display(), "subtitle writer stopped");
}

/// Whole-file atomic replace: render to a temp file in the target
/// directory, then rename over the output so a concurrent reader never
/// sees a partially written document. Write failures are logged — the
/// stream goes on and a later write will retry the full content.
async fn persist(doc: &TranscriptDoc, output_path: &Path, reload: &dyn ReloadHook) {
    let content = doc.render();
    let tmp_path = temp_sibling(output_path);
    let result = async {
        tokio::fs::write(&tmp_path, &content).await?;
        tokio::fs::rename(&tmp_path, output_path).await
    }
    .await;

    match result {
        Ok(()) => {
            debug!(
                path = %output_path.display(),
                segments = doc.len(),
                "subtitle file written"
            );
            reload.reload(output_path);
        }
        Err(e) => {
            warn!(path = %output_path.display(), error = %e, "subtitle write failed");
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }
    }
}

fn temp_sibling(output_path: &Path) -> PathBuf {
    let mut name = output_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "subtitles.srt".into());
    name.push(".tmp");
    output_path.with_file_name(name)
}
