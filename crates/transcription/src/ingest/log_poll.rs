//! Log-polling ingestor for backends that stream results via their log.
//!
//! The server log grows while inference runs; each poll rereads it from
//! the start and upserts any timed line not seen before. The backend's own
//! final returned document is authoritative and replaces the streamed
//! interim state on finalize.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::audit::AuditLog;
use crate::srt;
use crate::transcript::{Segment, synthetic_id};
use crate::writer::WriterCommand;

/// Interval between log rereads.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Background poller attached to a backend's log file.
pub struct LogPoller {
    log_path: PathBuf,
    writer: mpsc::Sender<WriterCommand>,
    audit: Arc<Mutex<AuditLog>>,
    seen: Arc<Mutex<HashSet<String>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl LogPoller {
    /// Spawns the poll loop. It runs until [`LogPoller::finalize`] (or drop)
    /// stops it; a missing log file just means "nothing yet".
    pub fn spawn(
        log_path: PathBuf,
        writer: mpsc::Sender<WriterCommand>,
        audit: Arc<Mutex<AuditLog>>,
    ) -> Self {
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let handle = {
            let log_path = log_path.clone();
            let writer = writer.clone();
            let audit = audit.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(POLL_INTERVAL);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    scan(&log_path, &seen, &writer, &audit).await;
                }
            })
        };
        Self {
            log_path,
            writer,
            audit,
            seen,
            handle,
        }
    }

    /// Stops the loop and runs the last authoritative pass.
    ///
    /// A non-empty `final_srt` (the backend's synchronous inference
    /// response) may correct interim log lines, so it replaces the whole
    /// document; without one, a final poll-equivalent scan picks up any
    /// lines the last tick missed.
    pub async fn finalize(self, final_srt: Option<&str>) {
        self.handle.abort();

        let final_segments: Vec<Segment> = final_srt
            .map(srt::parse)
            .unwrap_or_default()
            .into_iter()
            .map(Segment::from_block)
            .filter(|s| !s.is_blank())
            .collect();

        if final_segments.is_empty() {
            scan(&self.log_path, &self.seen, &self.writer, &self.audit).await;
        } else {
            debug!(
                segments = final_segments.len(),
                "replacing interim transcript with final inference output"
            );
            let _ = self
                .writer
                .send(WriterCommand::ResetAll(final_segments))
                .await;
        }
    }
}

impl Drop for LogPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One poll: reread the log, upsert every timed line not seen before.
async fn scan(
    log_path: &Path,
    seen: &Mutex<HashSet<String>>,
    writer: &mpsc::Sender<WriterCommand>,
    audit: &Mutex<AuditLog>,
) {
    let Ok(content) = tokio::fs::read_to_string(log_path).await else {
        return;
    };
    for line in content.lines() {
        let Some((start_ms, end_ms, text)) = parse_log_line(line) else {
            continue;
        };
        let key = format!("{start_ms}:{end_ms}:{text}");
        {
            let mut seen = seen.lock().unwrap_or_else(|e| e.into_inner());
            if !seen.insert(key) {
                continue;
            }
        }
        audit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_raw(line);
        let segment = Segment::new(synthetic_id(start_ms, end_ms, &text), start_ms, end_ms, &text);
        let _ = writer.send(WriterCommand::Upsert(segment)).await;
    }
}

/// Parses the fixed server log shape `[HH:MM:SS.mmm --> HH:MM:SS.mmm]  text`.
fn parse_log_line(line: &str) -> Option<(u64, u64, String)> {
    let rest = line.trim().strip_prefix('[')?;
    let (timing, text) = rest.split_once(']')?;
    let (start_raw, end_raw) = timing.split_once("-->")?;
    let start_ms = srt::try_parse_timestamp(start_raw)?;
    let end_ms = srt::try_parse_timestamp(end_raw)?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some((start_ms, end_ms, text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{NoopReload, SubtitleWriter};

    #[test]
    fn test_parse_log_line() {
        let (start, end, text) =
            parse_log_line("[00:00:01.000 --> 00:00:02.500]  Hello").unwrap();
        assert_eq!(start, 1_000);
        assert_eq!(end, 2_500);
        assert_eq!(text, "Hello");
    }

    #[test]
    fn test_parse_log_line_rejects_noise() {
        assert!(parse_log_line("whisper_init: loading model").is_none());
        assert!(parse_log_line("[not a timestamp]  text").is_none());
        assert!(parse_log_line("[00:00:01.000 --> 00:00:02.000]   ").is_none());
    }

    #[tokio::test]
    async fn test_poll_and_final_scan() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");
        let out = dir.path().join("subtitles.srt");
        std::fs::write(
            &log_path,
            "[00:00:01.000 --> 00:00:02.500]  Hello\n[00:00:02.500 --> 00:00:04.000]  world\n",
        )
        .unwrap();

        let writer = SubtitleWriter::spawn(out.clone(), Arc::new(NoopReload));
        let audit = Arc::new(Mutex::new(AuditLog::new()));
        let poller = LogPoller::spawn(log_path.clone(), writer.sender(), audit.clone());

        // first interval tick fires immediately
        tokio::time::sleep(Duration::from_millis(100)).await;

        // the loop rereads from the start without duplicating earlier lines
        std::fs::write(
            &log_path,
            "[00:00:01.000 --> 00:00:02.500]  Hello\n[00:00:02.500 --> 00:00:04.000]  world\n[00:00:04.000 --> 00:00:05.000]  again\n",
        )
        .unwrap();

        poller.finalize(None).await;
        assert_eq!(writer.flush().await, 3);

        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.starts_with("1\n00:00:01,000 --> 00:00:02,500\nHello\n\n"));
        assert!(content.contains("3\n00:00:04,000 --> 00:00:05,000\nagain\n\n"));
        assert_eq!(audit.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_finalize_with_authoritative_output() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");
        let out = dir.path().join("subtitles.srt");
        std::fs::write(&log_path, "[00:00:01.000 --> 00:00:02.000]  interim draft\n").unwrap();

        let writer = SubtitleWriter::spawn(out.clone(), Arc::new(NoopReload));
        let audit = Arc::new(Mutex::new(AuditLog::new()));
        let poller = LogPoller::spawn(log_path, writer.sender(), audit);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let final_srt = "1\n00:00:01,000 --> 00:00:02,000\ncorrected text\n\n";
        poller.finalize(Some(final_srt)).await;
        assert_eq!(writer.flush().await, 1);

        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.contains("corrected text"));
        assert!(!content.contains("interim draft"));
    }

    #[tokio::test]
    async fn test_empty_final_keeps_interim() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");
        let out = dir.path().join("subtitles.srt");
        std::fs::write(&log_path, "[00:00:01.000 --> 00:00:02.000]  interim\n").unwrap();

        let writer = SubtitleWriter::spawn(out.clone(), Arc::new(NoopReload));
        let audit = Arc::new(Mutex::new(AuditLog::new()));
        let poller = LogPoller::spawn(log_path, writer.sender(), audit);
        tokio::time::sleep(Duration::from_millis(100)).await;

        poller.finalize(Some("")).await;
        assert_eq!(writer.flush().await, 1);
        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.contains("interim"));
    }
}
