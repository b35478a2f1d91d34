//! External transcoder interface.
//!
//! Audio preparation is an external collaborator: an ffmpeg-style binary
//! invoked with a fixed argument list producing mono 16 kHz PCM. The core
//! only needs two operations, so the seam is a small trait that tests can
//! substitute.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::TranscribeError;

/// Produces prepared audio files for the inference backends.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Re-encodes `input`'s audio track to mono 16 kHz PCM at `output`.
    async fn prepare_audio(&self, input: &Path, output: &Path) -> Result<(), TranscribeError>;

    /// Extracts the `[start, start + duration)` window of prepared audio.
    async fn extract_window(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        duration_secs: f64,
    ) -> Result<(), TranscribeError>;
}

/// Transcoder backed by an ffmpeg binary.
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<(), TranscribeError> {
        debug!(binary = %self.binary.display(), ?args, "running transcoder");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                TranscribeError::Transcode(format!(
                    "failed to run '{}': {}",
                    self.binary.display(),
                    e
                ))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // the tail is where ffmpeg puts the actual failure
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(TranscribeError::Transcode(format!(
                "transcoder exited with {}: {}",
                output.status, tail
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn prepare_audio(&self, input: &Path, output: &Path) -> Result<(), TranscribeError> {
        let input = input.to_string_lossy().into_owned();
        let output = output.to_string_lossy().into_owned();
        self.run(&[
            "-y", "-i", &input, "-vn", "-ac", "1", "-ar", "16000", "-c:a", "pcm_s16le", &output,
        ])
        .await
    }

    async fn extract_window(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        duration_secs: f64,
    ) -> Result<(), TranscribeError> {
        let input = input.to_string_lossy().into_owned();
        let output = output.to_string_lossy().into_owned();
        let start = format!("{start_secs:.3}");
        let duration = format!("{duration_secs:.3}");
        self.run(&[
            "-y", "-ss", &start, "-t", &duration, "-i", &input, "-ac", "1", "-ar", "16000",
            "-c:a", "pcm_s16le", &output,
        ])
        .await
    }
}
