//! Local inference server lifecycle: spawn, readiness, inference, teardown.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info, warn};

use crate::args;
use crate::config::SessionConfig;
use crate::error::TranscribeError;
use crate::pid;

use super::SrtProducer;

/// Spacing between readiness probes.
const PROBE_INTERVAL: Duration = Duration::from_millis(300);
/// Hard deadline for the backend to answer its health probe.
const READY_TIMEOUT: Duration = Duration::from_secs(20);
/// Per-probe timeout so a hung connect never eats the whole deadline.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A running local inference server, owned for the duration of one
/// transcription request.
///
/// `start` spawns and waits for readiness; `stop` is the idempotent
/// two-phase teardown. Dropping the handle without `stop` force-kills the
/// child as a last resort, so an interrupted caller cannot leak a process.
#[derive(Debug)]
pub struct BackendServer {
    child: Option<tokio::process::Child>,
    pid: u32,
    base_url: String,
    log_path: PathBuf,
    pid_record: PathBuf,
    client: reqwest::Client,
}

impl BackendServer {
    /// Resolves the executable and model, spawns the server detached with
    /// its output redirected to a log file, persists the PID record, and
    /// polls `GET /health` until ready.
    ///
    /// A pre-existing PID record means a previous backend was never torn
    /// down; it is terminated and the record cleared before spawning, so
    /// two live backends can never be tracked at once.
    pub async fn start(config: &SessionConfig) -> Result<Self, TranscribeError> {
        Self::start_with_timing(config, PROBE_INTERVAL, READY_TIMEOUT).await
    }

    async fn start_with_timing(
        config: &SessionConfig,
        probe_interval: Duration,
        ready_timeout: Duration,
    ) -> Result<Self, TranscribeError> {
        let binary = config
            .server_binary
            .as_deref()
            .filter(|p| p.is_file())
            .ok_or_else(|| {
                TranscribeError::Configuration(
                    "inference server executable not found; set server_binary".to_string(),
                )
            })?;
        let model = config
            .model_path
            .as_deref()
            .filter(|p| p.is_file())
            .ok_or_else(|| {
                TranscribeError::Configuration(
                    "model file not found; set model_path".to_string(),
                )
            })?;

        let pid_record = pid::record_path();
        if pid::read_record(&pid_record).is_some() {
            warn!("PID record present at start, recovering orphaned backend first");
            pid::terminate_orphan(&pid_record).await;
        }

        let log_path = std::env::temp_dir().join(format!("subgen-server-{}.log", config.port));
        let log_file = std::fs::File::create(&log_path)?;
        let log_err = log_file.try_clone()?;

        let mut command = tokio::process::Command::new(binary);
        command
            .arg("--model")
            .arg(model)
            .arg("--host")
            .arg(&config.host)
            .arg("--port")
            .arg(config.port.to_string())
            .args(args::split_args(&config.extra_args))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_err));

        info!(
            binary = %binary.display(),
            model = %model.display(),
            addr = %config.local_base_url(),
            "starting inference server"
        );
        let child = command.spawn().map_err(|e| {
            TranscribeError::Startup(format!("failed to spawn '{}': {}", binary.display(), e))
        })?;
        let pid_value = child
            .id()
            .ok_or_else(|| TranscribeError::Startup("spawned server has no pid".to_string()))?;

        if let Err(e) = pid::write_record(&pid_record, pid_value) {
            warn!(error = %e, "failed to persist PID record");
        }

        let mut server = Self {
            child: Some(child),
            pid: pid_value,
            base_url: config.local_base_url(),
            log_path,
            pid_record,
            client: reqwest::Client::new(),
        };

        if let Err(e) = server.wait_for_ready(probe_interval, ready_timeout).await {
            if let Err(stop_err) = server.stop().await {
                warn!(error = %stop_err, "teardown after failed startup also failed");
            }
            return Err(e);
        }

        info!(pid = pid_value, "inference server ready");
        Ok(server)
    }

    /// Polls the health endpoint every `probe_interval` until it answers
    /// 2xx or `ready_timeout` elapses.
    async fn wait_for_ready(
        &self,
        probe_interval: Duration,
        ready_timeout: Duration,
    ) -> Result<(), TranscribeError> {
        let url = format!("{}/health", self.base_url);
        let started = Instant::now();
        let mut last_error = "no probe attempted".to_string();
        loop {
            match self
                .client
                .get(&url)
                .timeout(PROBE_TIMEOUT)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    last_error = format!("health probe returned {}", response.status());
                }
                Err(e) => last_error = e.to_string(),
            }
            if started.elapsed() >= ready_timeout {
                return Err(TranscribeError::ReadinessTimeout {
                    waited_secs: started.elapsed().as_secs_f64(),
                    last_error,
                });
            }
            debug!(%last_error, "backend not ready yet");
            tokio::time::sleep(probe_interval).await;
        }
    }

    /// Where the server's stdout/stderr land; the log-polling ingestor
    /// reads this.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Idempotent two-phase teardown: graceful signal, short grace, then
    /// force-kill and reap. "Process already gone" is success. The PID
    /// record is cleared unconditionally as the final step.
    ///
    /// Errors are returned for the caller to log; they are never an excuse
    /// to skip the record cleanup.
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        debug!(pid = self.pid, "stopping inference server");

        let term_result = pid::terminate_pid(self.pid).await;
        // force phase: whatever state the signals left it in, reap the child
        let _ = child.start_kill();
        let wait_result = child.wait().await;

        let clear_result = pid::clear_record(&self.pid_record);

        term_result.map_err(|e| anyhow::anyhow!("graceful termination failed: {e}"))?;
        wait_result.map_err(|e| anyhow::anyhow!("failed to reap server process: {e}"))?;
        clear_result.map_err(|e| anyhow::anyhow!("failed to clear PID record: {e}"))?;
        Ok(())
    }

    /// One synchronous inference request: multipart POST of the audio file
    /// asking for SRT output. No client-side timeout — the request blocks
    /// until the backend responds or the connection errors.
    pub async fn request_inference(&self, audio: &Path) -> Result<String, TranscribeError> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());
        let part = Part::bytes(bytes).file_name(file_name).mime_str("audio/wav")?;
        let form = Form::new()
            .part("file", part)
            .text("response_format", "srt");

        let url = format!("{}/inference", self.base_url);
        debug!(%url, audio = %audio.display(), "sending inference request");
        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TranscribeError::Inference(format!(
                "backend returned {}: {}",
                status,
                body.trim()
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl SrtProducer for BackendServer {
    async fn transcribe_to_srt(&self, audio: &Path) -> Result<String, TranscribeError> {
        self.request_inference(audio).await
    }
}

impl Drop for BackendServer {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            warn!(pid = self.pid, "backend server dropped without stop, force-killing");
            let _ = child.start_kill();
            let _ = pid::clear_record(&self.pid_record);
        }
    }
}
