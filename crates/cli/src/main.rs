//! Command-line front end for the transcription session core.
//!
//! Extracts the audio track with ffmpeg, runs one transcription session
//! against the chosen backend and leaves a standard SRT file next to the
//! media (or wherever `--output` points).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use subgen_transcription::{
    BackendMode, FfmpegTranscoder, NoopReload, SessionConfig, Transcoder, TranscriptionRequest,
    pid, run_session,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Local server, interim results streamed from its log.
    LocalStream,
    /// Local server, fixed-window chunked requests.
    LocalChunked,
    /// Remote streaming API (requires an API key).
    RemoteStream,
}

impl From<Mode> for BackendMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::LocalStream => BackendMode::LocalStreaming,
            Mode::LocalChunked => BackendMode::LocalChunked,
            Mode::RemoteStream => BackendMode::RemoteStream,
        }
    }
}

/// Generate subtitles for a media file with a speech-to-text backend.
#[derive(Parser, Debug)]
#[command(name = "subgen", version)]
struct Cli {
    /// Media file to transcribe (any format ffmpeg can read).
    input: PathBuf,

    /// Where to write the SRT file. Defaults to the input path with an
    /// `.srt` extension.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Backend to use.
    #[arg(long, value_enum, default_value = "local-stream")]
    mode: Mode,

    /// Inference server executable (local modes).
    #[arg(long)]
    server_binary: Option<PathBuf>,

    /// Speech model file (local modes).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Port for the local inference server.
    #[arg(long)]
    port: Option<u16>,

    /// Extra arguments passed through to the server, shell-quoted.
    #[arg(long, default_value = "")]
    server_args: String,

    /// API key for the remote backend. Falls back to SUBGEN_API_KEY.
    #[arg(long, env = "SUBGEN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Remote API base URL.
    #[arg(long)]
    api_base_url: Option<String>,

    /// Remote model name.
    #[arg(long)]
    api_model: Option<String>,

    /// Spoken language hint (remote backend).
    #[arg(long)]
    language: Option<String>,

    /// Media duration in milliseconds, when known. Skips deriving it from
    /// the extracted payload size.
    #[arg(long)]
    duration_ms: Option<u64>,

    /// ffmpeg executable.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default();
        config.server_binary = self.server_binary.clone();
        config.model_path = self.model.clone();
        if let Some(port) = self.port {
            config.port = port;
        }
        config.extra_args = self.server_args.clone();
        config.api_key = self.api_key.clone();
        if let Some(url) = &self.api_base_url {
            config.api_base_url = url.clone();
        }
        if let Some(model) = &self.api_model {
            config.api_model = model.clone();
        }
        config.language = self.language.clone();
        config
    }

    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("srt"))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "transcription failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // a crashed earlier run may have left its local server behind; recover
    // it regardless of which backend this run uses
    pid::terminate_orphan(&pid::record_path()).await;

    let config = cli.session_config();
    let output_path = cli.output_path();
    let transcoder = FfmpegTranscoder::new(&cli.ffmpeg);

    // prepared audio lives in a temp file the session reads from
    let audio_file = tempfile::Builder::new()
        .prefix("subgen-audio-")
        .suffix(".wav")
        .tempfile()?;
    transcoder
        .prepare_audio(&cli.input, audio_file.path())
        .await?;

    let request = TranscriptionRequest {
        audio_path: audio_file.path().to_path_buf(),
        output_path,
        media_duration_ms: cli.duration_ms,
        mode: cli.mode.into(),
    };

    let report = run_session(&config, &request, &transcoder, Arc::new(NoopReload)).await?;
    println!(
        "wrote {} segments to {}",
        report.segments,
        report.output_path.display()
    );
    Ok(())
}
