//! Remote streaming backend: multipart POST answered by a server-sent-event
//! byte stream, fed chunk by chunk into the event-stream ingestor.

use std::path::Path;

use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::TranscribeError;
use crate::ingest::EventStreamIngestor;

/// Client for a remote streaming transcription API.
pub struct RemoteStreamBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    language: Option<String>,
    chunking_strategy: Option<String>,
}

impl RemoteStreamBackend {
    /// Fails with a configuration error when no API key is present —
    /// before any request is made.
    pub fn new(config: &SessionConfig) -> Result<Self, TranscribeError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                TranscribeError::Configuration(
                    "remote API key is not configured".to_string(),
                )
            })?
            .to_string();
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.api_model.clone(),
            api_key,
            language: config.language.clone(),
            chunking_strategy: config.chunking_strategy.clone(),
        })
    }

    /// Streams one transcription: sends the audio with the stream flag set
    /// and feeds response chunks to `ingestor` in arrival order until the
    /// stream ends or the transport fails.
    ///
    /// Transport errors are fatal to the session, but everything already
    /// ingested stays in the document — the caller flushes regardless.
    pub async fn stream_transcription(
        &self,
        audio: &Path,
        ingestor: &mut EventStreamIngestor,
    ) -> Result<(), TranscribeError> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());
        let part = Part::bytes(bytes).file_name(file_name).mime_str("audio/wav")?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "json")
            .text("stream", "true");
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }
        if let Some(strategy) = &self.chunking_strategy {
            form = form.text("chunking_strategy", strategy.clone());
        }

        let url = format!("{}/audio/transcriptions", self.base_url);
        info!(%url, model = %self.model, "starting remote streaming transcription");
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Inference(format!(
                "remote API returned {}: {}",
                status,
                body.trim()
            )));
        }

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            ingestor.feed(&chunk).await;
            if ingestor.is_done() {
                debug!("stream done marker received");
                break;
            }
        }
        // a final data line may arrive without a trailing newline
        ingestor.finish().await;
        Ok(())
    }
}
