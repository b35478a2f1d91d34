use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for one transcription session.
///
/// The host application persists this however it likes; the core only reads
/// it. Executable and credential checks happen at session start, before any
/// backend process is spawned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path to the local inference server executable (e.g. whisper-server).
    pub server_binary: Option<PathBuf>,
    /// Path to the model file passed to the local server.
    pub model_path: Option<PathBuf>,
    /// Bind host for the spawned server.
    pub host: String,
    /// Bind port for the spawned server.
    pub port: u16,
    /// Free-text extra server arguments, shell-word split leniently
    /// (see [`crate::args::split_args`]).
    pub extra_args: String,
    /// Base URL of the remote streaming API.
    pub api_base_url: String,
    /// Bearer token for the remote API.
    pub api_key: Option<String>,
    /// Model name sent to the remote API.
    pub api_model: String,
    /// Chunking strategy form field for the remote API, when set.
    pub chunking_strategy: Option<String>,
    /// Language hint forwarded to backends that accept one.
    pub language: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_binary: None,
            model_path: None,
            host: "127.0.0.1".to_string(),
            port: 17896,
            extra_args: String::new(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            api_model: "whisper-1".to_string(),
            chunking_strategy: None,
            language: None,
        }
    }
}

impl SessionConfig {
    /// Base URL of the spawned local server.
    pub fn local_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
