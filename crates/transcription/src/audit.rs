//! In-memory audit log of raw backend output, for post-hoc inspection.
//!
//! Every inbound unit (log line or stream line) is recorded with a
//! wall-clock timestamp; data lines additionally carry their parsed JSON or
//! a parse-error note. The artifact is written next to the subtitle output
//! as best effort — a failed write is logged by the caller, never fatal.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
struct AuditEntry {
    timestamp: String,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parsed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_error: Option<String>,
}

#[derive(Serialize)]
struct AuditArtifact<'a> {
    generated_at: String,
    raw_text: String,
    events: &'a [AuditEntry],
}

/// Collects raw inbound units during one session.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a raw unit with no JSON payload (log line, done marker).
    pub fn record_raw(&mut self, payload: &str) {
        self.entries.push(AuditEntry {
            timestamp: Utc::now().to_rfc3339(),
            payload: payload.to_string(),
            parsed: None,
            parse_error: None,
        });
    }

    /// Records a data line together with its successfully parsed form.
    pub fn record_parsed(&mut self, payload: &str, parsed: Value) {
        self.entries.push(AuditEntry {
            timestamp: Utc::now().to_rfc3339(),
            payload: payload.to_string(),
            parsed: Some(parsed),
            parse_error: None,
        });
    }

    /// Records a data line that failed to parse.
    pub fn record_parse_error(&mut self, payload: &str, error: &str) {
        self.entries.push(AuditEntry {
            timestamp: Utc::now().to_rfc3339(),
            payload: payload.to_string(),
            parsed: None,
            parse_error: Some(error.to_string()),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the artifact `{generated_at, raw_text, events}` to `path`.
    ///
    /// Callers log the error; a failed audit write never aborts a session.
    pub fn persist(&self, path: &Path) -> anyhow::Result<()> {
        let raw_text = self
            .entries
            .iter()
            .map(|e| e.payload.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let artifact = AuditArtifact {
            generated_at: Utc::now().to_rfc3339(),
            raw_text,
            events: &self.entries,
        };
        let json = serde_json::to_string_pretty(&artifact)?;
        std::fs::write(path, json)
            .map_err(|e| anyhow::anyhow!("failed to write audit log '{}': {}", path.display(), e))?;
        Ok(())
    }
}
