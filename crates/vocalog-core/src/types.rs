//! Shared types for the vocalog transcript service.
//!
//! These types are used across vocalog-lib and vocalog-cli. Keeping them in
//! vocalog-core means consumers can depend on the data model without pulling
//! in tokio, axum, or rusqlite.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ─── Data model ────────────────────────────────────────────────────────────

/// Container format of a stored audio blob.
///
/// Recorded audio comes from the browser's `MediaRecorder` as WebM; synthesized
/// audio from the TTS provider is MP3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Webm,
    Mp3,
}

impl AudioFormat {
    /// Value stored in the `audio_format` column.
    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Webm => "webm",
            AudioFormat::Mp3 => "mp3",
        }
    }

    /// Parse a stored column value. Unknown values fall back to WebM, the
    /// format every row had before the column existed.
    pub fn from_column(value: &str) -> Self {
        match value {
            "mp3" => AudioFormat::Mp3,
            _ => AudioFormat::Webm,
        }
    }

    /// Infer the format from an uploaded part's content type.
    pub fn from_mime(mime: Option<&str>) -> Self {
        match mime.map(|m| m.split(';').next().unwrap_or(m).trim()) {
            Some("audio/mpeg") | Some("audio/mp3") => AudioFormat::Mp3,
            _ => AudioFormat::Webm,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

/// One saved transcript row, without its audio blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: i64,
    pub content: String,
    pub language: String,
    pub audio_format: AudioFormat,
    /// `YYYY-MM-DD HH:MM:SS` (UTC), assigned by SQLite at insert time.
    pub timestamp: String,
}

/// Audio blob read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

// ─── HTTP payloads ─────────────────────────────────────────────────────────

/// Outcome tag of a JSON reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// `{status, message}` body returned by `/save` and by JSON error replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: ReplyStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl StatusReply {
    pub fn success(message: impl Into<String>, id: i64) -> Self {
        Self {
            status: ReplyStatus::Success,
            message: message.into(),
            id: Some(id),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: message.into(),
            id: None,
        }
    }
}

/// Body of `POST /tts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_language_tag")]
    pub lang: String,
}

/// Language tag assumed when a client omits one.
pub const DEFAULT_LANGUAGE_TAG: &str = "en-US";

fn default_language_tag() -> String {
    DEFAULT_LANGUAGE_TAG.to_string()
}

// ─── Configuration ─────────────────────────────────────────────────────────

/// TTS provider configuration.
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Top-level domain of the Google Translate host, e.g. `com` or `co.uk`.
    pub tld: String,
    /// Ask the provider for slower speech.
    pub slow: bool,
    /// Override the full provider URL. Used to point at a local stand-in.
    pub endpoint: Option<String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            tld: "com".into(),
            slow: false,
            endpoint: None,
        }
    }
}

impl TtsConfig {
    /// Resolved `batchexecute` URL.
    pub fn url(&self) -> String {
        match &self.endpoint {
            Some(url) => url.clone(),
            None => format!(
                "https://translate.google.{}/_/TranslateWebserverUi/data/batchexecute",
                self.tld
            ),
        }
    }
}

/// Server configuration, built once at startup and handed to the router.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub tts: TtsConfig,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
}

/// Default SQLite file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "voice_data.db";

/// Default upload limit: 32 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            tts: TtsConfig::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_format_from_mime() {
        assert_eq!(AudioFormat::from_mime(Some("audio/mpeg")), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_mime(Some("audio/webm;codecs=opus")), AudioFormat::Webm);
        assert_eq!(AudioFormat::from_mime(None), AudioFormat::Webm);
    }

    #[test]
    fn audio_format_column_fallback() {
        assert_eq!(AudioFormat::from_column("mp3"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_column("ogg"), AudioFormat::Webm);
    }

    #[test]
    fn tts_url_uses_tld() {
        let cfg = TtsConfig {
            tld: "co.uk".into(),
            ..Default::default()
        };
        assert_eq!(
            cfg.url(),
            "https://translate.google.co.uk/_/TranslateWebserverUi/data/batchexecute"
        );
    }

    #[test]
    fn status_reply_omits_missing_id() {
        let reply = StatusReply::error("nope");
        assert_eq!(reply.status, ReplyStatus::Error);
        assert!(reply.id.is_none());
    }
}
