//! HTTP client for a running vocalog server, used by the CLI.
//!
//! Audio responses are streamed to a `.partial` file next to the destination
//! and renamed into place once complete.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use vocalog_core::types::{AudioFormat, StatusReply, TtsRequest};

#[derive(Clone)]
pub struct Client {
    server: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// `POST /tts` and write the MP3 to `dest`. Returns bytes written.
    pub async fn say(&self, text: &str, lang: &str, dest: &Path) -> Result<u64, String> {
        let body = TtsRequest {
            text: text.to_string(),
            lang: lang.to_string(),
        };
        let resp = self
            .http
            .post(format!("{}/tts", self.server))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        stream_to_file(check(resp).await?, dest).await
    }

    /// Upload an audio file with its transcript via `POST /save`.
    pub async fn save(&self, audio: &Path, text: &str, lang: &str) -> Result<StatusReply, String> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| format!("failed to read {}: {e}", audio.display()))?;
        let format = format_for_path(audio);
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("recording.{}", format.extension()));

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(format.mime_type())
            .map_err(|e| format!("invalid mime type: {e}"))?;
        let form = reqwest::multipart::Form::new()
            .text("text", text.to_string())
            .text("lang", lang.to_string())
            .part("audio", part);

        let resp = self
            .http
            .post(format!("{}/save", self.server))
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        check(resp)
            .await?
            .json::<StatusReply>()
            .await
            .map_err(|e| format!("invalid reply: {e}"))
    }

    /// `GET /play/<id>` and write the audio to `dest`, or, when `dest` is
    /// `None`, to the file name the server suggests in `Content-Disposition`.
    /// Returns the path written and the byte count.
    pub async fn fetch(&self, id: i64, dest: Option<&Path>) -> Result<(PathBuf, u64), String> {
        let resp = self
            .http
            .get(format!("{}/play/{id}", self.server))
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        let resp = check(resp).await?;
        let dest = match dest {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(
                disposition_file_name(resp.headers())
                    .unwrap_or_else(|| format!("audio_{id}.{}", AudioFormat::default().extension())),
            ),
        };
        let written = stream_to_file(resp, &dest).await?;
        Ok((dest, written))
    }
}

/// Audio format implied by a file extension.
pub fn format_for_path(path: &Path) -> AudioFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("mp3") => AudioFormat::Mp3,
        _ => AudioFormat::Webm,
    }
}

/// Bare file name from a `Content-Disposition: ...; filename="x"` header.
/// Directory components are stripped.
fn disposition_file_name(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let value = headers.get(reqwest::header::CONTENT_DISPOSITION)?.to_str().ok()?;
    let raw = value
        .split(';')
        .find_map(|part| part.trim().strip_prefix("filename="))?
        .trim_matches('"');
    Path::new(raw)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
}

/// Turn a non-2xx reply into an error, preferring the server's JSON message.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, String> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<StatusReply>(&text)
        .map(|r| r.message)
        .unwrap_or(text);
    Err(format!("server returned {status}: {message}"))
}

async fn stream_to_file(resp: reqwest::Response, dest: &Path) -> Result<u64, String> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
        }
    }

    let partial = partial_path(dest);
    let mut file = tokio::fs::File::create(&partial)
        .await
        .map_err(|e| format!("failed to open partial file: {e}"))?;

    let mut bytes_done = 0u64;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| format!("download stream error: {e}"))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("failed to write chunk: {e}"))?;
        bytes_done += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| format!("flush failed: {e}"))?;
    drop(file);

    tokio::fs::rename(&partial, dest)
        .await
        .map_err(|e| format!("failed to finalize {}: {e}", dest.display()))?;
    debug!("client: wrote {bytes_done} bytes to {}", dest.display());
    Ok(bytes_done)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dest.with_file_name(name)
}
