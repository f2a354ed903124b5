//! TTS adapter — language mapping → chunked provider calls → one MP3 buffer.
//!
//! ```text
//! synthesize("text", "ar-IQ") → provider_lang → "ar"
//!     → prepare_chunks: normalise, split to ≤100 chars
//!     → SpeechProvider::fetch per chunk (sequential, no retry)
//!     → concatenated MP3 frames
//! ```
//!
//! The production provider talks to the Google Translate `batchexecute`
//! endpoint. MP3 frames are self-delimiting, so per-chunk responses can be
//! appended without re-encoding.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use tracing::{debug, error};

use vocalog_core::lang::provider_lang;
use vocalog_core::text_prep::prepare_chunks;
use vocalog_core::types::TtsConfig;
use vocalog_core::{Result, VocalogError};

/// RPC id of the translate-tts call inside `batchexecute`.
const TTS_RPC_ID: &str = "jQ1olc";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/47.0.2526.106 Safari/537.36";

static RE_AUDIO_PAYLOAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"jQ1olc","\[\\"(.*)\\"\]"#).unwrap());

/// One network round-trip to a speech provider.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Synthesize a single chunk (already within the provider's length limit)
    /// in provider language `lang`. Returns MP3 bytes.
    async fn fetch(&self, chunk: &str, lang: &str) -> Result<Vec<u8>>;
}

/// Cloneable handle used by the HTTP layer.
#[derive(Clone)]
pub struct Synthesizer {
    provider: Arc<dyn SpeechProvider>,
}

impl Synthesizer {
    pub fn new(provider: Arc<dyn SpeechProvider>) -> Self {
        Self { provider }
    }

    /// Synthesizer backed by the Google Translate provider.
    pub fn google(config: TtsConfig) -> Self {
        Self::new(Arc::new(GoogleTranslateProvider::new(config)))
    }

    /// Convert `text` to MP3 bytes in the language for `language_tag`.
    ///
    /// Blank text is a validation error and never reaches the provider.
    pub async fn synthesize(&self, text: &str, language_tag: &str) -> Result<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VocalogError::Validation("No text provided".into()));
        }

        let lang = provider_lang(language_tag);
        let chunks = prepare_chunks(text);
        if chunks.is_empty() {
            return Err(VocalogError::Validation("No text provided".into()));
        }
        debug!("tts: {} chunk(s), tag={language_tag} lang={lang}", chunks.len());

        let mut audio = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let bytes = self.provider.fetch(chunk, lang).await.inspect_err(|e| {
                error!("tts: chunk {i} failed: {e}");
            })?;
            audio.extend_from_slice(&bytes);
        }
        Ok(audio)
    }
}

// ─── Google Translate provider ─────────────────────────────────────────────

/// Speech from `translate.google.<tld>` via the web client's RPC endpoint.
pub struct GoogleTranslateProvider {
    client: reqwest::Client,
    config: TtsConfig,
}

impl GoogleTranslateProvider {
    pub fn new(config: TtsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// One `batchexecute` POST for `chunk`, form-encoded as `f.req=<envelope>`.
    fn request(&self, chunk: &str, lang: &str) -> reqwest::RequestBuilder {
        let rpc = rpc_envelope(chunk, lang, self.config.slow);
        self.client
            .post(self.config.url())
            .header(reqwest::header::REFERER, "http://translate.google.com/")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .form(&[("f.req", rpc)])
    }
}

#[async_trait]
impl SpeechProvider for GoogleTranslateProvider {
    async fn fetch(&self, chunk: &str, lang: &str) -> Result<Vec<u8>> {
        debug!("tts: POST {} chars to {}", chunk.chars().count(), self.config.url());

        let resp = self
            .request(chunk, lang)
            .send()
            .await
            .map_err(|e| VocalogError::Synthesis(format!("Failed to connect. Probable cause: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VocalogError::Synthesis(status_message(status.as_u16(), &self.config.tld)));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| VocalogError::Synthesis(format!("Failed to read TTS response: {e}")))?;
        decode_audio_payload(&text)
    }
}

/// JSON-encoded RPC envelope sent as the `f.req` form field.
///
/// The inner parameter list is `[text, lang, speed, "null"]`, where `speed` is
/// `null` for normal speech and `true` for slow speech.
fn rpc_envelope(text: &str, lang: &str, slow: bool) -> String {
    let speed = if slow {
        serde_json::Value::Bool(true)
    } else {
        serde_json::Value::Null
    };
    let parameter = serde_json::json!([text, lang, speed, "null"]).to_string();
    serde_json::json!([[[TTS_RPC_ID, parameter, null, "generic"]]]).to_string()
}

/// Extract and concatenate base64 audio from every RPC line in the response.
fn decode_audio_payload(body: &str) -> Result<Vec<u8>> {
    let mut audio = Vec::new();
    let mut saw_rpc = false;
    for line in body.lines().filter(|l| l.contains(TTS_RPC_ID)) {
        saw_rpc = true;
        let caps = RE_AUDIO_PAYLOAD.captures(line).ok_or_else(|| {
            VocalogError::Synthesis(
                "200 from TTS API. Probable cause: No audio stream in response. \
                 Unsupported language or upstream API changes"
                    .into(),
            )
        })?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(caps[1].as_bytes())
            .map_err(|e| VocalogError::Synthesis(format!("Invalid audio payload from TTS API: {e}")))?;
        audio.extend_from_slice(&bytes);
    }

    if !saw_rpc || audio.is_empty() {
        return Err(VocalogError::Synthesis(
            "200 from TTS API. Probable cause: Unknown".into(),
        ));
    }
    Ok(audio)
}

/// `"<status> from TTS API. Probable cause: <cause>"`.
fn status_message(status: u16, tld: &str) -> String {
    let cause = match status {
        403 => "Bad token or upstream API changes".to_string(),
        404 if tld != "com" => format!("Unsupported tld '{tld}'"),
        500..=599 => "Upstream API error. Try again later.".to_string(),
        _ => "Unknown".to_string(),
    };
    format!("{status} from TTS API. Probable cause: {cause}")
}
