//! HTTP API for the vocalog transcript service.
//!
//! Runs on port 5000 by default. CORS-permissive so a recorder page served
//! from another local origin can post to it.

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use vocalog_core::types::{
    AudioFormat, ServerConfig, StatusReply, TtsRequest, DEFAULT_LANGUAGE_TAG,
};
use vocalog_core::{Result, VocalogError};

use crate::store::TranscriptStore;
use crate::tts::Synthesizer;
use crate::views;

/// Shared handler state. Cheap to clone; holds no open connections.
#[derive(Clone)]
pub struct AppState {
    pub store: TranscriptStore,
    pub synth: Synthesizer,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Open the store (creating the schema) and build the Google TTS adapter.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let store = TranscriptStore::new(config.db_path.clone())?;
        info!(
            "store ready at {} ({} transcript(s))",
            store.path().display(),
            store.count()?
        );
        Ok(Self {
            store,
            synth: Synthesizer::google(config.tts.clone()),
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

/// Build the axum router over a shared [`AppState`].
pub fn router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/save", post(save))
        .route("/tts", post(tts))
        .route("/play/{id}", get(play))
        .route("/history", get(history))
        .route("/audio/{id}", get(audio))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Error mapping ─────────────────────────────────────────────────────────

/// Route-boundary wrapper turning [`VocalogError`] into a response.
struct ApiError(VocalogError);

impl From<VocalogError> for ApiError {
    fn from(e: VocalogError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            VocalogError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Json(StatusReply::error(msg))).into_response()
            }
            VocalogError::TooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, Json(StatusReply::error(msg))).into_response()
            }
            VocalogError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "Audio not found").into_response()
            }
            VocalogError::Synthesis(msg) => {
                warn!("tts failed: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(StatusReply::error(msg))).into_response()
            }
            e @ VocalogError::Storage(_) => {
                warn!("{e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(StatusReply::error(e.to_string())),
                )
                    .into_response()
            }
        }
    }
}

/// Run a blocking store call off the async workers.
async fn with_store<T, F>(store: &TranscriptStore, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&TranscriptStore) -> Result<T> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| VocalogError::Storage(format!("store task failed: {e}")))?
}

// ─── Handlers ──────────────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(views::INDEX_HTML)
}

async fn history(State(state): State<AppState>) -> std::result::Result<Html<String>, ApiError> {
    let rows = with_store(&state.store, |s| s.list_all()).await?;
    Ok(Html(views::history_page(&rows)))
}

/// Fields of the `/save` multipart form.
#[derive(Default)]
struct SaveForm {
    text: Option<String>,
    lang: Option<String>,
    audio: Option<Bytes>,
    audio_mime: Option<String>,
}

fn form_error(e: MultipartError) -> VocalogError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        VocalogError::TooLarge(format!("Upload too large: {}", e.body_text()))
    } else {
        VocalogError::Validation(format!("Malformed form data: {}", e.body_text()))
    }
}

async fn read_save_form(mut multipart: Multipart) -> Result<SaveForm> {
    let mut form = SaveForm::default();
    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" | "lang" => {
                let value = field.text().await.map_err(form_error)?;
                if name == "text" {
                    form.text = Some(value);
                } else {
                    form.lang = Some(value);
                }
            }
            // Only file parts count as audio.
            "audio" if field.file_name().is_some() => {
                form.audio_mime = field.content_type().map(str::to_string);
                form.audio = Some(field.bytes().await.map_err(form_error)?);
            }
            other => debug!("save: ignoring form field {other:?}"),
        }
    }
    Ok(form)
}

async fn save(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<StatusReply>, ApiError> {
    let missing = || VocalogError::Validation("Missing audio or text".into());

    let form = read_save_form(multipart.map_err(|_| missing())?).await?;
    let text = form.text.filter(|t| !t.trim().is_empty()).ok_or_else(missing)?;
    let audio = form.audio.filter(|a| !a.is_empty()).ok_or_else(missing)?;
    let lang = form
        .lang
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE_TAG.to_string());
    let format = AudioFormat::from_mime(form.audio_mime.as_deref());

    let id = with_store(&state.store, move |s| s.insert(&text, &lang, &audio, format)).await?;
    info!("saved transcript {id} ({})", format.as_str());
    Ok(Json(StatusReply::success("Saved audio inside DB!", id)))
}

async fn tts(
    State(state): State<AppState>,
    body: std::result::Result<Json<TtsRequest>, JsonRejection>,
) -> std::result::Result<Response, ApiError> {
    let Json(req) =
        body.map_err(|e| VocalogError::Validation(format!("Invalid JSON body: {e}")))?;
    let audio = state.synth.synthesize(&req.text, &req.lang).await?;
    Ok((
        [
            (header::CONTENT_TYPE, AudioFormat::Mp3.mime_type()),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"tts.mp3\""),
        ],
        audio,
    )
        .into_response())
}

/// Which of the two audio routes served the request; only the download
/// name differs.
#[derive(Debug, Clone, Copy)]
enum AudioRoute {
    Play,
    Audio,
}

impl AudioRoute {
    fn file_prefix(self) -> &'static str {
        match self {
            AudioRoute::Play => "audio",
            AudioRoute::Audio => "recording",
        }
    }
}

async fn play(state: State<AppState>, id: Path<String>) -> std::result::Result<Response, ApiError> {
    serve_audio(state, id, AudioRoute::Play).await
}

async fn audio(state: State<AppState>, id: Path<String>) -> std::result::Result<Response, ApiError> {
    serve_audio(state, id, AudioRoute::Audio).await
}

async fn serve_audio(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    route: AudioRoute,
) -> std::result::Result<Response, ApiError> {
    // Non-numeric ids never match a row.
    let id: i64 = raw_id.parse().map_err(|_| VocalogError::NotFound(0))?;
    let stored = with_store(&state.store, move |s| s.fetch_audio_by_id(id)).await?;

    let disposition = format!(
        "inline; filename=\"{}_{id}.{}\"",
        route.file_prefix(),
        stored.format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, stored.format.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        stored.bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::tts::tests::RecordingProvider;

    const BOUNDARY: &str = "vocalogtestboundary";

    struct Harness {
        _dir: tempfile::TempDir,
        app: Router,
        store: TranscriptStore,
        provider: Arc<RecordingProvider>,
    }

    fn harness_with(provider: RecordingProvider) -> Harness {
        harness_limited(provider, 1024 * 1024)
    }

    fn harness_limited(provider: RecordingProvider, max_upload_bytes: usize) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().join("voice_data.db")).unwrap();
        let provider = Arc::new(provider);
        let state = AppState {
            store: store.clone(),
            synth: Synthesizer::new(provider.clone()),
            max_upload_bytes,
        };
        Harness {
            _dir: dir,
            app: router(state),
            store,
            provider,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingProvider::default())
    }

    /// (name, filename+content type for file parts, value)
    fn multipart_body(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file, value) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file {
                Some((filename, mime)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {mime}\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(value);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn save_request(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/save")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn tts_request(json: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/tts")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(res: Response) -> Vec<u8> {
        axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(res: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(res).await).unwrap()
    }

    #[tokio::test]
    async fn index_renders() {
        let h = harness();
        let res = h.app.oneshot(get_request("/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(res).await).unwrap();
        assert!(html.contains("<h1>vocalog</h1>"));
    }

    #[tokio::test]
    async fn save_then_play_round_trips() {
        let h = harness();
        let audio: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let res = h
            .app
            .clone()
            .oneshot(save_request(&[
                ("text", None, b"hello there"),
                ("lang", None, b"en-US"),
                ("audio", Some(("blob.webm", "audio/webm")), &audio[..]),
            ]))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "Saved audio inside DB!");
        assert_eq!(json["id"], 1);

        let res = h.app.clone().oneshot(get_request("/play/1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "audio/webm");
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "inline; filename=\"audio_1.webm\""
        );
        assert_eq!(body_bytes(res).await, audio);

        let res = h.app.oneshot(get_request("/audio/1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "inline; filename=\"recording_1.webm\""
        );
        assert_eq!(body_bytes(res).await, audio);
    }

    #[tokio::test]
    async fn save_mp3_is_served_as_mpeg() {
        let h = harness();
        let res = h
            .app
            .clone()
            .oneshot(save_request(&[
                ("text", None, b"spoken"),
                ("lang", None, b"ar-IQ"),
                ("audio", Some(("tts.mp3", "audio/mpeg")), b"ID3fake"),
            ]))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = h.app.oneshot(get_request("/play/1")).await.unwrap();
        assert_eq!(res.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "inline; filename=\"audio_1.mp3\""
        );
    }

    #[tokio::test]
    async fn save_without_audio_is_rejected() {
        let h = harness();
        let res = h
            .app
            .oneshot(save_request(&[("text", None, b"hello"), ("lang", None, b"en-US")]))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Missing audio or text");
        assert_eq!(h.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn save_without_text_is_rejected() {
        let h = harness();
        let res = h
            .app
            .oneshot(save_request(&[
                ("lang", None, b"en-US"),
                ("audio", Some(("blob.webm", "audio/webm")), b"abc"),
            ]))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["status"], "error");
        assert_eq!(h.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn save_non_multipart_is_rejected() {
        let h = harness();
        let req = Request::builder()
            .method("POST")
            .uri("/save")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("text=hello&lang=en-US"))
            .unwrap();
        let res = h.app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["message"], "Missing audio or text");
        assert_eq!(h.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn save_ignores_audio_without_filename() {
        let h = harness();
        let res = h
            .app
            .oneshot(save_request(&[
                ("text", None, b"hello"),
                ("lang", None, b"en-US"),
                ("audio", None, b"not a file"),
            ]))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["message"], "Missing audio or text");
        assert_eq!(h.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn save_over_limit_is_413() {
        let h = harness_limited(RecordingProvider::default(), 256);
        let audio = vec![7u8; 4096];
        let res = h
            .app
            .oneshot(save_request(&[
                ("text", None, b"hello"),
                ("lang", None, b"en-US"),
                ("audio", Some(("blob.webm", "audio/webm")), &audio[..]),
            ]))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(res).await["status"], "error");
        assert_eq!(h.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn save_defaults_missing_lang() {
        let h = harness();
        let res = h
            .app
            .oneshot(save_request(&[
                ("text", None, b"no lang"),
                ("audio", Some(("blob.webm", "audio/webm")), b"abc"),
            ]))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(h.store.list_all().unwrap()[0].language, "en-US");
    }

    #[tokio::test]
    async fn missing_audio_is_404_on_both_routes() {
        let h = harness();
        for uri in ["/play/99", "/audio/99", "/play/abc"] {
            let res = h.app.clone().oneshot(get_request(uri)).await.unwrap();
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body_bytes(res).await, b"Audio not found");
        }
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let h = harness();
        h.store.insert("older entry", "en-US", b"a", AudioFormat::Webm).unwrap();
        h.store.insert("middle entry", "ar-IQ", b"b", AudioFormat::Webm).unwrap();
        let res = h
            .app
            .clone()
            .oneshot(save_request(&[
                ("text", None, b"newest entry"),
                ("lang", None, b"en-US"),
                ("audio", Some(("blob.webm", "audio/webm")), b"c"),
            ]))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = h.app.oneshot(get_request("/history")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(res).await).unwrap();
        let newest = html.find("newest entry").unwrap();
        let middle = html.find("middle entry").unwrap();
        let older = html.find("older entry").unwrap();
        assert!(newest < middle && middle < older);
    }

    #[tokio::test]
    async fn tts_returns_mp3_attachment() {
        let h = harness();
        let res = h
            .app
            .oneshot(tts_request(serde_json::json!({"text": "  hello  ", "lang": "ar-IQ"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"tts.mp3\""
        );
        assert_eq!(body_bytes(res).await, b"hello");
        assert_eq!(
            h.provider.calls.lock().unwrap().as_slice(),
            &[("hello".to_string(), "ar".to_string())]
        );
    }

    #[tokio::test]
    async fn tts_defaults_lang_to_english() {
        let h = harness();
        let res = h
            .app
            .oneshot(tts_request(serde_json::json!({"text": "hi"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(h.provider.calls.lock().unwrap()[0].1, "en");
    }

    #[tokio::test]
    async fn tts_blank_text_is_400_without_provider_call() {
        let h = harness();
        let res = h
            .app
            .oneshot(tts_request(serde_json::json!({"text": "   ", "lang": "en-US"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "No text provided");
        assert!(h.provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tts_provider_failure_is_500() {
        let h = harness_with(RecordingProvider {
            fail_with: Some("Failed to connect. Probable cause: dns".into()),
            ..Default::default()
        });
        let res = h
            .app
            .oneshot(tts_request(serde_json::json!({"text": "hello"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Failed to connect. Probable cause: dns");
    }
}
