//! HTTP surface for browser-based practice sessions.

use std::path::Path;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use fluency_core::{
    ConversationStore, FailureKind, TurnFailure, TurnOrchestrator, TurnResult, TurnStage,
};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const ANONYMOUS_USER: &str = "anonymous";

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<TurnOrchestrator>,
    max_upload_bytes: usize,
}

impl AppState {
    pub const fn new(orchestrator: Arc<TurnOrchestrator>) -> Self {
        Self {
            orchestrator,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    #[must_use]
    pub const fn with_upload_limit(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

#[derive(Debug, Serialize)]
struct ProcessAudioResponse {
    user_text: String,
    ai_text: String,
    audio_base64: Option<String>,
}

impl From<TurnResult> for ProcessAudioResponse {
    fn from(result: TurnResult) -> Self {
        Self {
            user_text: result.transcript,
            ai_text: result.reply_text,
            audio_base64: result.reply_audio.map(|bytes| STANDARD.encode(bytes)),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: FailureKind,
    stage: TurnStage,
}

fn failure_response(failure: TurnFailure) -> Response {
    let status = match failure.kind {
        FailureKind::InvalidInput => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody {
        error: failure.message,
        kind: failure.kind,
        stage: failure.stage,
    };
    (status, Json(body)).into_response()
}

struct Upload {
    user_id: String,
    audio: Vec<u8>,
}

/// Why a `/process-audio` form could not be read.
enum UploadError {
    Form(MultipartError),
    MissingFile,
}

impl From<MultipartError> for UploadError {
    fn from(e: MultipartError) -> Self {
        Self::Form(e)
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        // Oversized bodies keep the 413 axum assigns to the length limit.
        let (status, error) = match self {
            Self::Form(e) => (e.status(), e.body_text()),
            Self::MissingFile => (
                StatusCode::BAD_REQUEST,
                "No audio file in request".to_string(),
            ),
        };
        let body = ErrorBody {
            error,
            kind: FailureKind::InvalidInput,
            stage: TurnStage::Received,
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router. `assets` holds `static/` and `templates/index.html`.
pub fn router(state: AppState, assets: &Path) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .route("/process-audio", post(process_audio))
        .route("/history/:user_id", get(history))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new(assets.join("static")))
        .route_service("/", ServeFile::new(assets.join("templates").join("index.html")))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState, assets: &Path) -> anyhow::Result<()> {
    let app = router(state, assets);
    let listener = TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, UploadError> {
    let mut user_id = None;
    let mut audio = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => audio = Some(field.bytes().await?.to_vec()),
            "user_id" => user_id = Some(field.text().await?),
            other => warn!("Ignoring unexpected form field: {other}"),
        }
    }

    let audio = audio.ok_or(UploadError::MissingFile)?;
    let user_id = user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| ANONYMOUS_USER.to_string());

    Ok(Upload { user_id, audio })
}

async fn process_audio(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let upload = match read_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err(e) => return e.into_response(),
    };

    info!(
        "Received {} bytes of audio from {}",
        upload.audio.len(),
        upload.user_id
    );

    match state
        .orchestrator
        .process_turn(&upload.user_id, &upload.audio)
        .await
    {
        Ok(result) => Json(ProcessAudioResponse::from(result)).into_response(),
        Err(failure) => failure_response(failure),
    }
}

async fn history(State(state): State<AppState>, UrlPath(user_id): UrlPath<String>) -> Response {
    match state.orchestrator.store().load(&user_id).await {
        Ok(record) => {
            let turns = record.map(|r| r.history).unwrap_or_default();
            Json(turns).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[expect(clippy::unused_async, reason = "axum handlers are async functions")]
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fluency_core::{
        ArtifactDir, AudioFormat, ChatMessage, GenerationParams, InMemoryConversationStore,
        LLMProvider, LLMResponse, ResponseGenerator, SpeechSynthesizer, SpeechToText,
        TextToSpeech, Transcriber, VoiceSelection,
    };
    use reqwest::multipart::{Form, Part};
    use tempfile::TempDir;

    const REPLY: &str = "Lovely. Say it once more, slowly.";

    struct EchoStt;

    #[async_trait]
    impl SpeechToText for EchoStt {
        async fn transcribe(
            &self,
            audio: &[u8],
            _file_name: &str,
            _language: &str,
        ) -> anyhow::Result<String> {
            Ok(String::from_utf8_lossy(audio).into_owned())
        }
    }

    struct ScriptedLlm {
        fail: bool,
    }

    #[async_trait]
    impl LLMProvider for ScriptedLlm {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _params: &GenerationParams,
        ) -> anyhow::Result<LLMResponse> {
            if self.fail {
                anyhow::bail!("model unavailable");
            }
            Ok(LLMResponse {
                content: REPLY.to_string(),
                usage: None,
            })
        }
    }

    struct FakeTts;

    #[async_trait]
    impl TextToSpeech for FakeTts {
        async fn synthesize(&self, _text: &str, _voice: &VoiceSelection) -> anyhow::Result<Vec<u8>> {
            Ok(b"ID3-fake".to_vec())
        }

        fn output_format(&self) -> AudioFormat {
            AudioFormat::Mp3
        }
    }

    struct TestServer {
        base: String,
        client: reqwest::Client,
        _dir: TempDir,
    }

    impl TestServer {
        async fn start(llm_fails: bool) -> Self {
            Self::start_with_limit(llm_fails, MAX_UPLOAD_BYTES).await
        }

        #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
        async fn start_with_limit(llm_fails: bool, max_upload_bytes: usize) -> Self {
            let dir = TempDir::new().expect("temp dir");
            std::fs::create_dir_all(dir.path().join("static")).expect("static dir");
            std::fs::create_dir_all(dir.path().join("templates")).expect("templates dir");
            std::fs::create_dir_all(dir.path().join("artifacts")).expect("artifact dir");
            std::fs::write(dir.path().join("static").join("app.js"), "console.log('hi');")
                .expect("write js");
            std::fs::write(
                dir.path().join("templates").join("index.html"),
                "<h1>Practice</h1>",
            )
            .expect("write index");

            let stt: Arc<dyn SpeechToText> = Arc::new(EchoStt);
            let llm: Arc<dyn LLMProvider> = Arc::new(ScriptedLlm { fail: llm_fails });
            let tts: Arc<dyn TextToSpeech> = Arc::new(FakeTts);
            let orchestrator = TurnOrchestrator::new(
                Transcriber::new(stt, "en"),
                ResponseGenerator::new(llm, GenerationParams::default()),
                SpeechSynthesizer::new(tts, VoiceSelection::default()),
                Arc::new(InMemoryConversationStore::new()),
            )
            .with_artifact_dir(ArtifactDir::new(dir.path().join("artifacts")));

            let state = AppState::new(Arc::new(orchestrator)).with_upload_limit(max_upload_bytes);
            let app = router(state, dir.path());
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            let addr = listener.local_addr().expect("local addr");
            tokio::spawn(async move { axum::serve(listener, app).await });

            Self {
                base: format!("http://{addr}"),
                client: reqwest::Client::new(),
                _dir: dir,
            }
        }

        #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
        async fn post_audio(&self, form: Form) -> (reqwest::StatusCode, serde_json::Value) {
            let response = self
                .client
                .post(format!("{}/process-audio", self.base))
                .multipart(form)
                .send()
                .await
                .expect("send");
            let status = response.status();
            (status, response.json().await.expect("json body"))
        }
    }

    fn recording(text: &str, user_id: Option<&str>) -> Form {
        let part = Part::bytes(text.as_bytes().to_vec()).file_name("recording.webm");
        let form = Form::new().part("file", part);
        match user_id {
            Some(id) => form.text("user_id", id.to_string()),
            None => form,
        }
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn process_audio_returns_text_and_encoded_audio() {
        let server = TestServer::start(false).await;

        let (status, body) = server.post_audio(recording("Hi, I'm Sam", Some("sam"))).await;

        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body["user_text"], "Hi, I'm Sam");
        assert_eq!(body["ai_text"], REPLY);
        let audio = STANDARD
            .decode(body["audio_base64"].as_str().expect("audio field"))
            .expect("base64");
        assert_eq!(audio, b"ID3-fake");
    }

    #[tokio::test]
    async fn silent_recording_gets_fallback_without_audio() {
        let server = TestServer::start(false).await;

        let (status, body) = server.post_audio(recording("   ", Some("sam"))).await;

        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body["user_text"], "");
        assert_eq!(body["ai_text"], "I couldn't hear you.");
        assert!(body["audio_base64"].is_null());
    }

    #[tokio::test]
    async fn missing_file_is_a_bad_request() {
        let server = TestServer::start(false).await;

        let form = Form::new().text("user_id", "sam");
        let (status, body) = server.post_audio(form).await;

        assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_input");
        assert_eq!(body["stage"], "received");
    }

    #[tokio::test]
    async fn oversized_upload_is_payload_too_large() {
        let server = TestServer::start_with_limit(false, 1024).await;

        let part = Part::bytes(vec![b'a'; 8 * 1024]).file_name("recording.webm");
        let (status, body) = server.post_audio(Form::new().part("file", part)).await;

        assert_eq!(status, reqwest::StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["kind"], "invalid_input");
        assert_eq!(body["stage"], "received");
    }

    #[tokio::test]
    async fn generation_failure_is_reported_with_stage() {
        let server = TestServer::start(true).await;

        let (status, body) = server.post_audio(recording("Hello", Some("sam"))).await;

        assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["kind"], "generation_failure");
        assert_eq!(body["stage"], "generating");
        assert!(
            body["error"]
                .as_str()
                .is_some_and(|e| e.contains("model unavailable"))
        );
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn history_lists_turns_per_user() {
        let server = TestServer::start(false).await;
        server.post_audio(recording("Hello", None)).await;
        server.post_audio(recording("Red lorry", Some("sam"))).await;

        let turns: Vec<serde_json::Value> = server
            .client
            .get(format!("{}/history/anonymous", server.base))
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("json");

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0]["role"], "user");
        assert_eq!(turns[0]["content"], "Hello");
        assert_eq!(turns[1]["role"], "assistant");
        assert!(turns[1]["timestamp"].is_string());

        let unknown: Vec<serde_json::Value> = server
            .client
            .get(format!("{}/history/nobody", server.base))
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("json");
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn serves_health_page_and_static_files() {
        let server = TestServer::start(false).await;

        let health: serde_json::Value = server
            .client
            .get(format!("{}/health", server.base))
            .send()
            .await
            .expect("send")
            .json()
            .await
            .expect("json");
        assert_eq!(health["status"], "ok");

        let index = server
            .client
            .get(format!("{}/", server.base))
            .send()
            .await
            .expect("send")
            .text()
            .await
            .expect("text");
        assert_eq!(index, "<h1>Practice</h1>");

        let script = server
            .client
            .get(format!("{}/static/app.js", server.base))
            .send()
            .await
            .expect("send");
        assert_eq!(script.status(), reqwest::StatusCode::OK);
    }
}
