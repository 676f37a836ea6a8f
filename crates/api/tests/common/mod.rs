#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use crickcast_core::assembly::AssemblyInputs;
use crickcast_core::ffmpeg::FfmpegError;
use crickcast_events::{CompletedVideoLog, EventBus, NotificationListener, PendingWaits, PushArchive};
use crickcast_pipeline::commentary::CommentaryError;
use crickcast_pipeline::speech::SpeechError;
use crickcast_pipeline::{
    Assembler, AvatarVideoSource, CommentaryGenerator, HighlightPipeline, HighlightServices,
    MatchCatalog, ProgressStore, SpeechSynthesizer,
};
use crickcast_videogen::{
    RenderError, RenderStage, RenderedVideo, ResolvedVia, VideoGenApi, VideoGenApiError,
    VideoGenConfig, WaitControl,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crickcast_api::config::ServerConfig;
use crickcast_api::router::build_app_router;
use crickcast_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(data_dir: &Path, output_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5200".to_string()],
        request_timeout_secs: 30,
        data_dir: data_dir.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        progress_ttl_secs: 3600,
        completed_videos_file: None,
        webhook_log_dir: Some(output_dir.join("webhook_logs")),
    }
}

// ---------------------------------------------------------------------------
// Service stubs
// ---------------------------------------------------------------------------

struct StubCommentary;

#[async_trait]
impl CommentaryGenerator for StubCommentary {
    async fn generate(&self, _prompt: &str) -> Result<String, CommentaryError> {
        Ok("Kohli anchors the chase!".into())
    }
}

struct StubSpeech;

#[async_trait]
impl SpeechSynthesizer for StubSpeech {
    async fn synthesize(&self, _text: &str, dest: &Path) -> Result<(), SpeechError> {
        tokio::fs::write(dest, b"ID3").await?;
        Ok(())
    }
}

struct StubAvatar;

#[async_trait]
impl AvatarVideoSource for StubAvatar {
    async fn render(
        &self,
        _audio: &Path,
        _title: &str,
        _control: &WaitControl,
        on_stage: &(dyn Fn(RenderStage) + Send + Sync),
    ) -> Result<RenderedVideo, RenderError> {
        on_stage(RenderStage::UploadingAudio);
        on_stage(RenderStage::Submitting);
        on_stage(RenderStage::Waiting { job_id: "V1".into() });
        Ok(RenderedVideo {
            job_id: "V1".into(),
            correlation_id: None,
            video_url: "https://video/V1.mp4".into(),
            via: ResolvedVia::Poll,
        })
    }

    async fn download(&self, _url: &str, dest: &Path) -> Result<u64, VideoGenApiError> {
        tokio::fs::write(dest, b"avatar-video").await?;
        Ok(12)
    }
}

struct StubAssembler;

#[async_trait]
impl Assembler for StubAssembler {
    async fn assemble(&self, inputs: &AssemblyInputs) -> Result<PathBuf, FfmpegError> {
        tokio::fs::write(&inputs.output, b"final-video").await?;
        Ok(inputs.output.clone())
    }
}

// ---------------------------------------------------------------------------
// Test application
// ---------------------------------------------------------------------------

/// A fully layered router plus the handles tests need to drive it.
pub struct TestApp {
    pub router: Router,
    pub listener: NotificationListener,
    pub data_dir: tempfile::TempDir,
    pub output_dir: tempfile::TempDir,
    pub cancel: CancellationToken,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn webhook_log_dir(&self) -> PathBuf {
        self.output_dir.path().join("webhook_logs")
    }

    pub fn match_folder(&self) -> PathBuf {
        self.output_dir.path().join("2024").join("match_1_CSK_vs_RCB")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Build the application router with stubbed external services and a
/// 2024 catalogue holding two matches.
///
/// `video_service_url` backs the avatar listing; pass a wiremock URI when
/// the test exercises it.
pub async fn build_test_app(video_service_url: &str) -> TestApp {
    let data_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        data_dir.path().join("ipl_2024.json"),
        json!([
            {"teams": ["CSK", "RCB"], "venue": "Chepauk"},
            {"teams": ["MI", "KKR"], "venue": "Wankhede"}
        ])
        .to_string(),
    )
    .unwrap();

    let config = test_config(data_dir.path(), output_dir.path());
    let cancel = CancellationToken::new();

    let event_bus = Arc::new(EventBus::default());
    let listener = NotificationListener::new(Arc::new(PendingWaits::new()), Arc::clone(&event_bus));

    let video_log = Arc::new(CompletedVideoLog::in_memory());
    tokio::spawn({
        let video_log = Arc::clone(&video_log);
        let receiver = event_bus.subscribe();
        let cancel = cancel.clone();
        async move { video_log.run(receiver, cancel).await }
    });

    let video_api = Arc::new(VideoGenApi::new(&VideoGenConfig {
        api_key: "test-key".into(),
        base_url: video_service_url.into(),
        upload_url: video_service_url.into(),
        avatar_id: "a1".into(),
        width: 1280,
        height: 720,
        test_mode: true,
        webhook_url: None,
    }));

    let pipeline = Arc::new(HighlightPipeline::new(
        MatchCatalog::new(data_dir.path()),
        output_dir.path(),
        HighlightServices {
            commentary: Arc::new(StubCommentary),
            speech: Arc::new(StubSpeech),
            avatar: Arc::new(StubAvatar),
            assembler: Arc::new(StubAssembler),
        },
        Arc::new(ProgressStore::new(Duration::from_secs(config.progress_ttl_secs))),
        cancel.child_token(),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        listener: listener.clone(),
        push_archive: config.webhook_log_dir.clone().map(PushArchive::new),
        pipeline,
        video_log,
        video_api,
        push_available: false,
    };

    TestApp {
        router: build_app_router(state, &config),
        listener,
        data_dir,
        output_dir,
        cancel,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll the status endpoint until the job reaches a terminal state.
pub async fn wait_for_terminal(app: &TestApp, job_id: &str) -> Value {
    for _ in 0..500 {
        let response = get(app.app(), &format!("/api/v1/highlights/{job_id}")).await;
        if response.status().is_success() {
            let json = body_json(response).await;
            let status = json["data"]["status"].as_str().unwrap_or_default().to_string();
            if status == "complete" || status == "error" {
                return json;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("highlight {job_id} did not finish");
}
