use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crickcast_core::assembly::AssemblyConfig;
use crickcast_core::wait_config::WaitConfig;
use crickcast_events::{CompletedVideoLog, EventBus, NotificationListener, PendingWaits, PushArchive};
use crickcast_pipeline::{
    CommentaryConfig, ElevenLabsClient, FfmpegAssembler, GeminiClient, HighlightPipeline,
    HighlightServices, MatchCatalog, ProgressStore, SpeechConfig,
};
use crickcast_videogen::{VideoGenConfig, VideoGenService};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crickcast_api::config::ServerConfig;
use crickcast_api::router::build_app_router;
use crickcast_api::state::AppState;

/// How often finished highlight jobs are checked for expiry.
const EVICTION_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crickcast_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    let wait_config = WaitConfig::from_env().expect("Invalid wait configuration");
    let video_config = VideoGenConfig::from_env().expect("Invalid video service configuration");
    let commentary_config = CommentaryConfig::from_env().expect("Invalid commentary configuration");
    let speech_config = SpeechConfig::from_env().expect("Invalid speech configuration");
    let assembly_config = AssemblyConfig::from_env().expect("Invalid assembly configuration");
    tracing::info!(
        host = %config.host,
        port = config.port,
        push_enabled = wait_config.push_enabled,
        poll_interval_secs = wait_config.poll_interval.as_secs(),
        "Loaded configuration",
    );

    // --- Push completion ---
    let event_bus = Arc::new(EventBus::default());
    let listener = NotificationListener::new(Arc::new(PendingWaits::new()), Arc::clone(&event_bus));

    let video_service = Arc::new(VideoGenService::new(video_config, &wait_config, listener.clone()));
    let push_available = video_service.push_available();
    let push_archive = config.webhook_log_dir.clone().map(PushArchive::new);
    match &push_archive {
        Some(archive) => tracing::info!(dir = %archive.dir().display(), "Archiving inbound pushes"),
        None => tracing::info!("Push archiving disabled"),
    }
    let video_api = Arc::new(video_service.api().clone());

    // --- Background services ---
    let shutdown = CancellationToken::new();

    let video_log = Arc::new(CompletedVideoLog::open(config.completed_videos_file.clone()).await);
    let log_handle = tokio::spawn({
        let video_log = Arc::clone(&video_log);
        let receiver = event_bus.subscribe();
        let cancel = shutdown.child_token();
        async move { video_log.run(receiver, cancel).await }
    });

    let progress = Arc::new(ProgressStore::new(Duration::from_secs(config.progress_ttl_secs)));
    let eviction_handle = tokio::spawn({
        let progress = Arc::clone(&progress);
        let cancel = shutdown.child_token();
        async move { progress.run_eviction(EVICTION_INTERVAL, cancel).await }
    });

    // --- Pipeline ---
    let pipeline = Arc::new(HighlightPipeline::new(
        MatchCatalog::new(&config.data_dir),
        &config.output_dir,
        HighlightServices {
            commentary: Arc::new(GeminiClient::new(commentary_config)),
            speech: Arc::new(ElevenLabsClient::new(speech_config)),
            avatar: video_service,
            assembler: Arc::new(FfmpegAssembler::new(assembly_config)),
        },
        progress,
        shutdown.child_token(),
    ));
    tracing::info!(push_available, "Highlight pipeline ready");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        listener,
        push_archive,
        pipeline,
        video_log,
        video_api,
        push_available,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let tcp = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Aborts in-flight render waits and stops the background tasks.
    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), log_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), eviction_handle).await;
    drop(event_bus);

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
