use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mediarelay_core::pipeline::PipelineRunner;
use mediarelay_core::probe::create_probe;
use mediarelay_core::progress::ProgressReporter;
use mediarelay_core::storage::StorageArena;
use mediarelay_core::transcoder::{EncoderCapabilities, FfmpegTranscoder, Transcoder};
use mediarelay_core::transport::create_transport;
use mediarelay_core::{load_config, validate_config, Scheduler};

use mediarelay_server::api::create_router;
use mediarelay_server::state::{AppState, Relay};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` filtering, JSON lines when `MEDIARELAY_LOG_FORMAT=json`.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let json = std::env::var("MEDIARELAY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    info!(version = VERSION, "Starting mediarelay");

    // Determine config path
    let config_path = std::env::var("MEDIARELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;
    info!(
        workers = config.scheduler.workers,
        max_in_flight = config.scheduler.max_in_flight,
        per_user_limit = config.scheduler.per_user_limit,
        "Configuration loaded successfully"
    );

    // Scratch space, cleared of anything a previous run left behind
    let storage = StorageArena::new(config.storage.clone());
    let sweep = storage
        .init()
        .await
        .with_context(|| format!("Failed to prepare scratch root {:?}", storage.root()))?;
    info!(
        root = ?storage.root(),
        removed = sweep.removed,
        kept = sweep.kept,
        "Scratch storage initialized"
    );

    // Transport
    let transport = create_transport(&config.transport).context("Failed to create transport")?;
    info!("Using transport: {}", transport.name());

    // Probe
    let probe = create_probe(&config.probe);
    if let Err(e) = probe.validate().await {
        warn!(error = %e, "Probe tool not usable; jobs will fail at analysis");
    }
    info!("Using probe: {}", probe.name());

    // Transcoder
    let capabilities = EncoderCapabilities::detect(&config.transcoder).await;
    let transcoder: Arc<dyn Transcoder> = Arc::new(
        FfmpegTranscoder::new(config.transcoder.clone()).with_capabilities(capabilities.clone()),
    );
    if let Err(e) = transcoder.validate().await {
        warn!(error = %e, "Transcoder not usable; jobs will fail at processing");
    }

    // Progress reporter
    let progress = ProgressReporter::spawn(config.progress.clone(), Arc::clone(&transport));
    info!("Progress reporter started");

    // Pipeline and scheduler
    let runner: Relay = PipelineRunner::new(
        config.pipeline.clone(),
        probe,
        transcoder,
        transport,
        storage.clone(),
    )
    .with_progress(progress.clone())
    .with_capabilities(capabilities);

    let scheduler = Arc::new(Scheduler::new(config.scheduler.clone(), Arc::new(runner)));
    scheduler.start();

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&scheduler),
        storage,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    scheduler
        .stop(Duration::from_secs(config.server.shutdown_grace_secs))
        .await;
    progress.shutdown();
    info!("Progress reporter stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
