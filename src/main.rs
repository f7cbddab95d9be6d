use clap::Parser;
use dotenvy::dotenv;
use rust_media_backend::config::AppConfig;
use rust_media_backend::infrastructure::{database, storage};
use rust_media_backend::observability::Metrics;
use rust_media_backend::services::dispatch::{JobDispatcher, processing_channel};
use rust_media_backend::services::media_service::MediaService;
use rust_media_backend::services::preview_worker::PreviewWorker;
use rust_media_backend::services::quota::QuotaAccountant;
use rust_media_backend::services::storage::ObjectStore;
use rust_media_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run (api, worker, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_media_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Rust Media Backend [Mode: {}]...", args.mode);

    let config = AppConfig::from_env();
    let db = database::setup_database().await?;
    let object_store: Arc<dyn ObjectStore> = storage::setup_storage().await?;
    let metrics = Metrics::new();

    let (dispatcher, jobs_rx) = processing_channel(config.job_queue_capacity);
    let dispatcher: Arc<dyn JobDispatcher> = Arc::new(dispatcher);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    if args.mode == "worker" || args.mode == "all" {
        let worker = PreviewWorker::new(db.clone(), object_store.clone(), metrics.clone());
        let worker_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            worker.run(jobs_rx, worker_shutdown).await;
        }));
        info!("👷 Preview worker initialized.");
    } else {
        // No consumer: dispatch fails fast and gets counted instead of
        // filling the channel.
        drop(jobs_rx);
        warn!("Running without a preview worker; processing jobs will not be consumed");
    }

    if args.mode == "api" || args.mode == "all" {
        let quota = QuotaAccountant::new(db.clone());
        let media_service = Arc::new(MediaService::new(
            db.clone(),
            object_store.clone(),
            quota,
            dispatcher.clone(),
            metrics.clone(),
            Duration::from_secs(config.signed_url_ttl_secs),
        ));

        let state = AppState {
            db: db.clone(),
            storage: object_store.clone(),
            media_service,
            metrics: metrics.clone(),
            config: config.clone(),
        };

        let app = create_app(state).layer(TraceLayer::new_for_http());
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
        info!(
            "📖 Swagger UI documentation: http://localhost:{}/swagger-ui",
            args.port
        );

        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_signal().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        });
        handles.push(server_handle);
    }

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down backend services...");

    for handle in handles {
        let _ = handle.await;
    }

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
