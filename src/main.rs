// Staff hub backend - HTTP entry point

use std::fmt::Write as FmtWrite;
use std::fs::OpenOptions;
use std::io::LineWriter;
use std::sync::Arc;

use tokio::signal::ctrl_c;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use staff_hub_backend::config::Config;
use staff_hub_backend::services::{
    CoalescingService, ConnectionPool, NotionService, PgCache, PgDirectStore, Reconciler,
};
use staff_hub_backend::{app, AppState};

/// Custom time formatter: [HH:mm:ss] [backend]
#[derive(Clone)]
struct BackendTimer;

impl FormatTime for BackendTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "[{}] [backend]", now.format("%H:%M:%S"))
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables (LOG_FILE is needed before tracing starts)
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Wrap in LineWriter to flush after each line
    let (file_layer, _guard) = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(LineWriter::new(file));
            let layer = fmt::layer()
                .with_timer(BackendTimer)
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer.boxed()), Some(guard))
        }
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", config.log_file, e);
            (None, None)
        }
    };

    // Format: [HH:mm:ss] [backend] message
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staff_hub_backend=info,tower_http=info".into()),
        )
        .with(
            fmt::layer()
                .with_timer(BackendTimer)
                .with_target(false)
                .with_ansi(true),
        )
        .with(file_layer)
        .init();

    if let Err(e) = config.validate() {
        tracing::error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Notion is required; a client that cannot be built is fatal
    let notion = match NotionService::new(config.notion.clone()) {
        Ok(notion) => Arc::new(notion),
        Err(e) => {
            tracing::error!("Failed to initialize Notion client: {}", e);
            std::process::exit(1);
        }
    };

    let mut pools = Vec::new();
    let mut service = CoalescingService::new(notion, config.timezone, config.sync_mode);

    if let Some(url) = &config.database_url {
        let pool = Arc::new(ConnectionPool::new("cache", url.clone(), config.pool.clone()));
        service = service.with_cache(Arc::new(PgCache::new(pool.clone())));
        pools.push(pool);
    }
    if let Some(url) = &config.direct_database_url {
        let pool = Arc::new(ConnectionPool::new("direct", url.clone(), config.pool.clone()));
        service = service.with_direct(Arc::new(PgDirectStore::new(pool.clone())));
        pools.push(pool);
    }

    let service = Arc::new(service);
    service.initialize().await;

    // Reconciliation sweep
    let reconciler = config.reconcile_interval.map(|interval| {
        let reconciler = Arc::new(Reconciler::new(service.clone(), interval));
        let handle = reconciler.shutdown_handle();
        let task = tokio::spawn({
            let reconciler = reconciler.clone();
            async move { reconciler.run().await }
        });
        (handle, task)
    });

    let state = AppState {
        service,
        config: Arc::new(config.clone()),
    };

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting staff hub backend on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    if let Some((handle, task)) = reconciler {
        handle.notify_one();
        if let Err(e) = task.await {
            tracing::warn!("Reconciler task ended abnormally: {}", e);
        }
    }

    for pool in pools {
        pool.close().await;
    }

    tracing::info!("Staff hub backend stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
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
