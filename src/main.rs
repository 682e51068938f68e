use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mowa_analytics::config::AppConfig;
use mowa_analytics::ingest::Tailer;
use mowa_analytics::store::Store;
use mowa_analytics::{compaction, handlers, summarizer, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mowa_analytics=info,tower_http=info")),
        )
        .init();

    let config_path = std::env::var("MOWA_CONFIG").unwrap_or_else(|_| "./mowa.toml".to_string());
    let config = Arc::new(AppConfig::load(&config_path)?);

    let db_path = std::path::Path::new(&config.storage.db_path).join(&config.storage.db_name);
    let store = Store::open(&db_path)?;
    tracing::info!("store opened at {}", db_path.display());

    let running = Arc::new(AtomicBool::new(true));

    for (index, source) in config.sources.iter().cloned().enumerate() {
        let tailer = Tailer::new(
            index,
            source,
            &config.server.state_dir,
            config.server.logs_read_interval_secs,
        );
        let store = store.clone();
        let filters = config.filters.clone();
        let running = running.clone();
        tokio::spawn(async move { tailer.run(store, filters, running).await });
    }

    tokio::spawn(compaction::run(
        store.clone(),
        config.retention.clone(),
        running.clone(),
    ));
    tokio::spawn(summarizer::run(
        store.clone(),
        config.server.deterministic_workers,
        running.clone(),
    ));

    let state = AppState {
        store: store.clone(),
        config: config.clone(),
    };

    let app = Router::new()
        .route(
            "/stats_app_intra",
            get(handlers::intra::stats_app_intra).post(handlers::intra::stats_app_intra),
        )
        .route(
            "/stats_app_day",
            get(handlers::day::stats_app_day).post(handlers::day::stats_app_day),
        )
        .route(
            "/stats_app_week",
            get(handlers::week::stats_app_week).post(handlers::week::stats_app_week),
        )
        .route(
            "/stats_app_month",
            get(handlers::month::stats_app_month).post(handlers::month::stats_app_month),
        )
        .route("/stats_modules_list", get(handlers::admin::stats_modules_list))
        .route(
            "/stats_admin_list_mergemodules",
            get(handlers::admin::stats_admin_list_mergemodules),
        )
        .route(
            "/stats_admin_do_mergemodules",
            get(handlers::admin::stats_admin_do_mergemodules),
        )
        .route("/healthz", get(handlers::health::healthz))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.listening_port));
    tracing::info!("mowa-analytics listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(running, store))
        .await?;

    Ok(())
}

/// Waits for Ctrl-C, clears the cooperative run flag so the tailer,
/// compaction, and summariser loops exit their own tick loops, then drains
/// the writer mutex for a final sync before the process returns.
async fn shutdown_signal(running: Arc<AtomicBool>, store: Store) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to install ctrl_c handler: {e}");
        return;
    }
    tracing::info!("shutdown signal received, draining");
    running.store(false, Ordering::SeqCst);
    let _guard = store.lock_writer().await;
    if let Err(e) = store.sync() {
        tracing::warn!("final sync failed: {e}");
    }
}
