use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::info;

use stocktake_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await?;
    }
    let db_arc = Arc::new(db_pool);

    // Change notifications and the store gateway publishing on them
    let feed = api::events::ChangeFeed::new(cfg.view.event_buffer);
    let store = Arc::new(api::store::InventoryStore::new(
        db_arc.clone(),
        feed,
        cfg.bulk.max_rows_per_request,
    ));

    // Workflow services
    let reconciler = Arc::new(api::services::scan::ScanReconciler::new(store.clone()));
    let importer = Arc::new(api::services::import::BulkImporter::new(
        store.clone(),
        cfg.bulk.effective_chunk_size(),
    ));
    let exporter = Arc::new(api::services::export::BulkExporter::new(
        store.clone(),
        cfg.bulk.effective_page_size(),
    ));

    // Background live-view synchronizer
    let view = api::services::sync::LiveViewSynchronizer::new(store.clone(), &cfg.view).spawn();

    let state = api::AppState {
        db: db_arc,
        config: cfg.clone(),
        store,
        reconciler,
        importer,
        exporter,
        view,
    };

    let app = Router::new()
        .nest("/api/v1", api::api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = cfg.server_addr().parse()?;
    info!("stocktake-api listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("Shutdown signal received");
}
