use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use retrieval_config::RetrievalConfig;
use retrieval_core::blob::UrlBlobStore;
use retrieval_core::clock::SystemClock;
use retrieval_core::embedding::HttpEmbeddingClient;
use retrieval_core::engine::RetrievalEngine;
use retrieval_core::store::PgMetadataStore;
use retrieval_core::vector_index::QdrantVectorIndex;
use retrieval_observability::{info, init_tracing, observability, TracingConfig};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Semaphore;

use retrieval_server::handlers;
use retrieval_server::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_tracing(TracingConfig::for_service("retrieval-server"));

    let config = RetrievalConfig::from_env();

    info!("connecting to metadata store...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let store = PgMetadataStore::new(pool);
    store
        .migrate()
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let store: Arc<dyn retrieval_core::store::MetadataStore> = Arc::new(store);

    let vectors: Arc<dyn retrieval_core::vector_index::VectorIndex> = Arc::new(QdrantVectorIndex::new(
        config.vector_index.clone(),
        config.timeouts.vector_search(),
    ));

    let embeddings = Arc::new(HttpEmbeddingClient::new(
        config.multimodal_worker_url.clone(),
        config.timeouts.embedding(),
        config.vector_index.vector_size,
    ));

    let blobs = Arc::new(UrlBlobStore::new(config.blob_base_url.clone()));
    let clock = Arc::new(SystemClock);

    let engine = Arc::new(RetrievalEngine::new(
        store.clone(),
        blobs,
        vectors.clone(),
        embeddings,
        clock,
        config.clone(),
    ));

    let inbound_semaphore = Arc::new(Semaphore::new(config.concurrency.inbound));

    let port: u16 = std::env::var("RETRIEVAL_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8085);
    let host = std::env::var("RETRIEVAL_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    info!(port, host = %host, "starting retrieval-server");

    let app_state = web::Data::new(AppState {
        engine,
        store,
        vectors,
        config,
        inbound_semaphore,
    });

    HttpServer::new(move || {
        App::new()
            .wrap(observability("retrieval-server"))
            .app_data(app_state.clone())
            .route("/health", web::get().to(handlers::health::health))
            .route("/search", web::post().to(handlers::search::search))
            .route("/similar/{document_id}", web::get().to(handlers::similar::similar))
            .route(
                "/context-bundle",
                web::post().to(handlers::context_bundle::context_bundle),
            )
            .route("/index", web::post().to(handlers::index::index_content))
            .route(
                "/content/{document_id}",
                web::delete().to(handlers::delete::delete_content),
            )
            .route("/stats", web::get().to(handlers::stats::stats))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
