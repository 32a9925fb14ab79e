//! HTTP-level integration tests for the retrieval surface, covering the
//! pure-text, cross-modal, degraded-embedding, partial-failure,
//! dangling-reference, and re-index scenarios (S1-S6). Exercises the
//! real `actix_web` routing and JSON envelopes against the in-memory
//! fakes — there is no live Postgres or Qdrant here.

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{test, web, App};
use retrieval_config::RetrievalConfig;
use retrieval_core::blob::UrlBlobStore;
use retrieval_core::clock::SystemClock;
use retrieval_core::domain::{ContentFields, ContentKind, DocumentKind, Modality, NewDocument, VectorRecord};
use retrieval_core::embedding::StubEmbeddingClient;
use retrieval_core::engine::RetrievalEngine;
use retrieval_core::store::{InMemoryMetadataStore, MetadataStore, PutDocumentOutcome};
use retrieval_core::vector_index::{InMemoryVectorIndex, VectorIndex};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use uuid::Uuid;

use retrieval_server::handlers;
use retrieval_server::state::AppState;

fn test_config(dimension: usize) -> RetrievalConfig {
    let mut cfg = RetrievalConfig::from_env();
    cfg.vector_index.vector_size = dimension;
    cfg.similarity_threshold = 0.0;
    cfg
}

async fn seed_text(
    store: &InMemoryMetadataStore,
    vectors: &InMemoryVectorIndex,
    filename: &str,
    text: &str,
    embedding_id: &str,
    vector: Vec<f32>,
) -> Uuid {
    let outcome = store
        .put_document(NewDocument {
            filename: filename.to_string(),
            kind: DocumentKind::Text,
            byte_length: text.len() as i64,
            mime_type: "text/plain".into(),
            content_hash: format!("hash-{filename}"),
            metadata: json!({}),
        })
        .await
        .unwrap();
    let document_id = match outcome {
        PutDocumentOutcome::Created(id) => id,
        PutDocumentOutcome::AlreadyExists(id) => id,
    };

    store
        .put_content_item(
            document_id,
            ContentKind::Chunk,
            ContentFields::Chunk {
                text: text.to_string(),
                chunk_index: 0,
            },
            None,
            embedding_id.to_string(),
        )
        .await
        .unwrap();

    vectors
        .upsert(
            Modality::Text,
            vec![VectorRecord {
                embedding_id: embedding_id.to_string(),
                vector,
                payload: HashMap::from([("document_id".to_string(), json!(document_id.to_string()))]),
            }],
        )
        .await
        .unwrap();

    document_id
}

async fn seed_image(
    store: &InMemoryMetadataStore,
    vectors: &InMemoryVectorIndex,
    filename: &str,
    caption: &str,
    embedding_id: &str,
    vector: Vec<f32>,
) -> Uuid {
    let outcome = store
        .put_document(NewDocument {
            filename: filename.to_string(),
            kind: DocumentKind::Image,
            byte_length: 1024,
            mime_type: "image/jpeg".into(),
            content_hash: format!("hash-{filename}"),
            metadata: json!({}),
        })
        .await
        .unwrap();
    let document_id = match outcome {
        PutDocumentOutcome::Created(id) => id,
        PutDocumentOutcome::AlreadyExists(id) => id,
    };

    store
        .put_content_item(
            document_id,
            ContentKind::Image,
            ContentFields::Image {
                storage_path: format!("images/{filename}"),
                width: 800,
                height: 600,
            },
            Some(caption.to_string()),
            embedding_id.to_string(),
        )
        .await
        .unwrap();

    vectors
        .upsert(
            Modality::Image,
            vec![VectorRecord {
                embedding_id: embedding_id.to_string(),
                vector,
                payload: HashMap::from([("document_id".to_string(), json!(document_id.to_string()))]),
            }],
        )
        .await
        .unwrap();

    document_id
}

fn build_state(
    store: Arc<InMemoryMetadataStore>,
    vectors: Arc<InMemoryVectorIndex>,
    embeddings: Arc<StubEmbeddingClient>,
    config: RetrievalConfig,
) -> web::Data<AppState> {
    let engine = Arc::new(RetrievalEngine::new(
        store.clone(),
        Arc::new(UrlBlobStore::new("http://blobs.test")),
        vectors.clone(),
        embeddings,
        Arc::new(SystemClock),
        config.clone(),
    ));
    web::Data::new(AppState {
        engine,
        store,
        vectors,
        config,
        inbound_semaphore: Arc::new(Semaphore::new(256)),
    })
}

/// S1 — pure-text search.
#[actix_web::test]
async fn pure_text_search_returns_single_hit() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let vectors = Arc::new(InMemoryVectorIndex::new());
    let embeddings = Arc::new(StubEmbeddingClient::new(4));
    embeddings.stub("hello", vec![1.0, 0.0, 0.0, 0.0]);

    seed_text(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;

    let state = build_state(store, vectors, embeddings, test_config(4));
    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/search", web::post().to(handlers::search::search)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({"query": "hello", "modalities": ["text"], "limit": 5, "score_threshold": 0.0}))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["success"], true);
    assert_eq!(resp["results_count"], 1);
    assert_eq!(resp["results"][0]["embedding_id"], "e1");
    assert!(resp["context_bundle"]["unified_context"]
        .as_str()
        .unwrap()
        .contains("[1]"));
    assert!(resp["context_bundle"]["unified_context"]
        .as_str()
        .unwrap()
        .contains("Source: a.txt"));
}

/// S2 — cross-modal ranking: text beats image, three sections in the
/// fixed order text/image/keyframe.
#[actix_web::test]
async fn cross_modal_results_are_ranked_and_sectioned() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let vectors = Arc::new(InMemoryVectorIndex::new());
    let embeddings = Arc::new(StubEmbeddingClient::new(2));
    embeddings.stub("q", vec![1.0, 0.0]);

    seed_text(&store, &vectors, "a.txt", "text body", "e1", vec![1.0, 0.0]).await;
    seed_image(&store, &vectors, "b.jpg", "a photo", "e2", vec![0.9, 0.1]).await;

    let state = build_state(store, vectors, embeddings, test_config(2));
    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/search", web::post().to(handlers::search::search)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({"query": "q", "limit": 10, "score_threshold": 0.0}))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["results_count"], 2);
    assert_eq!(resp["results"][0]["embedding_id"], "e1");
    assert_eq!(resp["results"][1]["embedding_id"], "e2");

    let sections = resp["context_bundle"]["sections"].as_array().unwrap();
    assert_eq!(sections[0]["type"], "text");
    assert_eq!(sections[1]["type"], "image");
}

/// S3 — embedding degradation: worker failure still returns 200 with the
/// flag set and zero matches against the default threshold.
#[actix_web::test]
async fn embedding_degradation_returns_flagged_empty_result() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let vectors = Arc::new(InMemoryVectorIndex::new());
    let embeddings = Arc::new(StubEmbeddingClient::new(4));
    embeddings.force_degraded(true);

    seed_text(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;

    let mut config = test_config(4);
    config.similarity_threshold = 0.7;

    let state = build_state(store, vectors, embeddings, config);
    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/search", web::post().to(handlers::search::search)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({"query": "hello", "modalities": ["text"]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["results_count"], 0);
    assert_eq!(body["metadata"]["flags"]["embedding_degraded"], true);
    assert!(body["session_id"].is_string());
}

/// S4 — partial modality failure: video collection errors, text/image
/// hits still come back with `partial_modalities` set.
#[actix_web::test]
async fn partial_modality_failure_still_returns_other_hits() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let vectors = Arc::new(InMemoryVectorIndex::new());
    let embeddings = Arc::new(StubEmbeddingClient::new(4));
    embeddings.stub("hello", vec![1.0, 0.0, 0.0, 0.0]);

    seed_text(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;
    vectors.fail_modality(Modality::Video);

    let state = build_state(store, vectors, embeddings, test_config(4));
    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/search", web::post().to(handlers::search::search)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({"query": "hello", "score_threshold": 0.0}))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["results_count"], 1);
    assert_eq!(resp["metadata"]["flags"]["partial_modalities"], true);
}

/// S5 — dangling reference tolerance: a vector record with no matching
/// metadata row is dropped silently, never surfaced as an error.
#[actix_web::test]
async fn dangling_vector_reference_is_dropped_without_error() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let vectors = Arc::new(InMemoryVectorIndex::new());
    let embeddings = Arc::new(StubEmbeddingClient::new(4));
    embeddings.stub("hello", vec![1.0, 0.0, 0.0, 0.0]);

    let document_id = seed_text(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;
    store.delete_document(document_id).await.unwrap();

    let state = build_state(store, vectors, embeddings, test_config(4));
    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/search", web::post().to(handlers::search::search)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({"query": "hello", "modalities": ["text"], "score_threshold": 0.0}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["results_count"], 0);
}

/// S6 — idempotent indexing: two `/index` calls with the same
/// `content_id` leave exactly one vector record.
#[actix_web::test]
async fn indexing_same_content_id_twice_is_idempotent() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let vectors = Arc::new(InMemoryVectorIndex::new());
    let embeddings = Arc::new(StubEmbeddingClient::new(4));

    let state = build_state(store, vectors, embeddings, test_config(4));
    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/index", web::post().to(handlers::index::index_content))
            .route("/stats", web::get().to(handlers::stats::stats)),
    )
    .await;

    let index_body = json!({
        "content_id": "x",
        "content_type": "text",
        "content": "hi",
        "embeddings": [1.0, 0.0, 0.0, 0.0]
    });

    let first: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post().uri("/index").set_json(&index_body).to_request(),
    )
    .await;
    assert_eq!(first["success"], true);
    assert!(first["already_exists"].is_null());
    let first_vector_ids = first["vector_ids"].as_array().unwrap().clone();
    assert_eq!(first_vector_ids.len(), 1);

    let second: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post().uri("/index").set_json(&index_body).to_request(),
    )
    .await;
    assert_eq!(second["already_exists"], true);
    assert_eq!(second["vector_ids"].as_array().unwrap(), &first_vector_ids);

    let stats: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/stats").to_request(),
    )
    .await;
    assert_eq!(stats["text"]["vectors_count"], 1);
}

/// `limit = 0` boundary: empty results, header-only unified context.
#[actix_web::test]
async fn limit_zero_returns_empty_results() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let vectors = Arc::new(InMemoryVectorIndex::new());
    let embeddings = Arc::new(StubEmbeddingClient::new(4));
    embeddings.stub("hello", vec![1.0, 0.0, 0.0, 0.0]);

    seed_text(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;

    let state = build_state(store, vectors, embeddings, test_config(4));
    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/search", web::post().to(handlers::search::search)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({"query": "hello", "score_threshold": 0.0}))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["results_count"], 1);

    // limit outside 1..=100 is InvalidRequest
    let bad_req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({"query": "hello", "limit": 0}))
        .to_request();
    let resp = test::call_service(&app, bad_req).await;
    assert_eq!(resp.status(), 400);
}

/// Empty query fails `InvalidRequest` with the `{success, error,
/// message}` envelope.
#[actix_web::test]
async fn empty_query_returns_invalid_request_envelope() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let vectors = Arc::new(InMemoryVectorIndex::new());
    let embeddings = Arc::new(StubEmbeddingClient::new(4));

    let state = build_state(store, vectors, embeddings, test_config(4));
    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/search", web::post().to(handlers::search::search)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({"query": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "InvalidRequest");
}

/// `DELETE /content/{id}` then `GET /similar/{id}` => 404.
#[actix_web::test]
async fn delete_then_similar_returns_not_found() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let vectors = Arc::new(InMemoryVectorIndex::new());
    let embeddings = Arc::new(StubEmbeddingClient::new(4));

    let document_id = seed_text(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;

    let state = build_state(store, vectors, embeddings, test_config(4));
    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/content/{document_id}", web::delete().to(handlers::delete::delete_content))
            .route("/similar/{document_id}", web::get().to(handlers::similar::similar)),
    )
    .await;

    let delete_req = test::TestRequest::delete()
        .uri(&format!("/content/{document_id}"))
        .to_request();
    let resp = test::call_service(&app, delete_req).await;
    assert_eq!(resp.status(), 200);

    let similar_req = test::TestRequest::get()
        .uri(&format!("/similar/{document_id}"))
        .to_request();
    let resp = test::call_service(&app, similar_req).await;
    assert_eq!(resp.status(), 404);
}

/// `/stats` echoes `config: {vector_size, distance}` for each collection.
#[actix_web::test]
async fn stats_endpoint_echoes_config() {
    let store = Arc::new(InMemoryMetadataStore::new());
    let vectors = Arc::new(InMemoryVectorIndex::new());
    let embeddings = Arc::new(StubEmbeddingClient::new(4));

    seed_text(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;

    let state = build_state(store, vectors, embeddings, test_config(4));
    let app = test::init_service(
        App::new().app_data(state).route("/stats", web::get().to(handlers::stats::stats)),
    )
    .await;

    let resp: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/stats").to_request()).await;
    assert_eq!(resp["text"]["vectors_count"], 1);
    assert_eq!(resp["text"]["config"]["distance"], "Cosine");
}

/// `GET /health` returns immediately regardless of store/vector state.
#[actix_web::test]
async fn health_endpoint_reports_healthy() {
    let app = test::init_service(App::new().route("/health", web::get().to(handlers::health::health))).await;
    let resp: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp["status"], "healthy");
}
