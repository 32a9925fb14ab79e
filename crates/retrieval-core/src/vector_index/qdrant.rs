//! REST client against a Qdrant-compatible vector index, in the same
//! style as ConHub's `data::services::qdrant_client::QdrantClient` and
//! `vector_rag::services::vector_store::VectorStoreService` — same
//! endpoint shapes (`/collections/{name}`, `.../points`,
//! `.../points/search`, `.../points/delete`), same `api-key` header
//! convention, same "check then create" `ensure_collection`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, warn};

use super::{CollectionStats, VectorIndex};
use retrieval_config::VectorIndexConfig;

use crate::domain::{Modality, VectorFilter, VectorHit, VectorRecord};
use crate::error::VectorIndexError;

pub struct QdrantVectorIndex {
    client: Client,
    config: VectorIndexConfig,
    search_timeout: Duration,
}

impl QdrantVectorIndex {
    pub fn new(config: VectorIndexConfig, search_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            config,
            search_timeout,
        }
    }

    fn collection_name(&self, modality: Modality) -> &str {
        match modality {
            Modality::Text => &self.config.collections.text,
            Modality::Image => &self.config.collections.image,
            Modality::Video => &self.config.collections.video,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.url, path);
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    /// Ensures the per-modality collection exists, creating it with the
    /// configured vector size and Cosine distance on first use
    ///.
    pub async fn ensure_collection(&self, modality: Modality) -> Result<(), VectorIndexError> {
        let name = self.collection_name(modality);
        let path = format!("/collections/{name}");

        let existing = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .map_err(|e| VectorIndexError::Unavailable(e.to_string()))?;

        if existing.status().is_success() {
            return Ok(());
        }

        info!("creating qdrant collection '{name}'");
        let create_request = serde_json::json!({
            "vectors": { "size": self.config.vector_size, "distance": "Cosine" }
        });

        let response = self
            .request(reqwest::Method::PUT, &path)
            .json(&create_request)
            .send()
            .await
            .map_err(|e| VectorIndexError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            error!("failed to create collection '{name}': {body}");
            Err(VectorIndexError::Unavailable(body))
        }
    }
}

#[derive(Debug, Serialize)]
struct QdrantPoint {
    id: String,
    vector: Vec<f32>,
    payload: HashMap<String, Value>,
}

#[derive(Debug, Serialize)]
struct QdrantUpsertRequest {
    points: Vec<QdrantPoint>,
}

#[derive(Debug, Serialize)]
struct QdrantSearchRequest {
    vector: Vec<f32>,
    limit: usize,
    with_payload: bool,
    with_vector: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    score_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QdrantSearchResponse {
    result: Vec<QdrantSearchResult>,
}

#[derive(Debug, Deserialize)]
struct QdrantSearchResult {
    id: String,
    score: f32,
    payload: Option<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct QdrantPointResponse {
    result: Option<QdrantPointRecord>,
}

#[derive(Debug, Deserialize)]
struct QdrantPointRecord {
    id: String,
    vector: Option<Vec<f32>>,
    payload: Option<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct QdrantCollectionInfoResponse {
    result: QdrantCollectionInfo,
}

#[derive(Debug, Deserialize)]
struct QdrantCollectionInfo {
    vectors_count: Option<u64>,
    points_count: Option<u64>,
    config: Option<QdrantCollectionConfig>,
}

#[derive(Debug, Deserialize)]
struct QdrantCollectionConfig {
    params: Option<QdrantCollectionParams>,
}

#[derive(Debug, Deserialize)]
struct QdrantCollectionParams {
    vectors: Option<QdrantVectorParams>,
}

#[derive(Debug, Deserialize)]
struct QdrantVectorParams {
    size: Option<usize>,
    distance: Option<String>,
}

/// Compiles a `VectorFilter` into the Qdrant REST filter JSON shape: a
/// `must` array of `match`/`range` conditions, grounded in
/// `vector_rag::handlers::vector_search::build_qdrant_filter`.
fn build_qdrant_filter(filter: &VectorFilter) -> Option<Value> {
    if filter.is_empty() {
        return None;
    }
    let mut conditions = Vec::new();
    for (key, value) in &filter.equals {
        conditions.push(serde_json::json!({ "key": key, "match": { "value": value } }));
    }
    for (key, options) in &filter.one_of {
        conditions.push(serde_json::json!({ "key": key, "match": { "any": options } }));
    }
    for (key, min, max) in &filter.range {
        let mut range = serde_json::Map::new();
        if let Some(min) = min {
            range.insert("gte".into(), serde_json::json!(min));
        }
        if let Some(max) = max {
            range.insert("lte".into(), serde_json::json!(max));
        }
        conditions.push(serde_json::json!({ "key": key, "range": range }));
    }
    Some(serde_json::json!({ "must": conditions }))
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert(&self, modality: Modality, records: Vec<VectorRecord>) -> Result<(), VectorIndexError> {
        self.ensure_collection(modality).await?;

        let expected = self.config.vector_size;
        for record in &records {
            if record.vector.len() != expected {
                return Err(VectorIndexError::DimensionMismatch {
                    expected,
                    got: record.vector.len(),
                });
            }
        }

        let points = records
            .into_iter()
            .map(|r| QdrantPoint {
                id: r.embedding_id,
                vector: r.vector,
                payload: r.payload,
            })
            .collect();

        let name = self.collection_name(modality);
        let path = format!("/collections/{name}/points");
        let response = self
            .request(reqwest::Method::PUT, &path)
            .json(&QdrantUpsertRequest { points })
            .send()
            .await
            .map_err(|e| VectorIndexError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!("qdrant upsert into '{name}' failed: {body}");
            Err(VectorIndexError::Unavailable(body))
        }
    }

    async fn search(
        &self,
        modality: Modality,
        query_vector: &[f32],
        limit: usize,
        score_floor: Option<f32>,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorHit>, VectorIndexError> {
        let name = self.collection_name(modality);
        let path = format!("/collections/{name}/points/search");

        let request = QdrantSearchRequest {
            vector: query_vector.to_vec(),
            limit,
            with_payload: true,
            with_vector: false,
            score_threshold: score_floor,
            filter: build_qdrant_filter(filter),
        };

        let response = tokio::time::timeout(
            self.search_timeout,
            self.request(reqwest::Method::POST, &path).json(&request).send(),
        )
        .await
        .map_err(|_| VectorIndexError::Unavailable(format!("search timed out for '{name}'")))?
        .map_err(|e| VectorIndexError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorIndexError::Unavailable(body));
        }

        let parsed: QdrantSearchResponse = response
            .json()
            .await
            .map_err(|e| VectorIndexError::MalformedResponse(e.to_string()))?;

        Ok(parsed
            .result
            .into_iter()
            .map(|r| VectorHit {
                embedding_id: r.id,
                score: r.score,
                modality,
                payload: r.payload.unwrap_or_default(),
            })
            .collect())
    }

    async fn get(&self, modality: Modality, embedding_id: &str) -> Result<Option<VectorRecord>, VectorIndexError> {
        let name = self.collection_name(modality);
        let path = format!("/collections/{name}/points/{embedding_id}");

        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .map_err(|e| VectorIndexError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorIndexError::Unavailable(body));
        }

        let parsed: QdrantPointResponse = response
            .json()
            .await
            .map_err(|e| VectorIndexError::MalformedResponse(e.to_string()))?;

        Ok(parsed.result.map(|r| VectorRecord {
            embedding_id: r.id,
            vector: r.vector.unwrap_or_default(),
            payload: r.payload.unwrap_or_default(),
        }))
    }

    async fn delete(&self, modality: Modality, embedding_ids: &[String]) -> Result<(), VectorIndexError> {
        if embedding_ids.is_empty() {
            return Ok(());
        }
        let name = self.collection_name(modality);
        let path = format!("/collections/{name}/points/delete");

        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&serde_json::json!({ "points": embedding_ids }))
            .send()
            .await
            .map_err(|e| VectorIndexError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(VectorIndexError::Unavailable(body))
        }
    }

    async fn collection_stats(&self, modality: Modality) -> Result<CollectionStats, VectorIndexError> {
        let name = self.collection_name(modality);
        let path = format!("/collections/{name}");

        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .map_err(|e| VectorIndexError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(VectorIndexError::CollectionMissing(name.to_string()));
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorIndexError::Unavailable(body));
        }

        let parsed: QdrantCollectionInfoResponse = response
            .json()
            .await
            .map_err(|e| VectorIndexError::MalformedResponse(e.to_string()))?;

        let vector_params = parsed
            .result
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors);

        Ok(CollectionStats {
            vectors_count: parsed.result.vectors_count.unwrap_or(0),
            points_count: parsed.result.points_count.unwrap_or(0),
            vector_size: vector_params.as_ref().and_then(|v| v.size).unwrap_or(self.config.vector_size),
            distance: vector_params.and_then(|v| v.distance).unwrap_or_else(|| "Cosine".into()),
        })
    }
}
