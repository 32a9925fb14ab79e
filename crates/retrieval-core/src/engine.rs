//! Retrieval Engine: orchestrates the Embedding Client,
//! Vector Index, and Metadata Store to answer a search, enriches hits,
//! applies filters, ranks, and persists the session.
//!
//! Dependency injection only: the engine takes its five
//! collaborators as trait objects at construction, no module-level
//! singletons.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use retrieval_config::RetrievalConfig;
use retrieval_observability::domain_events::{
    log_embedding_generated, log_search_executed, log_session_persisted, log_vector_search,
};
use uuid::Uuid;

use crate::assembler;
use crate::blob::BlobStore;
use crate::cache::ContentCache;
use crate::clock::Clock;
use crate::domain::{
    Artifacts, ContentFields, ContentItem, EnrichedHit, Modality, ResponseFlags, SearchFilters,
    SearchResult, SessionResult, VectorFilter,
};
use crate::embedding::EmbeddingClient;
use crate::error::EngineError;
use crate::store::MetadataStore;
use crate::vector_index::VectorIndex;

/// Parameters for `RetrievalEngine::search`.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub modalities: Option<Vec<Modality>>,
    pub limit: Option<usize>,
    pub filters: Option<SearchFilters>,
    pub score_floor: Option<f32>,
}

pub struct RetrievalEngine {
    store: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    vectors: Arc<dyn VectorIndex>,
    embeddings: Arc<dyn EmbeddingClient>,
    clock: Arc<dyn Clock>,
    cache: ContentCache,
    config: RetrievalConfig,
    service_name: String,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        vectors: Arc<dyn VectorIndex>,
        embeddings: Arc<dyn EmbeddingClient>,
        clock: Arc<dyn Clock>,
        config: RetrievalConfig,
    ) -> Self {
        let cache = ContentCache::new(config.cache.size, config.cache.ttl());
        Self {
            store,
            blobs,
            vectors,
            embeddings,
            clock,
            cache,
            config,
            service_name: "retrieval-core".to_string(),
        }
    }

    fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.default_search_limit)
            .min(self.config.max_search_limit)
    }

    fn effective_modalities(&self, requested: Option<Vec<Modality>>) -> Vec<Modality> {
        requested.unwrap_or_else(|| Modality::all().to_vec())
    }

    pub async fn search(&self, request: SearchRequest) -> Result<SearchResult, EngineError> {
        tokio::time::timeout(self.config.request_deadline(), self.search_inner(request))
            .await
            .map_err(|_| EngineError::DeadlineExceeded)?
    }

    async fn search_inner(&self, request: SearchRequest) -> Result<SearchResult, EngineError> {
        if request.query.trim().is_empty() {
            return Err(EngineError::invalid("query must not be empty"));
        }
        if request.query.len() > self.config.max_query_length {
            return Err(EngineError::invalid(format!(
                "query exceeds max length of {} bytes",
                self.config.max_query_length
            )));
        }

        let modalities = self.effective_modalities(request.modalities);
        let limit = self.effective_limit(request.limit);
        let filters = request.filters.unwrap_or_default();
        let score_floor = request.score_floor.unwrap_or(self.config.similarity_threshold);
        // Nothing in `filters` maps cleanly onto a Vector Index payload
        // condition yet (the high-level content_type rollup and the
        // payload's own content_type strings use different vocabularies),
        // so every filter stays post-hoc in `passes_post_filters` below.
        let filter = VectorFilter::default();

        // Step 1: embed the query.
        let embed_start = Instant::now();
        let outcome = self.embeddings.embed(&request.query).await;
        let embedding_degraded = outcome.is_degraded();
        log_embedding_generated(&self.service_name, embedding_degraded, embed_start.elapsed().as_millis() as u64);
        let query_vector = outcome.into_vector();

        // Step 2: fan out to the vector index with a 2x over-fetch factor.
        let over_fetch = limit.saturating_mul(2);
        let search_start = Instant::now();
        let hybrid = self
            .vectors
            .search_hybrid(&query_vector, over_fetch, &modalities, Some(score_floor), &filter)
            .await
            .map_err(|e| EngineError::UpstreamUnavailable(e.to_string()))?;

        for modality in &modalities {
            let hits_for_modality = hybrid.hits.iter().filter(|h| h.modality == *modality).count();
            let failed = hybrid.failed_modalities.contains(modality);
            log_vector_search(
                &self.service_name,
                modality.as_str(),
                hits_for_modality,
                search_start.elapsed().as_millis() as u64,
                failed.then_some("modality search failed"),
            );
        }

        let partial_modalities = !hybrid.failed_modalities.is_empty();

        // Step 3 & 4: enrich each hit, dropping weak-reference misses, and
        // apply filters that couldn't be pushed into C3.
        let mut enriched = Vec::with_capacity(hybrid.hits.len());
        for hit in &hybrid.hits {
            let Some(join) = self.get_content_cached(&hit.embedding_id).await? else {
                continue;
            };
            let enriched_hit = self.to_enriched_hit(hit.score, hit.modality, join);
            if !passes_post_filters(&enriched_hit, &filters) {
                continue;
            }
            if let Some(min_score) = filters.min_score {
                if enriched_hit.score < min_score {
                    continue;
                }
            }
            enriched.push(enriched_hit);
        }

        // Step 5: rank by descending score with deterministic tie-break.
        enriched.sort_by(|a, b| a.rank_key().cmp(&b.rank_key()));

        // Step 6: truncate to the caller's effective limit.
        enriched.truncate(limit);

        // Step 8: assemble the context bundle.
        let bundle = assembler::assemble(&request.query, &enriched);

        // Step 9: best-effort session persistence.
        let session_results: Vec<SessionResult> = enriched
            .iter()
            .map(|h| SessionResult {
                embedding_id: h.embedding_id.clone(),
                score: h.score,
                modality: h.modality,
            })
            .collect();

        let (session_id, session_error) = match self
            .store
            .put_search_session(
                request.query.clone(),
                modalities.clone(),
                filters.clone(),
                session_results,
                bundle.clone(),
            )
            .await
        {
            Ok(id) => {
                log_session_persisted(&self.service_name, Some(id), None);
                (Some(id), None)
            }
            Err(e) => {
                log_session_persisted(&self.service_name, None, Some(&e.to_string()));
                (None, Some(e.to_string()))
            }
        };

        log_search_executed(
            &self.service_name,
            modalities.iter().map(|m| m.as_str().to_string()).collect::<Vec<_>>().as_slice(),
            enriched.len(),
            embed_start.elapsed().as_millis() as u64,
            partial_modalities,
        );

        Ok(SearchResult {
            session_id,
            query: request.query,
            modalities,
            results_count: enriched.len(),
            results: enriched,
            context_bundle: bundle,
            search_timestamp: self.clock.now(),
            filters_applied: filters,
            score_threshold: score_floor,
            flags: ResponseFlags {
                embedding_degraded: embedding_degraded.then_some(true),
                partial_modalities: partial_modalities.then_some(true),
            },
            session_error,
        })
    }

    /// `search_similar`: identical to `search` except the
    /// query vector is taken from a representative Content Item of
    /// `document_id` rather than calling C4.
    pub async fn search_similar(
        &self,
        document_id: Uuid,
        limit: Option<usize>,
        score_floor: Option<f32>,
    ) -> Result<SearchResult, EngineError> {
        tokio::time::timeout(
            self.config.request_deadline(),
            self.search_similar_inner(document_id, limit, score_floor),
        )
        .await
        .map_err(|_| EngineError::DeadlineExceeded)?
    }

    async fn search_similar_inner(
        &self,
        document_id: Uuid,
        limit: Option<usize>,
        score_floor: Option<f32>,
    ) -> Result<SearchResult, EngineError> {
        let representative = self
            .store
            .representative_content_item(document_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("document {document_id} has no content items")))?;

        let modality = representative.kind.modality();
        let record = self
            .vectors
            .get(modality, &representative.embedding_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "embedding {} missing from vector index",
                    representative.embedding_id
                ))
            })?;

        let modalities = vec![Modality::Text, Modality::Image, Modality::Video];
        let limit = self.effective_limit(limit);
        let score_floor = score_floor.unwrap_or(self.config.similarity_threshold);
        let filter = VectorFilter::default();

        let over_fetch = limit.saturating_mul(2);
        let hybrid = self
            .vectors
            .search_hybrid(&record.vector, over_fetch, &modalities, Some(score_floor), &filter)
            .await
            .map_err(|e| EngineError::UpstreamUnavailable(e.to_string()))?;
        let partial_modalities = !hybrid.failed_modalities.is_empty();

        let mut enriched = Vec::with_capacity(hybrid.hits.len());
        for hit in &hybrid.hits {
            let Some(join) = self.get_content_cached(&hit.embedding_id).await? else {
                continue;
            };
            enriched.push(self.to_enriched_hit(hit.score, hit.modality, join));
        }
        enriched.sort_by(|a, b| a.rank_key().cmp(&b.rank_key()));
        enriched.truncate(limit);

        let query = format!("similar:{document_id}");
        let bundle = assembler::assemble(&query, &enriched);

        let session_results: Vec<SessionResult> = enriched
            .iter()
            .map(|h| SessionResult {
                embedding_id: h.embedding_id.clone(),
                score: h.score,
                modality: h.modality,
            })
            .collect();

        let (session_id, session_error) = match self
            .store
            .put_search_session(
                query.clone(),
                modalities.clone(),
                SearchFilters::default(),
                session_results,
                bundle.clone(),
            )
            .await
        {
            Ok(id) => (Some(id), None),
            Err(e) => (None, Some(e.to_string())),
        };

        Ok(SearchResult {
            session_id,
            query,
            modalities,
            results_count: enriched.len(),
            results: enriched,
            context_bundle: bundle,
            search_timestamp: self.clock.now(),
            filters_applied: SearchFilters::default(),
            score_threshold: score_floor,
            flags: ResponseFlags {
                embedding_degraded: None,
                partial_modalities: partial_modalities.then_some(true),
            },
            session_error,
        })
    }

    async fn get_content_cached(
        &self,
        embedding_id: &str,
    ) -> Result<Option<crate::store::ContentJoin>, EngineError> {
        if let Some(cached) = self.cache.get(embedding_id) {
            return Ok(cached);
        }
        let join = self.store.get_content_by_embedding_id(embedding_id).await?;
        self.cache.put(embedding_id.to_string(), join.clone());
        Ok(join)
    }

    fn to_enriched_hit(&self, score: f32, modality: Modality, join: crate::store::ContentJoin) -> EnrichedHit {
        let artifacts = self.artifacts_for(&join.item, &join.document.filename);
        EnrichedHit {
            embedding_id: join.item.embedding_id.clone(),
            score,
            modality,
            document_id: join.document.id,
            item_id: join.item.id,
            filename: join.document.filename,
            file_type: join.document.kind.as_str().to_string(),
            metadata: join.document.metadata,
            created_at: join.document.created_at,
            fields: join.item.fields,
            caption: join.item.caption,
            artifacts,
        }
    }

    fn artifacts_for(&self, item: &ContentItem, filename: &str) -> Artifacts {
        let view_url = match &item.fields {
            ContentFields::Chunk { .. } => self.blobs.url_for(&format!("documents/{}", item.document_id)),
            ContentFields::Image { storage_path, .. } => self.blobs.url_for(storage_path),
            ContentFields::Video { storage_path, .. } => self.blobs.url_for(storage_path),
            ContentFields::Keyframe { storage_path, .. } => self.blobs.url_for(storage_path),
        };
        Artifacts {
            view_url,
            download_url: match &item.fields {
                ContentFields::Chunk { .. } => None,
                _ => Some(self.blobs.url_for(&format!("download/{filename}"))),
            },
        }
    }

    /// Purges cached content-by-embedding-id entries for `document_id`
    ///.
    pub fn invalidate_document(&self, document_id: Uuid) {
        self.cache.purge_document(document_id);
    }
}

fn passes_post_filters(hit: &EnrichedHit, filters: &SearchFilters) -> bool {
    if let Some(file_types) = &filters.file_types {
        if !file_types.iter().any(|t| t == &hit.file_type) {
            return false;
        }
    }
    if let Some(content_types) = &filters.content_types {
        let kind_label = match hit.fields {
            ContentFields::Chunk { .. } => "text",
            ContentFields::Image { .. } => "image",
            ContentFields::Video { .. } => "video",
            ContentFields::Keyframe { .. } => "keyframe",
        };
        if !content_types.iter().any(|t| t == kind_label) {
            return false;
        }
    }
    if let Some(range) = &filters.date_range {
        if let Some(gte) = range.gte {
            if hit.created_at < gte {
                return false;
            }
        }
        if let Some(lte) = range.lte {
            if hit.created_at > lte {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::UrlBlobStore;
    use crate::clock::FixedClock;
    use crate::domain::{ContentKind, NewDocument, DocumentKind, VectorRecord};
    use crate::embedding::StubEmbeddingClient;
    use crate::store::InMemoryMetadataStore;
    use crate::vector_index::InMemoryVectorIndex;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn dimension() -> usize {
        4
    }

    fn make_config() -> RetrievalConfig {
        let mut cfg = RetrievalConfig::from_env();
        cfg.vector_index.vector_size = dimension();
        cfg.similarity_threshold = 0.0;
        cfg
    }

    async fn seed_text_document(
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
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();
        let document_id = match outcome {
            crate::store::PutDocumentOutcome::Created(id) => id,
            crate::store::PutDocumentOutcome::AlreadyExists(id) => id,
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
                    payload: HashMap::from([(
                        "document_id".to_string(),
                        serde_json::json!(document_id.to_string()),
                    )]),
                }],
            )
            .await
            .unwrap();

        document_id
    }

    #[tokio::test]
    async fn pure_text_search_returns_single_hit() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::new());
        let embeddings = Arc::new(StubEmbeddingClient::new(dimension()));
        embeddings.stub("hello", vec![1.0, 0.0, 0.0, 0.0]);

        seed_text_document(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;

        let engine = RetrievalEngine::new(
            store,
            Arc::new(UrlBlobStore::new("http://blobs.test")),
            vectors,
            embeddings,
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())),
            make_config(),
        );

        let result = engine
            .search(SearchRequest {
                query: "hello".into(),
                modalities: Some(vec![Modality::Text]),
                limit: Some(5),
                filters: None,
                score_floor: Some(0.0),
            })
            .await
            .unwrap();

        assert_eq!(result.results_count, 1);
        assert_eq!(result.results[0].embedding_id, "e1");
        assert!(result.results[0].score > 0.99);
        assert!(result.context_bundle.unified_context.contains("[1]"));
        assert!(result.context_bundle.unified_context.contains("Source: a.txt"));
        assert!(result.session_id.is_some());
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::new());
        let embeddings = Arc::new(StubEmbeddingClient::new(dimension()));

        let engine = RetrievalEngine::new(
            store,
            Arc::new(UrlBlobStore::new("http://blobs.test")),
            vectors,
            embeddings,
            Arc::new(FixedClock(Utc::now())),
            make_config(),
        );

        let err = engine
            .search(SearchRequest {
                query: "   ".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn embedding_degradation_sets_flag_and_returns_no_results() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::new());
        let embeddings = Arc::new(StubEmbeddingClient::new(dimension()));
        embeddings.force_degraded(true);

        seed_text_document(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;

        let mut config = make_config();
        config.similarity_threshold = 0.7;

        let engine = RetrievalEngine::new(
            store,
            Arc::new(UrlBlobStore::new("http://blobs.test")),
            vectors,
            embeddings,
            Arc::new(FixedClock(Utc::now())),
            config,
        );

        let result = engine
            .search(SearchRequest {
                query: "hello".into(),
                modalities: Some(vec![Modality::Text]),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.flags.embedding_degraded, Some(true));
        assert_eq!(result.results_count, 0);
        assert!(result.session_id.is_some());
    }

    #[tokio::test]
    async fn dangling_embedding_reference_is_silently_dropped() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::new());
        let embeddings = Arc::new(StubEmbeddingClient::new(dimension()));
        embeddings.stub("hello", vec![1.0, 0.0, 0.0, 0.0]);

        let document_id =
            seed_text_document(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;
        // Delete from the Metadata Store but not the Vector Index.
        store.delete_document(document_id).await.unwrap();

        let engine = RetrievalEngine::new(
            store,
            Arc::new(UrlBlobStore::new("http://blobs.test")),
            vectors,
            embeddings,
            Arc::new(FixedClock(Utc::now())),
            make_config(),
        );

        let result = engine
            .search(SearchRequest {
                query: "hello".into(),
                modalities: Some(vec![Modality::Text]),
                score_floor: Some(0.0),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.results_count, 0);
    }

    #[tokio::test]
    async fn partial_modality_failure_still_returns_other_hits() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::new());
        let embeddings = Arc::new(StubEmbeddingClient::new(dimension()));
        embeddings.stub("hello", vec![1.0, 0.0, 0.0, 0.0]);

        seed_text_document(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;
        vectors.fail_modality(Modality::Video);

        let engine = RetrievalEngine::new(
            store,
            Arc::new(UrlBlobStore::new("http://blobs.test")),
            vectors,
            embeddings,
            Arc::new(FixedClock(Utc::now())),
            make_config(),
        );

        let result = engine
            .search(SearchRequest {
                query: "hello".into(),
                score_floor: Some(0.0),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.flags.partial_modalities, Some(true));
        assert_eq!(result.results_count, 1);
    }

    #[tokio::test]
    async fn limit_zero_returns_empty_results() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::new());
        let embeddings = Arc::new(StubEmbeddingClient::new(dimension()));
        embeddings.stub("hello", vec![1.0, 0.0, 0.0, 0.0]);

        seed_text_document(&store, &vectors, "a.txt", "world", "e1", vec![1.0, 0.0, 0.0, 0.0]).await;

        let engine = RetrievalEngine::new(
            store,
            Arc::new(UrlBlobStore::new("http://blobs.test")),
            vectors,
            embeddings,
            Arc::new(FixedClock(Utc::now())),
            make_config(),
        );

        let result = engine
            .search(SearchRequest {
                query: "hello".into(),
                limit: Some(0),
                score_floor: Some(0.0),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.results_count, 0);
        assert_eq!(
            result.context_bundle.unified_context,
            "# Search Results for: hello\n\nFound 0 relevant items across 0 content types"
        );
    }
}
