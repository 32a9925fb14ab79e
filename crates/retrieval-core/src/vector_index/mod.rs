//! Vector Index: per-modality collections of
//! `(embedding_id, vector, payload)` with nearest-neighbor search and
//! payload filters.

mod memory;
mod qdrant;

pub use memory::InMemoryVectorIndex;
pub use qdrant::QdrantVectorIndex;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::{Modality, VectorFilter, VectorHit, VectorRecord};
use crate::error::VectorIndexError;

#[derive(Debug, Clone, Default)]
pub struct CollectionStats {
    pub vectors_count: u64,
    pub points_count: u64,
    pub vector_size: usize,
    pub distance: String,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent by `embedding_id`.
    async fn upsert(&self, modality: Modality, records: Vec<VectorRecord>) -> Result<(), VectorIndexError>;

    async fn search(
        &self,
        modality: Modality,
        query_vector: &[f32],
        limit: usize,
        score_floor: Option<f32>,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorHit>, VectorIndexError>;

    async fn get(&self, modality: Modality, embedding_id: &str) -> Result<Option<VectorRecord>, VectorIndexError>;

    async fn delete(&self, modality: Modality, embedding_ids: &[String]) -> Result<(), VectorIndexError>;

    async fn collection_stats(&self, modality: Modality) -> Result<CollectionStats, VectorIndexError>;

    /// Fans out to each requested modality in parallel, tags every hit
    /// with its modality, and merges into one list sorted by decreasing
    /// score with `(modality_priority, embedding_id)` tie-break
    ///. A modality whose `search` call fails is dropped
    /// (`partial_modalities`); returns `Err` only when every requested
    /// modality failed.
    async fn search_hybrid(
        &self,
        query_vector: &[f32],
        limit: usize,
        modalities: &[Modality],
        score_floor: Option<f32>,
        filter: &VectorFilter,
    ) -> Result<HybridSearchOutcome, VectorIndexError> {
        default_search_hybrid(self, query_vector, limit, modalities, score_floor, filter).await
    }
}

/// Result of a fanned-out hybrid search: the merged, sorted hits plus
/// which modalities failed.
#[derive(Debug, Clone, Default)]
pub struct HybridSearchOutcome {
    pub hits: Vec<VectorHit>,
    pub failed_modalities: Vec<Modality>,
}

/// Default fan-out/merge implementation shared by every `VectorIndex`, in
/// the same `search_hybrid`-shaped contract as ConHub's `qdrant_client`
/// and `vector_rag::services::vector_store`. Bounded concurrency and
/// cooperative cancellation live in the engine, which wraps the whole
/// call in its own deadline/semaphore; this
/// default only does the per-modality fan-out and merge.
pub async fn default_search_hybrid<T: VectorIndex + ?Sized>(
    index: &T,
    query_vector: &[f32],
    limit: usize,
    modalities: &[Modality],
    score_floor: Option<f32>,
    filter: &VectorFilter,
) -> Result<HybridSearchOutcome, VectorIndexError> {
    let mut tasks = Vec::with_capacity(modalities.len());
    for &modality in modalities {
        tasks.push(async move {
            let result = index.search(modality, query_vector, limit, score_floor, filter).await;
            (modality, result)
        });
    }

    let results = futures::future::join_all(tasks).await;

    let mut hits = Vec::new();
    let mut failed_modalities = Vec::new();
    for (modality, result) in results {
        match result {
            Ok(modality_hits) => hits.extend(modality_hits),
            Err(_) => failed_modalities.push(modality),
        }
    }

    if hits.is_empty() && failed_modalities.len() == modalities.len() && !modalities.is_empty() {
        return Err(VectorIndexError::Unavailable(
            "all requested modalities failed".into(),
        ));
    }

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.modality.priority().cmp(&b.modality.priority()))
            .then_with(|| a.embedding_id.cmp(&b.embedding_id))
    });

    Ok(HybridSearchOutcome { hits, failed_modalities })
}

/// Compiles a `VectorFilter` into a conjunctive payload-match: equality,
/// one-of, and numeric range conditions, all ANDed together. Shared by
/// every backend so the filter semantics stay identical regardless of
/// wire format.
pub fn matches_filter(payload: &HashMap<String, serde_json::Value>, filter: &VectorFilter) -> bool {
    for (key, expected) in &filter.equals {
        match payload.get(key) {
            Some(v) if v == expected => {}
            _ => return false,
        }
    }
    for (key, options) in &filter.one_of {
        match payload.get(key) {
            Some(v) if options.contains(v) => {}
            _ => return false,
        }
    }
    for (key, min, max) in &filter.range {
        let Some(v) = payload.get(key).and_then(|v| v.as_f64()) else {
            return false;
        };
        if let Some(min) = min {
            if v < *min {
                return false;
            }
        }
        if let Some(max) = max {
            if v > *max {
                return false;
            }
        }
    }
    true
}
