//! In-memory `VectorIndex` fake used by unit and integration tests in
//! place of a live Qdrant-compatible backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{matches_filter, CollectionStats, VectorIndex};
use crate::domain::{Modality, VectorFilter, VectorHit, VectorRecord};
use crate::error::VectorIndexError;

#[derive(Default)]
struct Collection {
    records: HashMap<String, VectorRecord>,
    vector_size: Option<usize>,
}

#[derive(Default)]
pub struct InMemoryVectorIndex {
    collections: Mutex<HashMap<Modality, Collection>>,
    /// Modalities configured to fail their next `search` call, for
    /// exercising the partial-modality-failure path.
    failing: Mutex<Vec<Modality>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: make `search` (and therefore `search_hybrid`) fail for
    /// the given modality until cleared.
    pub fn fail_modality(&self, modality: Modality) {
        self.failing.lock().unwrap().push(modality);
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, modality: Modality, records: Vec<VectorRecord>) -> Result<(), VectorIndexError> {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections.entry(modality).or_default();
        for record in &records {
            match collection.vector_size {
                Some(size) if size != record.vector.len() => {
                    return Err(VectorIndexError::DimensionMismatch {
                        expected: size,
                        got: record.vector.len(),
                    });
                }
                None => collection.vector_size = Some(record.vector.len()),
                _ => {}
            }
        }
        for record in records {
            collection.records.insert(record.embedding_id.clone(), record);
        }
        Ok(())
    }

    async fn search(
        &self,
        modality: Modality,
        query_vector: &[f32],
        limit: usize,
        score_floor: Option<f32>,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorHit>, VectorIndexError> {
        if self.failing.lock().unwrap().contains(&modality) {
            return Err(VectorIndexError::Unavailable(format!("{modality:?} forced failure")));
        }

        let collections = self.collections.lock().unwrap();
        let Some(collection) = collections.get(&modality) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<VectorHit> = collection
            .records
            .values()
            .filter(|r| matches_filter(&r.payload, filter))
            .map(|r| VectorHit {
                embedding_id: r.embedding_id.clone(),
                score: Self::cosine_similarity(query_vector, &r.vector),
                modality,
                payload: r.payload.clone(),
            })
            .filter(|hit| score_floor.map_or(true, |floor| hit.score >= floor))
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get(&self, modality: Modality, embedding_id: &str) -> Result<Option<VectorRecord>, VectorIndexError> {
        let collections = self.collections.lock().unwrap();
        Ok(collections
            .get(&modality)
            .and_then(|c| c.records.get(embedding_id))
            .cloned())
    }

    async fn delete(&self, modality: Modality, embedding_ids: &[String]) -> Result<(), VectorIndexError> {
        let mut collections = self.collections.lock().unwrap();
        if let Some(collection) = collections.get_mut(&modality) {
            for id in embedding_ids {
                collection.records.remove(id);
            }
        }
        Ok(())
    }

    async fn collection_stats(&self, modality: Modality) -> Result<CollectionStats, VectorIndexError> {
        let collections = self.collections.lock().unwrap();
        let collection = collections.get(&modality);
        Ok(CollectionStats {
            vectors_count: collection.map_or(0, |c| c.records.len() as u64),
            points_count: collection.map_or(0, |c| c.records.len() as u64),
            vector_size: collection.and_then(|c| c.vector_size).unwrap_or(0),
            distance: "Cosine".into(),
        })
    }
}
