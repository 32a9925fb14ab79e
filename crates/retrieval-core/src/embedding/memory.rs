//! Deterministic fake embedding client for tests — returns a canned
//! vector per query, or a forced degradation, without any network call.

use std::collections::HashMap;
use std::sync::Mutex;

use super::EmbeddingClient;
use crate::error::EmbeddingOutcome;

#[derive(Default)]
pub struct StubEmbeddingClient {
    responses: Mutex<HashMap<String, Vec<f32>>>,
    default_vector: Mutex<Option<Vec<f32>>>,
    force_degraded: Mutex<bool>,
    dimension: usize,
}

impl StubEmbeddingClient {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    pub fn stub(&self, query: &str, vector: Vec<f32>) {
        self.responses.lock().unwrap().insert(query.to_string(), vector);
    }

    pub fn set_default(&self, vector: Vec<f32>) {
        *self.default_vector.lock().unwrap() = Some(vector);
    }

    pub fn force_degraded(&self, degraded: bool) {
        *self.force_degraded.lock().unwrap() = degraded;
    }
}

#[async_trait::async_trait]
impl EmbeddingClient for StubEmbeddingClient {
    async fn embed(&self, query: &str) -> EmbeddingOutcome {
        if *self.force_degraded.lock().unwrap() {
            return EmbeddingOutcome::Degraded {
                dimension: self.dimension,
                reason: "forced by test stub".into(),
            };
        }
        if let Some(v) = self.responses.lock().unwrap().get(query) {
            return EmbeddingOutcome::Ok(v.clone());
        }
        if let Some(v) = self.default_vector.lock().unwrap().clone() {
            return EmbeddingOutcome::Ok(v);
        }
        EmbeddingOutcome::Ok(vec![0.0; self.dimension])
    }
}
