//! Shared application state injected into every handler via `web::Data`.

use std::sync::Arc;
use std::time::Duration;

use retrieval_config::RetrievalConfig;
use retrieval_core::engine::RetrievalEngine;
use retrieval_core::store::MetadataStore;
use retrieval_core::vector_index::VectorIndex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ApiError;

pub struct AppState {
    pub engine: Arc<RetrievalEngine>,
    pub store: Arc<dyn MetadataStore>,
    pub vectors: Arc<dyn VectorIndex>,
    pub config: RetrievalConfig,
    /// Bounds inbound HTTP concurrency; a request
    /// that cannot acquire a permit fails `Overloaded` rather than queueing
    /// unboundedly.
    pub inbound_semaphore: Arc<Semaphore>,
}

/// How long a request waits in the inbound queue before it fails
/// `Overloaded`.
const QUEUE_WAIT: Duration = Duration::from_millis(200);

impl AppState {
    pub async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, ApiError> {
        match tokio::time::timeout(QUEUE_WAIT, self.inbound_semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            _ => Err(ApiError::Overloaded),
        }
    }
}
