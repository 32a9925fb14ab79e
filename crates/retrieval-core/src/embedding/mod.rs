//! Embedding Client: turns a query string into a
//! D-dimensional vector via a narrow RPC to the ingestion worker.
//! Implementations must never embed locally — the core stays model-free.

mod http;
mod memory;

pub use http::HttpEmbeddingClient;
pub use memory::StubEmbeddingClient;

use async_trait::async_trait;

use crate::error::EmbeddingOutcome;

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Never returns `Err` for a degraded worker: a timeout, non-2xx
    /// response, or malformed body yields `EmbeddingOutcome::Degraded`
    /// rather than failing the request.
    async fn embed(&self, query: &str) -> EmbeddingOutcome;
}
