//! Remote embedding client over a worker HTTP endpoint: same
//! `reqwest::Client` + `base_url` shape as ConHub's other worker
//! clients, except an unreachable or malformed worker degrades to a
//! zero-vector result instead of a silent no-op or a failed request.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::EmbeddingClient;
use crate::error::EmbeddingOutcome;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    dimension: usize,
}

impl HttpEmbeddingClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
            dimension,
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, query: &str) -> EmbeddingOutcome {
        let url = format!("{}/embed", self.base_url);
        let attempt = tokio::time::timeout(
            self.timeout,
            self.client.post(&url).json(&EmbedRequest { query }).send(),
        )
        .await;

        let response = match attempt {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("embedding worker unreachable: {e}");
                return EmbeddingOutcome::Degraded {
                    dimension: self.dimension,
                    reason: e.to_string(),
                };
            }
            Err(_) => {
                warn!("embedding worker timed out after {:?}", self.timeout);
                return EmbeddingOutcome::Degraded {
                    dimension: self.dimension,
                    reason: "timeout".into(),
                };
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("embedding worker returned {status}: {body}");
            return EmbeddingOutcome::Degraded {
                dimension: self.dimension,
                reason: format!("status {status}"),
            };
        }

        match response.json::<EmbedResponse>().await {
            Ok(parsed) if parsed.embedding.len() == self.dimension => EmbeddingOutcome::Ok(parsed.embedding),
            Ok(parsed) => {
                warn!(
                    "embedding worker returned {} dims, expected {}",
                    parsed.embedding.len(),
                    self.dimension
                );
                EmbeddingOutcome::Degraded {
                    dimension: self.dimension,
                    reason: "dimension mismatch".into(),
                }
            }
            Err(e) => {
                warn!("embedding worker returned malformed body: {e}");
                EmbeddingOutcome::Degraded {
                    dimension: self.dimension,
                    reason: e.to_string(),
                }
            }
        }
    }
}
