//! Configuration for the multimodal retrieval core.
//!
//! Mirrors the environment-driven `AppConfig::from_env()` pattern used across
//! ConHub services: every setting has a sensible default and can be
//! overridden via environment variable, with no required config file.

use std::env;
use std::time::Duration;

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_var(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Per-modality vector index collection names.
#[derive(Debug, Clone)]
pub struct CollectionNames {
    pub text: String,
    pub image: String,
    pub video: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            text: env_var("QDRANT_COLLECTION_TEXT").unwrap_or_else(|| "retrieval_text".into()),
            image: env_var("QDRANT_COLLECTION_IMAGE").unwrap_or_else(|| "retrieval_image".into()),
            video: env_var("QDRANT_COLLECTION_VIDEO").unwrap_or_else(|| "retrieval_video".into()),
        }
    }
}

/// Connection details for the vector index backend.
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub vector_size: usize,
    pub collections: CollectionNames,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            url: env_var("QDRANT_URL").unwrap_or_else(|| "http://localhost:6333".into()),
            api_key: env_var("QDRANT_API_KEY"),
            vector_size: env_parse("VECTOR_SIZE", 384),
            collections: CollectionNames::default(),
        }
    }
}

/// Per-call timeouts, all independently configurable (ms).
#[derive(Debug, Clone)]
pub struct TimeoutsConfig {
    pub embedding_ms: u64,
    pub vector_search_ms: u64,
    pub enrichment_ms: u64,
    pub session_write_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            embedding_ms: env_parse("EMBEDDING_TIMEOUT_MS", 2_000),
            vector_search_ms: env_parse("VECTOR_SEARCH_TIMEOUT_MS", 2_000),
            enrichment_ms: env_parse("ENRICHMENT_TIMEOUT_MS", 1_000),
            session_write_ms: env_parse("SESSION_WRITE_TIMEOUT_MS", 500),
        }
    }
}

impl TimeoutsConfig {
    pub fn embedding(&self) -> Duration {
        Duration::from_millis(self.embedding_ms)
    }
    pub fn vector_search(&self) -> Duration {
        Duration::from_millis(self.vector_search_ms)
    }
    pub fn enrichment(&self) -> Duration {
        Duration::from_millis(self.enrichment_ms)
    }
    pub fn session_write(&self) -> Duration {
        Duration::from_millis(self.session_write_ms)
    }
}

/// Bounded-concurrency pool sizes (back-pressure is an explicit, configured
/// knob rather than an unbounded spawn per request).
#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    pub per_modality: usize,
    pub enrichment: usize,
    pub inbound: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            per_modality: env_parse("CONCURRENCY_PER_MODALITY", 32),
            enrichment: env_parse("ENRICHMENT_CONCURRENCY", 16),
            inbound: env_parse("INBOUND_CONCURRENCY", 256),
        }
    }
}

/// Read-through LRU cache in front of `get_content_by_embedding_id`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub size: usize,
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size: env_parse("CACHE_SIZE", 10_000),
            ttl_ms: env_parse("CACHE_TTL_MS", 60_000),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Top-level configuration for the retrieval core, assembled from the
/// environment at process startup.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub database_url: String,
    pub vector_index: VectorIndexConfig,
    pub multimodal_worker_url: String,
    pub default_search_limit: usize,
    pub max_search_limit: usize,
    pub max_query_length: usize,
    pub similarity_threshold: f32,
    pub timeouts: TimeoutsConfig,
    pub concurrency: ConcurrencyConfig,
    pub cache: CacheConfig,
    pub session_retention_hours: Option<u64>,
    pub blob_base_url: String,
    pub request_deadline_ms: u64,
}

impl RetrievalConfig {
    /// Load configuration from the process environment, falling back to
    /// sane defaults for anything unset. `.env` is loaded first if
    /// present, same as every other ConHub-style service entrypoint.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost/retrieval".into()),
            vector_index: VectorIndexConfig::default(),
            multimodal_worker_url: env_var("MULTIMODAL_WORKER_URL")
                .unwrap_or_else(|| "http://localhost:8001".into()),
            default_search_limit: env_parse("DEFAULT_SEARCH_LIMIT", 10),
            max_search_limit: env_parse("MAX_SEARCH_LIMIT", 100),
            max_query_length: env_parse("MAX_QUERY_LENGTH", 8_192),
            similarity_threshold: env_parse("SIMILARITY_THRESHOLD", 0.7_f32),
            timeouts: TimeoutsConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            cache: CacheConfig::default(),
            session_retention_hours: env_var("SESSION_RETENTION_HOURS")
                .and_then(|v| v.parse().ok()),
            blob_base_url: env_var("BLOB_BASE_URL")
                .unwrap_or_else(|| "http://localhost:9000/retrieval-media".into()),
            request_deadline_ms: env_parse("REQUEST_DEADLINE_MS", 8_000),
        }
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = VectorIndexConfig::default();
        assert_eq!(cfg.vector_size, 384);
        assert_eq!(cfg.collections.text, "retrieval_text");
    }

    #[test]
    fn timeouts_convert_to_durations() {
        let t = TimeoutsConfig::default();
        assert_eq!(t.embedding(), Duration::from_millis(2_000));
        assert_eq!(t.session_write(), Duration::from_millis(500));
    }
}
