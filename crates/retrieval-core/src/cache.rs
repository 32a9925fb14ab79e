//! Size-bounded, TTL-bound, read-through cache in front of
//! `MetadataStore::get_content_by_embedding_id`.
//! Never written-behind; a miss always falls through to the store.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::store::ContentJoin;

struct Entry {
    value: Option<ContentJoin>,
    inserted_at: Instant,
}

/// Read-through LRU cache keyed by embedding id. Also tracks which
/// document ids are represented in the cache so a delete-document
/// operation can issue a best-effort coarse purge.
pub struct ContentCache {
    inner: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl ContentCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, embedding_id: &str) -> Option<Option<ContentJoin>> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.get(embedding_id)?;
        if entry.inserted_at.elapsed() > self.ttl {
            inner.pop(embedding_id);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn put(&self, embedding_id: String, value: Option<ContentJoin>) {
        let mut inner = self.inner.lock().unwrap();
        inner.put(
            embedding_id,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Best-effort, coarse purge of every cached entry belonging to
    /// `document_id`. O(n) in cache size; acceptable because this only
    /// runs on the admin delete path, never the hot search path.
    pub fn purge_document(&self, document_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        let stale: Vec<String> = inner
            .iter()
            .filter(|(_, entry)| {
                entry
                    .value
                    .as_ref()
                    .map(|join| join.document.id == document_id)
                    .unwrap_or(false)
            })
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            inner.pop(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContentFields, ContentItem, ContentKind, Document, DocumentKind};
    use chrono::Utc;

    fn sample_join() -> ContentJoin {
        let document_id = Uuid::new_v4();
        ContentJoin {
            item: ContentItem {
                id: Uuid::new_v4(),
                document_id,
                kind: ContentKind::Chunk,
                embedding_id: "e1".into(),
                caption: None,
                fields: ContentFields::Chunk {
                    text: "hello".into(),
                    chunk_index: 0,
                },
            },
            document: Document {
                id: document_id,
                filename: "a.txt".into(),
                kind: DocumentKind::Text,
                byte_length: 5,
                mime_type: "text/plain".into(),
                content_hash: "hash".into(),
                metadata: serde_json::json!({}),
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn hit_then_purge_by_document() {
        let cache = ContentCache::new(10, Duration::from_secs(60));
        let join = sample_join();
        let document_id = join.document.id;
        cache.put("e1".into(), Some(join));

        assert!(cache.get("e1").is_some());
        cache.purge_document(document_id);
        assert!(cache.get("e1").is_none());
    }

    #[test]
    fn expired_entry_is_treated_as_miss() {
        let cache = ContentCache::new(10, Duration::from_millis(0));
        cache.put("e1".into(), None);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("e1").is_none());
    }
}
