//! In-memory `MetadataStore` fake, standing in for Postgres in tests
//! (there is no live database in this exercise).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{ContentJoin, MetadataStore, PutDocumentOutcome};
use crate::domain::{
    ContentFields, ContentItem, ContentKind, ContextBundle, DeletionPlan, Document, NewDocument,
    SearchFilters, SearchSession, SessionResult, Modality,
};
use crate::error::StoreError;

#[derive(Default)]
struct Inner {
    documents: HashMap<Uuid, Document>,
    by_hash: HashMap<String, Uuid>,
    items: HashMap<Uuid, ContentItem>,
    items_by_document: HashMap<Uuid, Vec<Uuid>>,
    items_by_embedding_id: HashMap<String, Uuid>,
    sessions: HashMap<Uuid, SearchSession>,
}

/// Thread-safe in-memory implementation used by unit and integration
/// tests in place of `PgMetadataStore`.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    inner: Mutex<Inner>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put_document(&self, fields: NewDocument) -> Result<PutDocumentOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(&existing) = inner.by_hash.get(&fields.content_hash) {
            return Ok(PutDocumentOutcome::AlreadyExists(existing));
        }
        let id = Uuid::new_v4();
        let doc = Document {
            id,
            filename: fields.filename,
            kind: fields.kind,
            byte_length: fields.byte_length,
            mime_type: fields.mime_type,
            content_hash: fields.content_hash.clone(),
            metadata: fields.metadata,
            created_at: Utc::now(),
        };
        inner.by_hash.insert(fields.content_hash, id);
        inner.documents.insert(id, doc);
        Ok(PutDocumentOutcome::Created(id))
    }

    async fn get_document_by_hash(&self, hash: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .by_hash
            .get(hash)
            .and_then(|id| inner.documents.get(id))
            .cloned())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.documents.get(&id).cloned())
    }

    async fn put_content_item(
        &self,
        document_id: Uuid,
        kind: ContentKind,
        fields: ContentFields,
        caption: Option<String>,
        embedding_id: String,
    ) -> Result<Uuid, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.documents.contains_key(&document_id) {
            return Err(StoreError::DocumentNotFound(document_id));
        }
        let id = Uuid::new_v4();
        let item = ContentItem {
            id,
            document_id,
            kind,
            embedding_id: embedding_id.clone(),
            caption,
            fields,
        };
        inner.items.insert(id, item);
        inner.items_by_document.entry(document_id).or_default().push(id);
        inner.items_by_embedding_id.insert(embedding_id, id);
        Ok(id)
    }

    async fn get_content_by_embedding_id(
        &self,
        embedding_id: &str,
    ) -> Result<Option<ContentJoin>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(item_id) = inner.items_by_embedding_id.get(embedding_id) else {
            return Ok(None);
        };
        let Some(item) = inner.items.get(item_id) else {
            return Ok(None);
        };
        let Some(document) = inner.documents.get(&item.document_id) else {
            return Ok(None);
        };
        Ok(Some(ContentJoin {
            item: item.clone(),
            document: document.clone(),
        }))
    }

    async fn representative_content_item(
        &self,
        document_id: Uuid,
    ) -> Result<Option<ContentItem>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(ids) = inner.items_by_document.get(&document_id) else {
            return Ok(None);
        };
        let items: Vec<&ContentItem> = ids.iter().filter_map(|id| inner.items.get(id)).collect();
        let pick = items
            .iter()
            .find(|i| matches!(i.fields, ContentFields::Chunk { .. }))
            .or_else(|| items.iter().find(|i| matches!(i.fields, ContentFields::Image { .. })))
            .or_else(|| items.iter().find(|i| matches!(i.fields, ContentFields::Video { .. })))
            .copied();
        Ok(pick.cloned())
    }

    async fn put_search_session(
        &self,
        query: String,
        modalities: Vec<Modality>,
        filters: SearchFilters,
        results: Vec<SessionResult>,
        bundle: ContextBundle,
    ) -> Result<Uuid, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = Uuid::new_v4();
        let session = SearchSession {
            id,
            query,
            modalities,
            filters,
            results,
            bundle,
            created_at: Utc::now(),
        };
        inner.sessions.insert(id, session);
        Ok(id)
    }

    async fn get_search_session(&self, session_id: Uuid) -> Result<Option<SearchSession>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sessions.get(&session_id).cloned())
    }

    async fn list_recent_sessions(&self, limit: usize) -> Result<Vec<SearchSession>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut sessions: Vec<SearchSession> = inner.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<DeletionPlan, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.documents.remove(&document_id).is_none() {
            return Err(StoreError::DocumentNotFound(document_id));
        }
        let ids = inner.items_by_document.remove(&document_id).unwrap_or_default();
        let mut plan = DeletionPlan::default();
        for id in ids {
            if let Some(item) = inner.items.remove(&id) {
                inner.items_by_embedding_id.remove(&item.embedding_id);
                plan.by_modality
                    .entry(item.kind.modality())
                    .or_default()
                    .push(item.embedding_id);
            }
        }
        Ok(plan)
    }

    async fn gc_expired_sessions(
        &self,
        now: DateTime<Utc>,
        retention: std::time::Duration,
    ) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let cutoff = now - chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::zero());
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| s.created_at >= cutoff);
        Ok(before - inner.sessions.len())
    }
}
