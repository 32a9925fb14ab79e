//! Metadata Store: durable home for Documents, Content
//! Items, and Search Sessions, plus the hot `embedding_id` join.

mod memory;
mod postgres;

pub use memory::InMemoryMetadataStore;
pub use postgres::PgMetadataStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ContentFields, ContentItem, ContentKind, DeletionPlan, Document, NewDocument, SearchFilters,
    SearchSession, ContextBundle, Modality,
};
use crate::error::StoreError;

/// Outcome of `put_document`: either a fresh row or the id of an existing
/// one with the same content hash.
#[derive(Debug, Clone, Copy)]
pub enum PutDocumentOutcome {
    Created(Uuid),
    AlreadyExists(Uuid),
}

/// The joined row returned by the hot `get_content_by_embedding_id` path.
#[derive(Debug, Clone)]
pub struct ContentJoin {
    pub item: ContentItem,
    pub document: Document,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put_document(&self, fields: NewDocument) -> Result<PutDocumentOutcome, StoreError>;

    async fn get_document_by_hash(&self, hash: &str) -> Result<Option<Document>, StoreError>;

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StoreError>;

    async fn put_content_item(
        &self,
        document_id: Uuid,
        kind: ContentKind,
        fields: ContentFields,
        caption: Option<String>,
        embedding_id: String,
    ) -> Result<Uuid, StoreError>;

    /// The hot join used on every result. Returns `None` rather than an
    /// error when the embedding id is unknown (weak-reference tolerance:
    /// a vector record can outlive or precede its metadata row).
    async fn get_content_by_embedding_id(
        &self,
        embedding_id: &str,
    ) -> Result<Option<ContentJoin>, StoreError>;

    /// Any Content Item belonging to `document_id`, used by
    /// `search_similar` to pick a representative query vector: primary
    /// text chunk if present, else first image, else first video
    ///.
    async fn representative_content_item(
        &self,
        document_id: Uuid,
    ) -> Result<Option<ContentItem>, StoreError>;

    async fn put_search_session(
        &self,
        query: String,
        modalities: Vec<Modality>,
        filters: SearchFilters,
        results: Vec<crate::domain::SessionResult>,
        bundle: ContextBundle,
    ) -> Result<Uuid, StoreError>;

    async fn get_search_session(&self, session_id: Uuid) -> Result<Option<SearchSession>, StoreError>;

    async fn list_recent_sessions(&self, limit: usize) -> Result<Vec<SearchSession>, StoreError>;

    /// Deletes the Document and all its Content Items, returning the
    /// embedding ids (grouped by modality) that the caller must now
    /// remove from the Vector Index.
    async fn delete_document(&self, document_id: Uuid) -> Result<DeletionPlan, StoreError>;

    /// Removes sessions older than `now - retention`. Not scheduled
    /// automatically; exposed for a
    /// deployer-driven admin call.
    async fn gc_expired_sessions(&self, now: DateTime<Utc>, retention: std::time::Duration) -> Result<usize, StoreError>;
}
