//! Postgres-backed `MetadataStore`: one struct wrapping a pool,
//! `ON CONFLICT` upserts, `anyhow::Context` at call sites, errors mapped
//! into this module's own `thiserror` enum at the boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ContentJoin, MetadataStore, PutDocumentOutcome};
use crate::domain::{
    ContentFields, ContentItem, ContentKind, ContextBundle, DeletionPlan, Document, DocumentKind,
    Modality, NewDocument, SearchFilters, SearchSession, SessionResult,
};
use crate::error::StoreError;

pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the crate's bundled migrations. Called once at server
    /// startup, same as the other ConHub services' `sqlx::migrate!` use.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Corrupt(err.to_string()),
    }
}

fn row_to_document(
    id: Uuid,
    filename: String,
    kind: String,
    byte_length: i64,
    mime_type: String,
    content_hash: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
) -> Result<Document, StoreError> {
    let kind = DocumentKind::parse(&kind)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown document kind {kind}")))?;
    Ok(Document {
        id,
        filename,
        kind,
        byte_length,
        mime_type,
        content_hash,
        metadata,
        created_at,
    })
}

fn row_to_content_item(
    id: Uuid,
    document_id: Uuid,
    kind: String,
    embedding_id: String,
    caption: Option<String>,
    fields: serde_json::Value,
) -> Result<ContentItem, StoreError> {
    let kind = ContentKind::parse(&kind)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown content kind {kind}")))?;
    let fields: ContentFields = serde_json::from_value(fields)
        .map_err(|e| StoreError::Corrupt(format!("malformed content fields: {e}")))?;
    Ok(ContentItem {
        id,
        document_id,
        kind,
        embedding_id,
        caption,
        fields,
    })
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn put_document(&self, fields: NewDocument) -> Result<PutDocumentOutcome, StoreError> {
        if let Some(existing) = self.get_document_by_hash(&fields.content_hash).await? {
            return Ok(PutDocumentOutcome::AlreadyExists(existing.id));
        }

        let id = Uuid::new_v4();
        let kind = fields.kind.as_str();

        let inserted = sqlx::query!(
            r#"
            INSERT INTO documents (id, filename, kind, byte_length, mime_type, content_hash, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (content_hash) DO NOTHING
            RETURNING id
            "#,
            id,
            fields.filename,
            kind,
            fields.byte_length,
            fields.mime_type,
            fields.content_hash,
            fields.metadata,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match inserted {
            Some(row) => Ok(PutDocumentOutcome::Created(row.id)),
            None => {
                // Lost the insert race to a concurrent writer with the same hash.
                let existing = self
                    .get_document_by_hash(&fields.content_hash)
                    .await?
                    .ok_or_else(|| StoreError::Corrupt("content_hash vanished after conflict".into()))?;
                Ok(PutDocumentOutcome::AlreadyExists(existing.id))
            }
        }
    }

    async fn get_document_by_hash(&self, hash: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query!(
            r#"SELECT id, filename, kind, byte_length, mime_type, content_hash, metadata, created_at
               FROM documents WHERE content_hash = $1"#,
            hash
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(|r| {
            row_to_document(
                r.id,
                r.filename,
                r.kind,
                r.byte_length,
                r.mime_type,
                r.content_hash,
                r.metadata,
                r.created_at,
            )
        })
        .transpose()
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query!(
            r#"SELECT id, filename, kind, byte_length, mime_type, content_hash, metadata, created_at
               FROM documents WHERE id = $1"#,
            id
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(|r| {
            row_to_document(
                r.id,
                r.filename,
                r.kind,
                r.byte_length,
                r.mime_type,
                r.content_hash,
                r.metadata,
                r.created_at,
            )
        })
        .transpose()
    }

    async fn put_content_item(
        &self,
        document_id: Uuid,
        kind: ContentKind,
        fields: ContentFields,
        caption: Option<String>,
        embedding_id: String,
    ) -> Result<Uuid, StoreError> {
        if self.get_document(document_id).await?.is_none() {
            return Err(StoreError::DocumentNotFound(document_id));
        }

        let id = Uuid::new_v4();
        let fields_json = serde_json::to_value(&fields)
            .map_err(|e| StoreError::Corrupt(format!("failed to serialize fields: {e}")))?;

        sqlx::query!(
            r#"
            INSERT INTO content_items (id, document_id, kind, embedding_id, caption, fields)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (embedding_id) DO UPDATE SET
                caption = EXCLUDED.caption,
                fields = EXCLUDED.fields
            "#,
            id,
            document_id,
            kind.as_str(),
            embedding_id,
            caption,
            fields_json,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(id)
    }

    async fn get_content_by_embedding_id(
        &self,
        embedding_id: &str,
    ) -> Result<Option<ContentJoin>, StoreError> {
        let row = sqlx::query!(
            r#"
            SELECT
                ci.id AS item_id, ci.document_id, ci.kind AS item_kind, ci.embedding_id,
                ci.caption, ci.fields,
                d.filename, d.kind AS doc_kind, d.byte_length, d.mime_type,
                d.content_hash, d.metadata, d.created_at
            FROM content_items ci
            JOIN documents d ON d.id = ci.document_id
            WHERE ci.embedding_id = $1
            "#,
            embedding_id
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let Some(r) = row else { return Ok(None) };

        let item = row_to_content_item(
            r.item_id,
            r.document_id,
            r.item_kind,
            r.embedding_id,
            r.caption,
            r.fields,
        )?;
        let document = row_to_document(
            r.document_id,
            r.filename,
            r.doc_kind,
            r.byte_length,
            r.mime_type,
            r.content_hash,
            r.metadata,
            r.created_at,
        )?;

        Ok(Some(ContentJoin { item, document }))
    }

    async fn representative_content_item(
        &self,
        document_id: Uuid,
    ) -> Result<Option<ContentItem>, StoreError> {
        let row = sqlx::query!(
            r#"
            SELECT id, document_id, kind, embedding_id, caption, fields
            FROM content_items
            WHERE document_id = $1
            ORDER BY
                CASE kind WHEN 'chunk' THEN 0 WHEN 'image' THEN 1 WHEN 'video' THEN 2 ELSE 3 END,
                created_at ASC
            LIMIT 1
            "#,
            document_id
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(|r| row_to_content_item(r.id, r.document_id, r.kind, r.embedding_id, r.caption, r.fields))
            .transpose()
    }

    async fn put_search_session(
        &self,
        query: String,
        modalities: Vec<Modality>,
        filters: SearchFilters,
        results: Vec<SessionResult>,
        bundle: ContextBundle,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let modalities_json = serde_json::to_value(&modalities)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let filters_json = serde_json::to_value(&filters).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let results_json = serde_json::to_value(&results).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let bundle_json = serde_json::to_value(&bundle).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        sqlx::query!(
            r#"
            INSERT INTO search_sessions (id, query, modalities, filters, results, bundle)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            id,
            query,
            modalities_json,
            filters_json,
            results_json,
            bundle_json,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(id)
    }

    async fn get_search_session(&self, session_id: Uuid) -> Result<Option<SearchSession>, StoreError> {
        let row = sqlx::query!(
            r#"SELECT id, query, modalities, filters, results, bundle, created_at
               FROM search_sessions WHERE id = $1"#,
            session_id
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let Some(r) = row else { return Ok(None) };
        Ok(Some(decode_session(
            r.id, r.query, r.modalities, r.filters, r.results, r.bundle, r.created_at,
        )?))
    }

    async fn list_recent_sessions(&self, limit: usize) -> Result<Vec<SearchSession>, StoreError> {
        let limit = limit as i64;
        let rows = sqlx::query!(
            r#"SELECT id, query, modalities, filters, results, bundle, created_at
               FROM search_sessions ORDER BY created_at DESC LIMIT $1"#,
            limit
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter()
            .map(|r| decode_session(r.id, r.query, r.modalities, r.filters, r.results, r.bundle, r.created_at))
            .collect()
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<DeletionPlan, StoreError> {
        let items = sqlx::query!(
            r#"SELECT kind, embedding_id FROM content_items WHERE document_id = $1"#,
            document_id
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let result = sqlx::query!(r#"DELETE FROM documents WHERE id = $1"#, document_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DocumentNotFound(document_id));
        }

        let mut plan = DeletionPlan::default();
        for row in items {
            let kind = ContentKind::parse(&row.kind)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown content kind {}", row.kind)))?;
            plan.by_modality
                .entry(kind.modality())
                .or_default()
                .push(row.embedding_id);
        }
        Ok(plan)
    }

    async fn gc_expired_sessions(
        &self,
        now: DateTime<Utc>,
        retention: std::time::Duration,
    ) -> Result<usize, StoreError> {
        let cutoff = now
            - chrono::Duration::from_std(retention).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let result = sqlx::query!(r#"DELETE FROM search_sessions WHERE created_at < $1"#, cutoff)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected() as usize)
    }
}

fn decode_session(
    id: Uuid,
    query: String,
    modalities: serde_json::Value,
    filters: serde_json::Value,
    results: serde_json::Value,
    bundle: serde_json::Value,
    created_at: DateTime<Utc>,
) -> Result<SearchSession, StoreError> {
    Ok(SearchSession {
        id,
        query,
        modalities: serde_json::from_value(modalities)
            .map_err(|e| StoreError::Corrupt(format!("malformed modalities: {e}")))?,
        filters: serde_json::from_value(filters)
            .map_err(|e| StoreError::Corrupt(format!("malformed filters: {e}")))?,
        results: serde_json::from_value(results)
            .map_err(|e| StoreError::Corrupt(format!("malformed results: {e}")))?,
        bundle: serde_json::from_value(bundle)
            .map_err(|e| StoreError::Corrupt(format!("malformed bundle: {e}")))?,
        created_at,
    })
}
