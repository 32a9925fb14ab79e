use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use retrieval_core::domain::{ContentFields, ContentKind, DocumentKind, Modality, NewDocument, VectorRecord};
use retrieval_core::store::PutDocumentOutcome;
use uuid::Uuid;

use crate::dto::{IndexRequestBody, IndexResponseBody};
use crate::error::ApiError;
use crate::state::AppState;

fn document_kind_for(modality: Modality) -> DocumentKind {
    match modality {
        Modality::Text => DocumentKind::Text,
        Modality::Image => DocumentKind::Image,
        Modality::Video => DocumentKind::Video,
    }
}

fn default_mime_type(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Chunk => "text/plain",
        ContentKind::Image => "image/jpeg",
        ContentKind::Video => "video/mp4",
        ContentKind::Keyframe => "image/jpeg",
    }
}

/// Builds the kind-specific Content Item fields from the flat `/index`
/// request. The wire contract only carries `content_id`,
/// `content_type`, `content`, `embeddings`, and `metadata` — richer
/// per-kind fields (storage paths, dimensions, parent video) travel
/// inside `metadata` when the caller has them.
fn fields_from_metadata(
    kind: ContentKind,
    content: &str,
    content_id: &str,
    metadata: &serde_json::Value,
) -> Result<ContentFields, ApiError> {
    let get_str = |key: &str| metadata.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let get_u32 = |key: &str| metadata.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let get_f64 = |key: &str| metadata.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);

    match kind {
        ContentKind::Chunk => Ok(ContentFields::Chunk {
            text: content.to_string(),
            chunk_index: metadata.get("chunk_index").and_then(|v| v.as_i64()).unwrap_or(0) as i32,
        }),
        ContentKind::Image => Ok(ContentFields::Image {
            storage_path: get_str("storage_path").unwrap_or_else(|| format!("images/{content_id}")),
            width: get_u32("width"),
            height: get_u32("height"),
        }),
        ContentKind::Video => Ok(ContentFields::Video {
            storage_path: get_str("storage_path").unwrap_or_else(|| format!("videos/{content_id}")),
            duration_seconds: get_f64("duration_seconds"),
            width: get_u32("width"),
            height: get_u32("height"),
            transcription: if content.is_empty() { None } else { Some(content.to_string()) },
        }),
        ContentKind::Keyframe => {
            let parent_video_id = get_str("parent_video_id")
                .ok_or_else(|| ApiError::InvalidRequest("keyframe requires metadata.parent_video_id".into()))?;
            let parent_video_id = Uuid::parse_str(&parent_video_id)
                .map_err(|_| ApiError::InvalidRequest("metadata.parent_video_id is not a valid uuid".into()))?;
            Ok(ContentFields::Keyframe {
                parent_video_id,
                timestamp_seconds: get_f64("timestamp_seconds"),
                storage_path: get_str("storage_path").unwrap_or_else(|| format!("keyframes/{content_id}")),
            })
        }
    }
}

/// `POST /index`: indexes one Content Item and its vector.
/// `content_id` doubles as the Document's content-hash de-duplication
/// key, so re-posting the same `content_id` is idempotent and reports
/// `already_exists: true` instead of creating a duplicate.
pub async fn index_content(
    state: web::Data<AppState>,
    body: web::Json<IndexRequestBody>,
) -> Result<HttpResponse, ApiError> {
    let _permit = state.acquire_permit().await?;
    let body = body.into_inner();

    if body.content_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("content_id must not be empty".into()));
    }
    let content_kind = ContentKind::parse(&body.content_type)
        .ok_or_else(|| ApiError::InvalidRequest(format!("unknown content_type: {}", body.content_type)))?;

    let expected_dim = state.config.vector_index.vector_size;
    if body.embeddings.len() != expected_dim {
        return Err(ApiError::DimensionMismatch(format!(
            "expected dimension {expected_dim}, got {}",
            body.embeddings.len()
        )));
    }
    if body.embeddings.iter().any(|v| !v.is_finite()) {
        return Err(ApiError::InvalidRequest("embeddings must be finite numbers".into()));
    }

    let modality = content_kind.modality();
    let metadata = body.metadata.clone().unwrap_or_else(|| serde_json::json!({}));

    let outcome = state
        .store
        .put_document(NewDocument {
            filename: body.content_id.clone(),
            kind: document_kind_for(modality),
            byte_length: body.content.len() as i64,
            mime_type: default_mime_type(content_kind).to_string(),
            content_hash: body.content_id.clone(),
            metadata: metadata.clone(),
        })
        .await
        .map_err(retrieval_core::EngineError::from)?;

    let (document_id, already_exists) = match outcome {
        PutDocumentOutcome::Created(id) => (id, false),
        PutDocumentOutcome::AlreadyExists(id) => (id, true),
    };

    let mut vector_ids = Vec::new();
    if already_exists {
        if let Some(existing) = state
            .store
            .representative_content_item(document_id)
            .await
            .map_err(retrieval_core::EngineError::from)?
        {
            vector_ids.push(existing.embedding_id);
        }
    } else {
        let fields = fields_from_metadata(content_kind, &body.content, &body.content_id, &metadata)?;
        let embedding_id = Uuid::new_v4().to_string();

        state
            .store
            .put_content_item(document_id, content_kind, fields, None, embedding_id.clone())
            .await
            .map_err(retrieval_core::EngineError::from)?;

        let mut payload = HashMap::new();
        payload.insert("document_id".to_string(), serde_json::json!(document_id.to_string()));
        payload.insert("content_type".to_string(), serde_json::json!(content_kind.as_str()));

        state
            .vectors
            .upsert(
                modality,
                vec![VectorRecord {
                    embedding_id: embedding_id.clone(),
                    vector: body.embeddings,
                    payload,
                }],
            )
            .await
            .map_err(retrieval_core::EngineError::from)?;

        vector_ids.push(embedding_id);
    }

    Ok(HttpResponse::Ok().json(IndexResponseBody {
        success: true,
        content_id: body.content_id,
        vector_ids,
        already_exists: already_exists.then_some(true),
    }))
}
