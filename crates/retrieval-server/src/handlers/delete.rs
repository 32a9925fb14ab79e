use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::dto::DeleteResponseBody;
use crate::error::ApiError;
use crate::state::AppState;

/// `DELETE /content/{document_id}`. Accepts either the
/// Document's UUID or the `content_id`/content-hash it was indexed
/// under, so a caller can delete by whichever id it has on hand.
pub async fn delete_content(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let _permit = state.acquire_permit().await?;
    let raw_id = path.into_inner();

    let document_id = match Uuid::parse_str(&raw_id) {
        Ok(id) => id,
        Err(_) => state
            .store
            .get_document_by_hash(&raw_id)
            .await
            .map_err(retrieval_core::EngineError::from)?
            .ok_or_else(|| ApiError::NotFound(format!("no document with id {raw_id}")))?
            .id,
    };

    let plan = state
        .store
        .delete_document(document_id)
        .await
        .map_err(retrieval_core::EngineError::from)?;

    for (modality, embedding_ids) in plan.by_modality {
        if embedding_ids.is_empty() {
            continue;
        }
        if let Err(e) = state.vectors.delete(modality, &embedding_ids).await {
            tracing::warn!(
                modality = modality.as_str(),
                error = %e,
                "best-effort vector deletion failed after metadata deletion committed"
            );
        }
    }

    state.engine.invalidate_document(document_id);

    Ok(HttpResponse::Ok().json(DeleteResponseBody {
        success: true,
        content_id: raw_id,
    }))
}
