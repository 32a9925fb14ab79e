use actix_web::{web, HttpResponse};
use retrieval_core::engine::SearchRequest;

use crate::dto::{parse_modalities, ContextBundleRequestBody, ContextBundleResponseBody};
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /context-bundle`: the HTTP surface contains no
/// retrieval logic of its own, so this runs the same engine search as
/// `/search` and serialises only the `context_bundle` portion.
pub async fn context_bundle(
    state: web::Data<AppState>,
    body: web::Json<ContextBundleRequestBody>,
) -> Result<HttpResponse, ApiError> {
    let _permit = state.acquire_permit().await?;
    let body = body.into_inner();

    if body.query.trim().is_empty() {
        return Err(ApiError::InvalidRequest("query must not be empty".into()));
    }
    if body.query.len() > state.config.max_query_length {
        return Err(ApiError::InvalidRequest(format!(
            "query exceeds max length of {} bytes",
            state.config.max_query_length
        )));
    }
    if let Some(limit) = body.max_results {
        if !(1..=100).contains(&limit) {
            return Err(ApiError::InvalidRequest(
                "max_results must be between 1 and 100".into(),
            ));
        }
    }
    if let Some(threshold) = body.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ApiError::InvalidRequest(
                "threshold must be between 0 and 1".into(),
            ));
        }
    }
    let modalities = parse_modalities(body.modalities).map_err(ApiError::InvalidRequest)?;

    let request = SearchRequest {
        query: body.query,
        modalities,
        limit: body.max_results,
        filters: None,
        score_floor: body.threshold,
    };

    let result = state.engine.search(request).await?;
    Ok(HttpResponse::Ok().json(ContextBundleResponseBody {
        success: true,
        context_bundle: result.context_bundle,
    }))
}
