use actix_web::{web, HttpResponse};
use retrieval_core::engine::SearchRequest;

use crate::dto::{parse_modalities, SearchRequestBody, SearchResponseBody};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn search(
    state: web::Data<AppState>,
    body: web::Json<SearchRequestBody>,
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
    if let Some(limit) = body.limit {
        if !(1..=100).contains(&limit) {
            return Err(ApiError::InvalidRequest("limit must be between 1 and 100".into()));
        }
    }
    if let Some(threshold) = body.score_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ApiError::InvalidRequest(
                "score_threshold must be between 0 and 1".into(),
            ));
        }
    }
    let modalities = parse_modalities(body.modalities).map_err(ApiError::InvalidRequest)?;

    let request = SearchRequest {
        query: body.query,
        modalities,
        limit: body.limit,
        filters: body.filters.map(Into::into),
        score_floor: body.score_threshold,
    };

    let result = state.engine.search(request).await?;
    Ok(HttpResponse::Ok().json(SearchResponseBody::from(result)))
}
