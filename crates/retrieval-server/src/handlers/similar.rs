use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::dto::{SearchResponseBody, SimilarQuery};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn similar(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<SimilarQuery>,
) -> Result<HttpResponse, ApiError> {
    let _permit = state.acquire_permit().await?;
    let document_id = path.into_inner();
    let query = query.into_inner();

    if let Some(limit) = query.limit {
        if !(1..=100).contains(&limit) {
            return Err(ApiError::InvalidRequest("limit must be between 1 and 100".into()));
        }
    }
    if let Some(threshold) = query.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ApiError::InvalidRequest(
                "threshold must be between 0 and 1".into(),
            ));
        }
    }

    let result = state
        .engine
        .search_similar(document_id, query.limit, query.threshold)
        .await?;
    Ok(HttpResponse::Ok().json(SearchResponseBody::from(result)))
}
