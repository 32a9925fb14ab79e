use actix_web::HttpResponse;
use chrono::Utc;

use crate::dto::HealthResponseBody;

/// `GET /health`: returns immediately, excluded from request
/// logging by the observability middleware's default `exclude_paths`.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponseBody {
        status: "healthy",
        timestamp: Utc::now(),
    })
}
