use actix_web::{web, HttpResponse};
use retrieval_core::domain::Modality;
use retrieval_core::vector_index::CollectionStats;

use crate::dto::{ModalityStatsBody, ModalityStatsConfigBody, StatsResponseBody};
use crate::error::ApiError;
use crate::state::AppState;

fn to_body(stats: CollectionStats) -> ModalityStatsBody {
    ModalityStatsBody {
        vectors_count: stats.vectors_count,
        points_count: stats.points_count,
        config: ModalityStatsConfigBody {
            vector_size: stats.vector_size,
            distance: stats.distance,
        },
    }
}

/// `GET /stats`: per-modality vector counts plus the
/// `config: {vector_size, distance}` each collection was created with.
pub async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let text = state
        .vectors
        .collection_stats(Modality::Text)
        .await
        .map_err(retrieval_core::EngineError::from)?;
    let image = state
        .vectors
        .collection_stats(Modality::Image)
        .await
        .map_err(retrieval_core::EngineError::from)?;
    let video = state
        .vectors
        .collection_stats(Modality::Video)
        .await
        .map_err(retrieval_core::EngineError::from)?;

    Ok(HttpResponse::Ok().json(StatsResponseBody {
        text: to_body(text),
        image: to_body(image),
        video: to_body(video),
    }))
}
