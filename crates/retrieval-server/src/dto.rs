//! Request/response bodies for the HTTP surface. Kept separate
//! from `retrieval_core::domain` so the wire format can evolve
//! independently of the engine's internal types.

use chrono::{DateTime, Utc};
use retrieval_core::domain::{
    Artifacts, Citation, ContentFields, ContextBundle, DateRange, EnrichedHit, Modality,
    ResponseFlags, SearchFilters, SearchResult,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TRANSCRIPTION_EXCERPT_LIMIT: usize = 500;

fn content_excerpt(fields: &ContentFields, caption: Option<&str>) -> String {
    match fields {
        ContentFields::Chunk { text, .. } => text.clone(),
        ContentFields::Image { .. } | ContentFields::Keyframe { .. } => {
            caption.unwrap_or("(no caption)").to_string()
        }
        ContentFields::Video { transcription, .. } => match transcription {
            Some(t) if t.chars().count() > TRANSCRIPTION_EXCERPT_LIMIT => {
                let truncated: String = t.chars().take(TRANSCRIPTION_EXCERPT_LIMIT).collect();
                format!("{truncated}...")
            }
            Some(t) => t.clone(),
            None => "(no transcription)".to_string(),
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequestBody {
    pub query: String,
    #[serde(default)]
    pub modalities: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub filters: Option<FiltersBody>,
    #[serde(default)]
    pub score_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FiltersBody {
    #[serde(default)]
    pub content_types: Option<Vec<String>>,
    #[serde(default)]
    pub file_types: Option<Vec<String>>,
    #[serde(default)]
    pub min_score: Option<f32>,
    #[serde(default)]
    pub date_range: Option<DateRangeBody>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeBody {
    pub gte: Option<DateTime<Utc>>,
    pub lte: Option<DateTime<Utc>>,
}

impl From<FiltersBody> for SearchFilters {
    fn from(f: FiltersBody) -> Self {
        SearchFilters {
            file_types: f.file_types,
            content_types: f.content_types,
            min_score: f.min_score,
            date_range: f.date_range.map(|d| DateRange { gte: d.gte, lte: d.lte }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContextBundleRequestBody {
    pub query: String,
    #[serde(default)]
    pub modalities: Option<Vec<String>>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct IndexRequestBody {
    pub content_id: String,
    pub content_type: String,
    pub content: String,
    pub embeddings: Vec<f32>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct IndexResponseBody {
    pub success: bool,
    pub content_id: String,
    pub vector_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_exists: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponseBody {
    pub success: bool,
    pub content_id: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponseBody {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SearchMetadataBody {
    pub search_timestamp: DateTime<Utc>,
    pub filters_applied: SearchFilters,
    pub score_threshold: f32,
    pub flags: ResponseFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_error: Option<String>,
}

/// One entry of `results[]`: flattens `EnrichedHit`'s tagged `fields`
/// into a `content_type`/`content` pair and nests the citation under
/// `citations` rather than leaving it a method callers must invoke
/// themselves.
#[derive(Debug, Serialize)]
pub struct ResultItemBody {
    pub embedding_id: String,
    pub score: f32,
    pub modality: Modality,
    pub content_type: &'static str,
    pub content: String,
    pub document_id: Uuid,
    pub filename: String,
    pub file_type: String,
    pub metadata: serde_json::Value,
    pub citations: Citation,
    pub artifacts: Artifacts,
}

impl From<EnrichedHit> for ResultItemBody {
    fn from(hit: EnrichedHit) -> Self {
        let content_type = match hit.fields {
            ContentFields::Chunk { .. } => "text",
            ContentFields::Image { .. } => "image",
            ContentFields::Video { .. } => "video",
            ContentFields::Keyframe { .. } => "keyframe",
        };
        let content = content_excerpt(&hit.fields, hit.caption.as_deref());
        let citations = hit.citation();
        ResultItemBody {
            embedding_id: hit.embedding_id,
            score: hit.score,
            modality: hit.modality,
            content_type,
            content,
            document_id: hit.document_id,
            filename: hit.filename,
            file_type: hit.file_type,
            metadata: hit.metadata,
            citations,
            artifacts: hit.artifacts,
        }
    }
}

/// The `{success:true, ...}` envelope shared by `/search` and `/similar`
///.
#[derive(Debug, Serialize)]
pub struct SearchResponseBody {
    pub success: bool,
    pub session_id: Option<Uuid>,
    pub query: String,
    pub modalities: Vec<Modality>,
    pub results_count: usize,
    pub results: Vec<ResultItemBody>,
    pub context_bundle: ContextBundle,
    pub metadata: SearchMetadataBody,
}

impl From<SearchResult> for SearchResponseBody {
    fn from(r: SearchResult) -> Self {
        SearchResponseBody {
            success: true,
            session_id: r.session_id,
            query: r.query,
            modalities: r.modalities,
            results_count: r.results_count,
            results: r.results.into_iter().map(ResultItemBody::from).collect(),
            context_bundle: r.context_bundle,
            metadata: SearchMetadataBody {
                search_timestamp: r.search_timestamp,
                filters_applied: r.filters_applied,
                score_threshold: r.score_threshold,
                flags: r.flags,
                session_error: r.session_error,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContextBundleResponseBody {
    pub success: bool,
    pub context_bundle: ContextBundle,
}

#[derive(Debug, Serialize)]
pub struct StatsResponseBody {
    pub text: ModalityStatsBody,
    pub image: ModalityStatsBody,
    pub video: ModalityStatsBody,
}

#[derive(Debug, Serialize)]
pub struct ModalityStatsBody {
    pub vectors_count: u64,
    pub points_count: u64,
    pub config: ModalityStatsConfigBody,
}

#[derive(Debug, Serialize)]
pub struct ModalityStatsConfigBody {
    pub vector_size: usize,
    pub distance: String,
}

/// Parses the request's `modalities` strings into `Modality`, rejecting
/// anything unrecognised.
pub fn parse_modalities(raw: Option<Vec<String>>) -> Result<Option<Vec<Modality>>, String> {
    let Some(raw) = raw else { return Ok(None) };
    let mut out = Vec::with_capacity(raw.len());
    for m in raw {
        match Modality::parse(&m) {
            Some(modality) => out.push(modality),
            None => return Err(format!("unknown modality: {m}")),
        }
    }
    Ok(Some(out))
}
