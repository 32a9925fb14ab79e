//! Core data model: Documents, Content Items, Vector Records,
//! Search Sessions, and the in-memory-only Enriched Hit / Context Bundle
//! types produced per request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Discriminator for a Document's raw media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Text,
    Image,
    Video,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Text => "text",
            DocumentKind::Image => "image",
            DocumentKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(DocumentKind::Text),
            "image" => Some(DocumentKind::Image),
            "video" => Some(DocumentKind::Video),
            _ => None,
        }
    }
}

/// A stable, deduplicated record of raw uploaded media.
///
/// Created once by the ingestion worker after content-hash de-duplication;
/// immutable thereafter except for `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub kind: DocumentKind,
    pub byte_length: i64,
    pub mime_type: String,
    pub content_hash: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a new Document. `id` and `created_at` are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub kind: DocumentKind,
    pub byte_length: i64,
    pub mime_type: String,
    pub content_hash: String,
    pub metadata: serde_json::Value,
}

/// One of the four Content Item kinds, tagged so modality rollups and the
/// context assembler can match without guessing from free-form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Chunk,
    Image,
    Video,
    Keyframe,
}

impl ContentKind {
    /// The Vector Index collection (modality) this kind's vector lives in.
    /// Keyframes live in the `image` collection.
    pub fn modality(self) -> Modality {
        match self {
            ContentKind::Chunk => Modality::Text,
            ContentKind::Image | ContentKind::Keyframe => Modality::Image,
            ContentKind::Video => Modality::Video,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Chunk => "chunk",
            ContentKind::Image => "image",
            ContentKind::Video => "video",
            ContentKind::Keyframe => "keyframe",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chunk" => Some(ContentKind::Chunk),
            "image" => Some(ContentKind::Image),
            "video" => Some(ContentKind::Video),
            "keyframe" => Some(ContentKind::Keyframe),
            _ => None,
        }
    }
}

/// The three searchable modalities; a Vector Index collection exists per
/// variant. Keyframes are a sub-kind of `Image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Image,
    Video,
}

impl Modality {
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Video => "video",
        }
    }

    pub fn all() -> [Modality; 3] {
        [Modality::Text, Modality::Image, Modality::Video]
    }

    /// Stable ordering used for tie-breaking: text before
    /// image before video.
    pub fn priority(self) -> u8 {
        match self {
            Modality::Text => 0,
            Modality::Image => 1,
            Modality::Video => 2,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Modality::Text),
            "image" => Some(Modality::Image),
            "video" => Some(Modality::Video),
            _ => None,
        }
    }
}

/// A Content Item: the smallest unit with its own vector. Exactly one
/// `embedding_id` per item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub document_id: Uuid,
    pub kind: ContentKind,
    pub embedding_id: String,
    pub caption: Option<String>,
    pub fields: ContentFields,
}

/// Type-specific fields, one variant per Content Item kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum ContentFields {
    Chunk {
        text: String,
        chunk_index: i32,
    },
    Image {
        storage_path: String,
        width: u32,
        height: u32,
    },
    Video {
        storage_path: String,
        duration_seconds: f64,
        width: u32,
        height: u32,
        transcription: Option<String>,
    },
    Keyframe {
        parent_video_id: Uuid,
        timestamp_seconds: f64,
        storage_path: String,
    },
}

impl ContentItem {
    pub fn kind_label(&self) -> &'static str {
        match self.fields {
            ContentFields::Chunk { .. } => "text",
            ContentFields::Image { .. } => "image",
            ContentFields::Video { .. } => "video",
            ContentFields::Keyframe { .. } => "keyframe",
        }
    }
}

/// `(embedding id, vector, payload)` as stored in the Vector Index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub embedding_id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// A conjunctive filter over Vector Index payload fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorFilter {
    pub equals: Vec<(String, serde_json::Value)>,
    pub one_of: Vec<(String, Vec<serde_json::Value>)>,
    pub range: Vec<(String, Option<f64>, Option<f64>)>,
}

impl VectorFilter {
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty() && self.one_of.is_empty() && self.range.is_empty()
    }
}

/// A raw hit returned from the Vector Index, tagged with its modality.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub embedding_id: String,
    pub score: f32,
    pub modality: Modality,
    pub payload: HashMap<String, serde_json::Value>,
}

/// High-level request filters, applied either by pushing into
/// C3 or post-hoc during enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub file_types: Option<Vec<String>>,
    pub content_types: Option<Vec<String>>,
    pub min_score: Option<f32>,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub gte: Option<DateTime<Utc>>,
    pub lte: Option<DateTime<Utc>>,
}

/// The join of a Vector Record with its owning Content Item and Document,
/// plus derived artifact URL and citation — never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedHit {
    pub embedding_id: String,
    pub score: f32,
    pub modality: Modality,
    pub document_id: Uuid,
    pub item_id: Uuid,
    pub filename: String,
    pub file_type: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub fields: ContentFields,
    pub caption: Option<String>,
    pub artifacts: Artifacts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifacts {
    pub view_url: String,
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub r#type: String,
    pub document_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl EnrichedHit {
    pub fn citation(&self) -> Citation {
        Citation {
            source: self.filename.clone(),
            r#type: self.file_type.clone(),
            document_id: self.document_id,
            created_at: self.created_at,
        }
    }

    /// Deterministic tie-break tuple for ranking.
    pub fn rank_key(&self) -> (std::cmp::Reverse<ordered_float::NotNan>, u8, Uuid, Uuid) {
        let score = ordered_float::NotNan::new(self.score).unwrap_or_else(|_| ordered_float::NotNan::new(0.0).unwrap());
        (
            std::cmp::Reverse(score),
            self.modality.priority(),
            self.document_id,
            self.item_id,
        )
    }
}

/// One rendered section of the Context Bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    pub r#type: String,
    pub title: String,
    pub content: String,
    pub count: usize,
}

/// The citation-bearing markdown artifact returned alongside raw results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub query: String,
    pub sections: Vec<ContextSection>,
    pub unified_context: String,
    pub total_results: usize,
    pub context_length: usize,
    pub citations: Vec<Citation>,
}

/// The durable, replayable record of a single `/search` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSession {
    pub id: Uuid,
    pub query: String,
    pub modalities: Vec<Modality>,
    pub filters: SearchFilters,
    pub results: Vec<SessionResult>,
    pub bundle: ContextBundle,
    pub created_at: DateTime<Utc>,
}

/// A weak reference from a session to a vector record: id + score
/// only, no content copy. Dangling references are tolerated at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub embedding_id: String,
    pub score: f32,
    pub modality: Modality,
}

/// Response metadata flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_degraded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_modalities: Option<bool>,
}

/// Full result of a `search`/`search_similar` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub session_id: Option<Uuid>,
    pub query: String,
    pub modalities: Vec<Modality>,
    pub results_count: usize,
    pub results: Vec<EnrichedHit>,
    pub context_bundle: ContextBundle,
    pub search_timestamp: DateTime<Utc>,
    pub filters_applied: SearchFilters,
    pub score_threshold: f32,
    pub flags: ResponseFlags,
    pub session_error: Option<String>,
}

/// The list of embedding ids (per modality) that must be deleted from the
/// Vector Index after a Document's metadata has been removed.
#[derive(Debug, Clone, Default)]
pub struct DeletionPlan {
    pub by_modality: HashMap<Modality, Vec<String>>,
}

pub mod ordered_float {
    //! Minimal NotNan newtype so `f32` scores can be used as a sort key
    //! without pulling in the `ordered-float` crate for one comparison.
    use std::cmp::Ordering;

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct NotNan(f32);

    impl NotNan {
        pub fn new(v: f32) -> Result<Self, ()> {
            if v.is_nan() {
                Err(())
            } else {
                Ok(Self(v))
            }
        }

        pub fn into_inner(self) -> f32 {
            self.0
        }
    }

    impl Eq for NotNan {}

    impl PartialOrd for NotNan {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for NotNan {
        fn cmp(&self, other: &Self) -> Ordering {
            self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
        }
    }
}
