//! Domain event logging for retrieval services.
//!
//! Provides structured logging for search/embedding/session events with a
//! consistent schema.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Result of a domain operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Success,
    Failure,
    Partial,
    Skipped,
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Partial => write!(f, "partial"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Categories of domain events for filtering and routing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Search,
    Embedding,
    VectorIndex,
    Session,
    Api,
    System,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Search => write!(f, "search"),
            Self::Embedding => write!(f, "embedding"),
            Self::VectorIndex => write!(f, "vector_index"),
            Self::Session => write!(f, "session"),
            Self::Api => write!(f, "api"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A structured domain event for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
    /// Category of the event
    pub category: EventCategory,
    /// Specific event type (e.g., "job_started", "document_chunked")
    pub event_type: String,
    /// Entity type being operated on (e.g., "sync_job", "document", "robot")
    pub entity_type: Option<String>,
    /// Entity ID
    pub entity_id: Option<String>,
    /// Result of the operation
    pub result: OperationResult,
    /// Duration in milliseconds (if applicable)
    pub duration_ms: Option<u64>,
    /// Attempt number for retries
    pub attempt: Option<u32>,
    /// Error message if failed
    pub error: Option<String>,
    /// Trace context
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    /// Tenant and user context
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// Service that emitted the event
    pub service: String,
    /// Additional structured metadata
    pub metadata: Option<serde_json::Value>,
}

impl DomainEvent {
    /// Create a new domain event builder
    pub fn new(service: impl Into<String>, category: EventCategory, event_type: impl Into<String>) -> DomainEventBuilder {
        DomainEventBuilder {
            service: service.into(),
            category,
            event_type: event_type.into(),
            entity_type: None,
            entity_id: None,
            result: OperationResult::Success,
            duration_ms: None,
            attempt: None,
            error: None,
            trace_id: None,
            span_id: None,
            tenant_id: None,
            user_id: None,
            metadata: None,
        }
    }
}

/// Builder for constructing domain events
pub struct DomainEventBuilder {
    service: String,
    category: EventCategory,
    event_type: String,
    entity_type: Option<String>,
    entity_id: Option<String>,
    result: OperationResult,
    duration_ms: Option<u64>,
    attempt: Option<u32>,
    error: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    tenant_id: Option<Uuid>,
    user_id: Option<Uuid>,
    metadata: Option<serde_json::Value>,
}

impl DomainEventBuilder {
    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn result(mut self, result: OperationResult) -> Self {
        self.result = result;
        self
    }

    pub fn success(mut self) -> Self {
        self.result = OperationResult::Success;
        self
    }

    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.result = OperationResult::Failure;
        self.error = Some(error.into());
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn trace(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
        self
    }

    pub fn tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Build and emit the event as a log
    pub fn emit(self) {
        let event = self.build();
        let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        
        match event.result {
            OperationResult::Success => tracing::info!(
                target: "domain_event",
                category = %event.category,
                event_type = %event.event_type,
                result = "success",
                "DomainEvent: {}", json
            ),
            OperationResult::Failure => tracing::error!(
                target: "domain_event",
                category = %event.category,
                event_type = %event.event_type,
                result = "failure",
                error = ?event.error,
                "DomainEvent: {}", json
            ),
            OperationResult::Partial => tracing::warn!(
                target: "domain_event",
                category = %event.category,
                event_type = %event.event_type,
                result = "partial",
                "DomainEvent: {}", json
            ),
            OperationResult::Skipped => tracing::debug!(
                target: "domain_event",
                category = %event.category,
                event_type = %event.event_type,
                result = "skipped",
                "DomainEvent: {}", json
            ),
        }
    }

    /// Build the event without emitting
    pub fn build(self) -> DomainEvent {
        DomainEvent {
            timestamp: Utc::now(),
            category: self.category,
            event_type: self.event_type,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            result: self.result,
            duration_ms: self.duration_ms,
            attempt: self.attempt,
            error: self.error,
            trace_id: self.trace_id,
            span_id: self.span_id,
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            service: self.service,
            metadata: self.metadata,
        }
    }
}

// ============================================================================
// Convenience functions for common domain events
// ============================================================================

/// Log embedding generation for a query (or lack thereof, on degradation).
pub fn log_embedding_generated(service: &str, degraded: bool, duration_ms: u64) {
    let mut builder = DomainEvent::new(service, EventCategory::Embedding, "query_embedded")
        .duration_ms(duration_ms)
        .metadata(serde_json::json!({ "degraded": degraded }));

    builder = if degraded {
        builder.result(OperationResult::Partial)
    } else {
        builder.success()
    };

    builder.emit();
}

/// Log a per-modality vector search call.
pub fn log_vector_search(service: &str, modality: &str, hits: usize, duration_ms: u64, error: Option<&str>) {
    let mut builder = DomainEvent::new(service, EventCategory::VectorIndex, "modality_search")
        .entity("collection", modality)
        .duration_ms(duration_ms)
        .metadata(serde_json::json!({ "hits": hits }));

    builder = match error {
        None => builder.success(),
        Some(err) => builder.failure(err),
    };

    builder.emit();
}

/// Log the outcome of a full `/search` request.
pub fn log_search_executed(
    service: &str,
    modalities: &[String],
    results_count: usize,
    duration_ms: u64,
    partial_modalities: bool,
) {
    let mut builder = DomainEvent::new(service, EventCategory::Search, "query_executed")
        .duration_ms(duration_ms)
        .metadata(serde_json::json!({
            "modalities": modalities,
            "results_count": results_count,
            "partial_modalities": partial_modalities,
        }));

    builder = if partial_modalities {
        builder.result(OperationResult::Partial)
    } else {
        builder.success()
    };

    builder.emit();
}

/// Log the outcome of a best-effort search-session write.
pub fn log_session_persisted(service: &str, session_id: Option<Uuid>, error: Option<&str>) {
    let mut builder = DomainEvent::new(service, EventCategory::Session, "session_persisted");

    builder = match (session_id, error) {
        (Some(id), _) => builder.entity("search_session", id.to_string()).success(),
        (None, Some(err)) => builder.failure(err),
        (None, None) => builder.result(OperationResult::Skipped),
    };

    builder.emit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_event_builder() {
        let event = DomainEvent::new("test-service", EventCategory::Search, "query_executed")
            .duration_ms(100)
            .success()
            .build();

        assert_eq!(event.service, "test-service");
        assert_eq!(event.event_type, "query_executed");
        assert_eq!(event.result, OperationResult::Success);
    }
}
