//! Context Assembler: deterministic, language-neutral
//! assembly of enriched hits into a markdown-with-citations bundle. Pure
//! and synchronous — no I/O, trivially unit-testable for byte-exact
//! determinism.

use crate::domain::{ContentFields, ContextBundle, ContextSection, EnrichedHit};

const TRANSCRIPTION_EXCERPT_LIMIT: usize = 500;

/// Fixed section order: text, image, video, keyframe.
fn section_order() -> [&'static str; 4] {
    ["text", "image", "video", "keyframe"]
}

fn section_title(kind: &str) -> &'static str {
    match kind {
        "text" => "Text Results",
        "image" => "Image Results",
        "video" => "Video Results",
        "keyframe" => "Video Keyframes",
        _ => unreachable!("section_order is exhaustive"),
    }
}

fn truncate_excerpt(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(limit).collect();
        format!("{truncated}...")
    }
}

fn render_text_entry(index: usize, hit: &EnrichedHit) -> String {
    let ContentFields::Chunk { text, .. } = &hit.fields else {
        unreachable!("text section only contains Chunk hits")
    };
    format!("[{index}] {text}\n    Source: {}", hit.filename)
}

fn render_image_entry(index: usize, hit: &EnrichedHit) -> String {
    let ContentFields::Image { width, height, .. } = &hit.fields else {
        unreachable!("image section only contains Image hits")
    };
    let caption = hit.caption.as_deref().unwrap_or("(no caption)");
    format!(
        "[IMG-{index}] {caption}\n    Source: {}\n    Size: {width}x{height}\n    View: {}",
        hit.filename, hit.artifacts.view_url
    )
}

fn render_video_entry(index: usize, hit: &EnrichedHit) -> String {
    let ContentFields::Video {
        duration_seconds,
        transcription,
        ..
    } = &hit.fields
    else {
        unreachable!("video section only contains Video hits")
    };
    let excerpt = transcription
        .as_deref()
        .map(|t| truncate_excerpt(t, TRANSCRIPTION_EXCERPT_LIMIT))
        .unwrap_or_else(|| "(no transcription)".to_string());
    format!(
        "[VID-{index}] {excerpt}\n    Source: {}\n    Duration: {:.1} seconds\n    Watch: {}",
        hit.filename, duration_seconds, hit.artifacts.view_url
    )
}

fn render_keyframe_entry(index: usize, hit: &EnrichedHit) -> String {
    let ContentFields::Keyframe { timestamp_seconds, .. } = &hit.fields else {
        unreachable!("keyframe section only contains Keyframe hits")
    };
    let caption = hit.caption.as_deref().unwrap_or("(no caption)");
    format!(
        "[KF-{index}] {caption}\n    Source: {}\n    Video Keyframe ({:.1}s)\n    View: {}",
        hit.filename, timestamp_seconds, hit.artifacts.view_url
    )
}

fn kind_of(hit: &EnrichedHit) -> &'static str {
    match hit.fields {
        ContentFields::Chunk { .. } => "text",
        ContentFields::Image { .. } => "image",
        ContentFields::Video { .. } => "video",
        ContentFields::Keyframe { .. } => "keyframe",
    }
}

/// Partitions `hits` by content type (fixed order) and renders the
/// Context Bundle. `hits` is assumed to already be in final rank order;
/// the assembler only groups, it never re-sorts.
pub fn assemble(query: &str, hits: &[EnrichedHit]) -> ContextBundle {
    let mut sections = Vec::new();
    let mut citations = Vec::new();
    let mut body_parts = Vec::new();

    for kind in section_order() {
        let in_section: Vec<&EnrichedHit> = hits.iter().filter(|h| kind_of(h) == kind).collect();
        if in_section.is_empty() {
            continue;
        }

        let entries: Vec<String> = in_section
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                let n = i + 1;
                match kind {
                    "text" => render_text_entry(n, hit),
                    "image" => render_image_entry(n, hit),
                    "video" => render_video_entry(n, hit),
                    "keyframe" => render_keyframe_entry(n, hit),
                    _ => unreachable!(),
                }
            })
            .collect();

        let content = entries.join("\n\n");
        body_parts.push(format!("## {}\n\n{}", section_title(kind), content));

        sections.push(ContextSection {
            r#type: kind.to_string(),
            title: section_title(kind).to_string(),
            content,
            count: in_section.len(),
        });

        for hit in in_section {
            citations.push(hit.citation());
        }
    }

    let content_type_count = sections.len();
    let header = format!("# Search Results for: {query}");
    let summary = format!(
        "Found {} relevant items across {} content types",
        hits.len(),
        content_type_count
    );

    let mut unified_parts = vec![header, summary];
    unified_parts.extend(body_parts);
    let unified_context = unified_parts.join("\n\n");

    ContextBundle {
        query: query.to_string(),
        sections,
        context_length: unified_context.chars().count(),
        unified_context,
        total_results: hits.len(),
        citations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Artifacts, Modality};
    use chrono::Utc;
    use uuid::Uuid;

    fn text_hit(filename: &str, text: &str) -> EnrichedHit {
        EnrichedHit {
            embedding_id: format!("e-{filename}"),
            score: 0.9,
            modality: Modality::Text,
            document_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            filename: filename.to_string(),
            file_type: "text".to_string(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            fields: ContentFields::Chunk {
                text: text.to_string(),
                chunk_index: 0,
            },
            caption: None,
            artifacts: Artifacts {
                view_url: "http://example.com/x".into(),
                download_url: None,
            },
        }
    }

    #[test]
    fn single_text_hit_renders_citation_marker() {
        let bundle = assemble("hello", &[text_hit("a.txt", "world")]);
        assert!(bundle.unified_context.contains("[1] world"));
        assert!(bundle.unified_context.contains("Source: a.txt"));
        assert_eq!(bundle.total_results, 1);
        assert_eq!(bundle.citations.len(), 1);
    }

    #[test]
    fn assembly_is_deterministic() {
        let hits = vec![text_hit("a.txt", "world"), text_hit("b.txt", "other")];
        let first = assemble("q", &hits);
        let second = assemble("q", &hits);
        assert_eq!(first.unified_context, second.unified_context);
    }

    #[test]
    fn empty_hits_render_only_header_and_summary() {
        let bundle = assemble("nothing here", &[]);
        assert_eq!(bundle.total_results, 0);
        assert_eq!(bundle.sections.len(), 0);
        assert!(bundle.unified_context.starts_with("# Search Results for: nothing here"));
        assert!(bundle.unified_context.contains("Found 0 relevant items across 0 content types"));
    }
}
