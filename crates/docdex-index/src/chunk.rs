//! Line-window chunking applied at index time.
//!
//! Large documents are cut into fixed-size sliding windows with overlap so
//! that a hit resolves to a `(document, line_range)` pair instead of a
//! whole file.

use docdex_core::config::ChunkingConfig;
use docdex_core::types::{ChunkRecord, Document, LineRange};

pub fn chunk_document(doc: &Document, config: &ChunkingConfig) -> Vec<ChunkRecord> {
    let lines: Vec<&str> = doc.content.lines().collect();
    let window = config.window_lines.max(1);
    let overlap = ((window as f32) * config.overlap_percent) as usize;
    // Overlap must leave the window moving forward.
    let step = (window - overlap).max(1);

    let mut chunks = Vec::new();
    if lines.is_empty() {
        return chunks;
    }

    let mut start = 0;
    let mut chunk_index = 0;
    loop {
        let end = (start + window).min(lines.len());
        let content = lines[start..end].join("\n");
        if !content.trim().is_empty() {
            chunks.push(ChunkRecord {
                chunk_id: format!("{}:{}", doc.id, chunk_index),
                document_id: doc.id.clone(),
                project_id: doc.project_id.clone(),
                path: doc.path.clone(),
                content,
                line_range: LineRange::new(start + 1, end),
                commit_version: doc.commit_version.clone(),
            });
            chunk_index += 1;
        }
        if end >= lines.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::chunk_document;
    use docdex_core::config::ChunkingConfig;
    use docdex_core::types::Document;

    fn doc_with_lines(n: usize) -> Document {
        let content: Vec<String> = (1..=n).map(|i| format!("line {i}")).collect();
        Document {
            id: "doc-1".into(),
            project_id: "proj".into(),
            path: "notes.md".into(),
            content: content.join("\n"),
            language: None,
            commit_version: "v1".into(),
        }
    }

    #[test]
    fn short_document_is_a_single_chunk() {
        let cfg = ChunkingConfig { window_lines: 40, overlap_percent: 0.2 };
        let chunks = chunk_document(&doc_with_lines(10), &cfg);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].line_range.start, 1);
        assert_eq!(chunks[0].line_range.end, 10);
    }

    #[test]
    fn windows_overlap_by_configured_fraction() {
        let cfg = ChunkingConfig { window_lines: 10, overlap_percent: 0.2 };
        let chunks = chunk_document(&doc_with_lines(26), &cfg);
        // step = 8: windows start at lines 1, 9, 17, 25
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].line_range.start, 1);
        assert_eq!(chunks[1].line_range.start, 9);
        assert_eq!(chunks[0].line_range.end, 10);
        assert!(chunks[1].line_range.start <= chunks[0].line_range.end);
        assert_eq!(chunks.last().map(|c| c.line_range.end), Some(26));
    }

    #[test]
    fn chunk_ids_are_stable_and_distinct() {
        let cfg = ChunkingConfig { window_lines: 10, overlap_percent: 0.2 };
        let chunks = chunk_document(&doc_with_lines(26), &cfg);
        let ids: std::collections::HashSet<_> =
            chunks.iter().map(|c| c.chunk_id.clone()).collect();
        assert_eq!(ids.len(), chunks.len());
        assert_eq!(chunks[0].chunk_id, "doc-1:0");
    }

    #[test]
    fn empty_document_produces_no_chunks() {
        let cfg = ChunkingConfig::default();
        let mut doc = doc_with_lines(1);
        doc.content = String::new();
        assert!(chunk_document(&doc, &cfg).is_empty());
    }
}
