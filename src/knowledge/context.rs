use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::knowledge::chunker::char_prefix;
use crate::knowledge::store::KnowledgeIndex;
use crate::knowledge::types::RetrievedChunk;

/// Retrieved chunks rendered into a prompt block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Labelled chunk block, cut to the character budget
    pub text: String,
    /// Chunks that went into the block, in block order
    pub chunks: Vec<RetrievedChunk>,
    /// No hit belonged to the requested book; unfiltered hits were used
    pub used_fallback: bool,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Builds bounded prompt context from similarity search
pub struct ContextAssembler {
    index: Arc<dyn KnowledgeIndex>,
}

impl ContextAssembler {
    pub fn new(index: Arc<dyn KnowledgeIndex>) -> Self {
        Self { index }
    }

    /// Query `width` candidates, prefer those of `book_id`, order them by
    /// position and render at most `budget` characters.
    pub async fn assemble(
        &self,
        query: &str,
        book_id: Option<&str>,
        width: usize,
        budget: usize,
    ) -> Result<AssembledContext> {
        let hits = self.index.query(query, width, None).await?;
        if hits.is_empty() {
            debug!(query, "No chunks retrieved, context is empty");
            return Ok(AssembledContext::default());
        }

        let mut used_fallback = false;
        let mut selected: Vec<RetrievedChunk> = match book_id {
            Some(book_id) => {
                let owned: Vec<RetrievedChunk> = hits
                    .iter()
                    .filter(|hit| hit.metadata.book_id == book_id)
                    .cloned()
                    .map(RetrievedChunk::from)
                    .collect();
                if owned.is_empty() {
                    warn!(
                        book_id,
                        candidates = hits.len(),
                        "No retrieved chunk belongs to the book, falling back to unfiltered results"
                    );
                    used_fallback = true;
                    hits.into_iter().map(RetrievedChunk::from).collect()
                } else {
                    owned
                }
            }
            None => hits.into_iter().map(RetrievedChunk::from).collect(),
        };

        selected.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.book_id.cmp(&b.book_id))
        });

        let text = render(&selected, budget);
        debug!(
            chunks = selected.len(),
            chars = text.chars().count(),
            used_fallback,
            "Assembled context"
        );

        Ok(AssembledContext {
            text,
            chunks: selected,
            used_fallback,
        })
    }
}

fn render(chunks: &[RetrievedChunk], budget: usize) -> String {
    let block = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "--- CHUNK {} (book={}, position={}, relevance={:.3}) ---\n{}",
                i + 1,
                chunk.book_id,
                chunk.position,
                chunk.relevance_score,
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    char_prefix(&block, budget).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hit, MemoryIndex};

    #[tokio::test]
    async fn test_sorted_by_position_and_labelled() {
        let index = Arc::new(MemoryIndex::with_hits(vec![
            hit("b1", 7, "seventh", 0.1),
            hit("b1", 2, "second", 0.4),
            hit("b1", 5, "fifth", 1.3),
        ]));
        let ctx = ContextAssembler::new(index)
            .assemble("topic", Some("b1"), 6, 16000)
            .await
            .unwrap();

        let positions: Vec<usize> = ctx.chunks.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![2, 5, 7]);
        assert!(!ctx.used_fallback);
        assert!(ctx
            .text
            .starts_with("--- CHUNK 1 (book=b1, position=2, relevance=0.600) ---\nsecond"));
        // Distance above 1 clamps to zero relevance
        assert_eq!(ctx.chunks[1].relevance_score, 0.0);
        assert!(ctx.text.contains("\n\n--- CHUNK 3 (book=b1, position=7"));
    }

    #[tokio::test]
    async fn test_filters_to_owning_book() {
        let index = Arc::new(MemoryIndex::with_hits(vec![
            hit("other", 0, "foreign", 0.0),
            hit("mine", 3, "own", 0.2),
        ]));
        let ctx = ContextAssembler::new(index.clone())
            .assemble("topic", Some("mine"), 6, 16000)
            .await
            .unwrap();

        assert_eq!(ctx.chunks.len(), 1);
        assert_eq!(ctx.chunks[0].book_id, "mine");
        assert!(!ctx.text.contains("foreign"));
        // The index is queried unfiltered
        assert_eq!(index.last_query(), Some(("topic".to_string(), 6, None)));
    }

    #[tokio::test]
    async fn test_falls_back_when_book_has_no_hits() {
        let index = Arc::new(MemoryIndex::with_hits(vec![
            hit("x", 4, "four", 0.2),
            hit("y", 1, "one", 0.3),
        ]));
        let ctx = ContextAssembler::new(index)
            .assemble("topic", Some("missing"), 6, 16000)
            .await
            .unwrap();

        assert!(ctx.used_fallback);
        assert_eq!(ctx.chunks.len(), 2);
        assert_eq!(ctx.chunks[0].position, 1);
    }

    #[tokio::test]
    async fn test_budget_truncation() {
        let index = Arc::new(MemoryIndex::with_hits(vec![hit("b", 0, &"é".repeat(500), 0.0)]));
        let ctx = ContextAssembler::new(index)
            .assemble("topic", None, 6, 100)
            .await
            .unwrap();
        assert_eq!(ctx.text.chars().count(), 100);
    }

    #[tokio::test]
    async fn test_empty_index_gives_empty_context() {
        let ctx = ContextAssembler::new(Arc::new(MemoryIndex::new()))
            .assemble("anything", Some("b"), 6, 16000)
            .await
            .unwrap();
        assert!(ctx.is_empty());
        assert_eq!(ctx.text, "");
        assert!(!ctx.used_fallback);
    }
}
