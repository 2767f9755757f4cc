use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::IngestConfig;
use crate::error::QuizError;
use crate::knowledge::batch::BatchScheduler;
use crate::knowledge::chunker::{char_prefix, TextChunker};
use crate::knowledge::store::KnowledgeIndex;
use crate::knowledge::summarizer::ChunkSummarizer;
use crate::knowledge::types::{ChunkDigest, IngestResult};
use crate::llm::CompletionProvider;

/// Characters of each summary kept in ingestion digests
const DIGEST_SUMMARY_CHARS: usize = 100;
/// Chunks reported in ingestion digests
const DIGEST_LIMIT: usize = 10;

/// Turns documents into summarized, indexed chunks
pub struct KnowledgeManager {
    config: IngestConfig,
    index: Arc<dyn KnowledgeIndex>,
    completion: Arc<dyn CompletionProvider>,
    chunker: TextChunker,
}

impl KnowledgeManager {
    pub fn new(
        config: &IngestConfig,
        index: Arc<dyn KnowledgeIndex>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            config: config.clone(),
            index,
            completion,
            chunker: TextChunker::new(config.chunk_size),
        }
    }

    /// Chunk, summarize and index `text` under `book_id`.
    /// A book that already has chunks in the index is left untouched.
    pub async fn ingest(&self, book_id: &str, text: &str) -> Result<IngestResult> {
        if book_id.trim().is_empty() {
            return Err(QuizError::InvalidRequest("book id must not be empty".to_string()).into());
        }

        // Advisory only: two concurrent ingestions of one book can both pass
        let existing = self.index.count_existing(book_id).await?;
        if existing > 0 {
            info!(book_id, chunks = existing, "Book already indexed, skipping ingestion");
            return Ok(IngestResult {
                book_id: book_id.to_string(),
                chunk_count: existing,
                was_cached: true,
                degraded_chunks: 0,
                digests: Vec::new(),
            });
        }

        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            return Err(
                QuizError::InvalidRequest("document contains no text to index".to_string()).into(),
            );
        }
        info!(
            book_id,
            chunks = chunks.len(),
            batch_width = self.config.batch_width,
            "Summarizing document chunks"
        );

        let summarizer = ChunkSummarizer::new(self.completion.clone(), book_id, &self.config);
        let indexed = BatchScheduler::new(self.config.batch_width)
            .run(&chunks, &summarizer)
            .await;

        let degraded_chunks = indexed.iter().filter(|c| c.degraded).count();
        let written = self.index.ingest(book_id, &indexed).await?;

        info!(
            book_id,
            written,
            degraded = degraded_chunks,
            "Indexed document"
        );

        let digests = indexed
            .iter()
            .take(DIGEST_LIMIT)
            .map(|c| ChunkDigest {
                position: c.chunk.position,
                summary: char_prefix(&c.summary, DIGEST_SUMMARY_CHARS).to_string(),
                key_concepts: c.key_concepts.clone(),
            })
            .collect();

        Ok(IngestResult {
            book_id: book_id.to_string(),
            chunk_count: written,
            was_cached: false,
            degraded_chunks,
            digests,
        })
    }
}
