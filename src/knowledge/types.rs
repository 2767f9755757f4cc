use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A paragraph-aligned slice of a source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub position: usize,
    pub text: String,
}

/// Metadata stored next to every chunk in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub book_id: String,
    pub position: usize,
    pub summary: String,
    pub key_concepts: String,
    pub keywords: String,
}

/// A chunk enriched with its summary, ready to be written to the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub book_id: String,
    pub summary: String,
    pub key_concepts: String,
    pub keywords: String,
    /// Summary was synthesized locally because extraction failed
    #[serde(default, skip_serializing)]
    pub degraded: bool,
}

impl IndexedChunk {
    /// Record id in the index, unique per book and position
    pub fn record_id(&self) -> String {
        format!("{}-{}", self.book_id, self.chunk.position)
    }
}

/// Raw similarity query hit, as returned by the index
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Lower = more similar
    pub distance: f32,
}

/// Search result with relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub book_id: String,
    pub position: usize,
    pub summary: String,
    /// 0..1, higher = more similar
    pub relevance_score: f32,
}

impl From<IndexHit> for RetrievedChunk {
    fn from(hit: IndexHit) -> Self {
        Self {
            text: hit.text,
            book_id: hit.metadata.book_id,
            position: hit.metadata.position,
            summary: hit.metadata.summary,
            relevance_score: (1.0 - hit.distance).clamp(0.0, 1.0),
        }
    }
}

/// Statistics about the knowledge index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_books: usize,
    pub total_chunks: usize,
    pub oldest_indexed: Option<DateTime<Utc>>,
    pub newest_indexed: Option<DateTime<Utc>>,
}

/// One indexed book as listed by the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookEntry {
    pub book_id: String,
    pub chunks: usize,
    pub last_indexed: DateTime<Utc>,
}

/// Short view of an ingested chunk for reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDigest {
    pub position: usize,
    pub summary: String,
    pub key_concepts: String,
}

/// Result of an ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub book_id: String,
    /// Chunks in the index for this book after the run
    pub chunk_count: usize,
    /// True when the book was already indexed and nothing was written
    pub was_cached: bool,
    /// Chunks whose summary fell back to the local text prefix
    pub degraded_chunks: usize,
    pub digests: Vec<ChunkDigest>,
}
