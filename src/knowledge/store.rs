use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, StringArray,
    TimestampMillisecondArray,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::{
    connect,
    index::Index,
    query::{ExecutableQuery, QueryBase},
    Connection, DistanceType,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::knowledge::types::{BookEntry, ChunkMetadata, IndexHit, IndexStats, IndexedChunk};
use crate::vector_optimizer::VectorOptimizer;

const TABLE_NAME: &str = "book_chunks";

/// Vector index capability: add chunks, query by text, check existence
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// Write chunks for a book; returns how many were written
    async fn ingest(&self, book_id: &str, chunks: &[IndexedChunk]) -> Result<usize>;

    /// Most similar chunks first
    async fn query(
        &self,
        query_text: &str,
        limit: usize,
        book_filter: Option<&str>,
    ) -> Result<Vec<IndexHit>>;

    async fn count_existing(&self, book_id: &str) -> Result<usize>;
}

/// LanceDB-backed chunk index with embeddings from the configured provider
pub struct KnowledgeStore {
    db: Connection,
    embedding_provider: Box<dyn EmbeddingProvider>,
    embedding_batch_size: usize,
    vector_dim: usize,
}

impl KnowledgeStore {
    fn quote_filter_string(input: &str) -> String {
        input.replace('\'', "''")
    }

    fn book_filter(book_id: &str) -> String {
        format!("book_id = '{}'", Self::quote_filter_string(book_id))
    }

    pub async fn new(
        db_path: &Path,
        embedding_provider: Box<dyn EmbeddingProvider>,
        embedding_batch_size: usize,
    ) -> Result<Self> {
        std::fs::create_dir_all(db_path)?;
        let db_uri = db_path
            .to_str()
            .context("Index path is not valid UTF-8")?;
        let db = connect(db_uri).execute().await?;

        // Get vector dimension by embedding a probe text
        let probe = embedding_provider.generate_embedding("test").await?;
        let vector_dim = probe.len();

        let store = Self {
            db,
            embedding_provider,
            embedding_batch_size,
            vector_dim,
        };
        store.initialize_table().await?;

        Ok(store)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("book_id", DataType::Utf8, false),
            Field::new("position", DataType::Int32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("summary", DataType::Utf8, false),
            Field::new("key_concepts", DataType::Utf8, false),
            Field::new("keywords", DataType::Utf8, false),
            Field::new(
                "indexed_at",
                DataType::Timestamp(TimeUnit::Millisecond, None),
                false,
            ),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.vector_dim as i32,
                ),
                false,
            ),
        ]))
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self.db.table_names().execute().await?;

        if !table_names.contains(&TABLE_NAME.to_string()) {
            self.db
                .create_empty_table(TABLE_NAME, self.schema())
                .execute()
                .await?;
        }

        Ok(())
    }

    /// Create the IVF-PQ index once the table is large enough
    async fn ensure_optimal_index(&self) -> Result<()> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        let has_index = table
            .list_indices()
            .await?
            .iter()
            .any(|idx| idx.columns == vec!["embedding"]);
        if has_index {
            return Ok(());
        }

        let row_count = table.count_rows(None).await?;
        let params = VectorOptimizer::calculate_index_params(row_count, self.vector_dim);
        if !params.should_create_index {
            debug!(row_count, "Skipping vector index creation, brute force is faster");
            return Ok(());
        }

        info!(
            row_count,
            partitions = params.num_partitions,
            sub_vectors = params.num_sub_vectors,
            "Creating vector index for chunk table"
        );
        table
            .create_index(
                &["embedding"],
                Index::IvfPq(
                    lancedb::index::vector::IvfPqIndexBuilder::default()
                        .distance_type(params.distance_type)
                        .num_partitions(params.num_partitions)
                        .num_sub_vectors(params.num_sub_vectors)
                        .num_bits(params.num_bits),
                ),
            )
            .execute()
            .await?;

        Ok(())
    }

    pub async fn delete_book(&self, book_id: &str) -> Result<()> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        table.delete(&Self::book_filter(book_id)).await?;
        Ok(())
    }

    pub async fn get_stats(&self) -> Result<IndexStats> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        let count = table.count_rows(None).await?;

        if count == 0 {
            return Ok(IndexStats {
                total_books: 0,
                total_chunks: 0,
                oldest_indexed: None,
                newest_indexed: None,
            });
        }

        let results = table.query().execute().await?;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut books = HashSet::new();
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;

        for batch in batches {
            let book_ids = string_column(&batch, "book_id")?;
            let indexed_ats = timestamp_column(&batch, "indexed_at")?;

            for i in 0..batch.num_rows() {
                books.insert(book_ids.value(i).to_string());

                if let Some(indexed) = DateTime::from_timestamp_millis(indexed_ats.value(i)) {
                    if oldest.is_none_or(|old| indexed < old) {
                        oldest = Some(indexed);
                    }
                    if newest.is_none_or(|new| indexed > new) {
                        newest = Some(indexed);
                    }
                }
            }
        }

        Ok(IndexStats {
            total_books: books.len(),
            total_chunks: count,
            oldest_indexed: oldest,
            newest_indexed: newest,
        })
    }

    pub async fn list_books(&self, limit: Option<usize>) -> Result<Vec<BookEntry>> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        let results = table.query().execute().await?;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut books: HashMap<String, (usize, DateTime<Utc>)> = HashMap::new();

        for batch in batches {
            let book_ids = string_column(&batch, "book_id")?;
            let indexed_ats = timestamp_column(&batch, "indexed_at")?;

            for i in 0..batch.num_rows() {
                let indexed_at = DateTime::from_timestamp_millis(indexed_ats.value(i))
                    .context("Invalid timestamp")?;

                books
                    .entry(book_ids.value(i).to_string())
                    .and_modify(|(count, last)| {
                        *count += 1;
                        if indexed_at > *last {
                            *last = indexed_at;
                        }
                    })
                    .or_insert((1, indexed_at));
            }
        }

        let mut result: Vec<BookEntry> = books
            .into_iter()
            .map(|(book_id, (chunks, last_indexed))| BookEntry {
                book_id,
                chunks,
                last_indexed,
            })
            .collect();

        // Most recently indexed first
        result.sort_by(|a, b| b.last_indexed.cmp(&a.last_indexed));

        if let Some(limit) = limit {
            result.truncate(limit);
        }

        Ok(result)
    }
}

#[async_trait]
impl KnowledgeIndex for KnowledgeStore {
    async fn ingest(&self, book_id: &str, chunks: &[IndexedChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.chunk.text.clone()).collect();
        let embeddings = crate::embedding::generate_embeddings_batched(
            texts,
            self.embedding_batch_size,
            self.embedding_provider.as_ref(),
        )
        .await?;

        let now_millis = Utc::now().timestamp_millis();

        let ids: Vec<String> = chunks.iter().map(|c| c.record_id()).collect();
        let book_ids: Vec<&str> = chunks.iter().map(|_| book_id).collect();
        let positions: Vec<i32> = chunks.iter().map(|c| c.chunk.position as i32).collect();
        let contents: Vec<&str> = chunks.iter().map(|c| c.chunk.text.as_str()).collect();
        let summaries: Vec<&str> = chunks.iter().map(|c| c.summary.as_str()).collect();
        let key_concepts: Vec<&str> = chunks.iter().map(|c| c.key_concepts.as_str()).collect();
        let keywords: Vec<&str> = chunks.iter().map(|c| c.keywords.as_str()).collect();
        let indexed_ats: Vec<i64> = chunks.iter().map(|_| now_millis).collect();

        let embedding_values: Vec<f32> =
            embeddings.iter().flat_map(|e| e.iter().copied()).collect();
        let embedding_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.vector_dim as i32,
            Arc::new(Float32Array::from(embedding_values)),
            None,
        )?;

        let batch = RecordBatch::try_new(
            self.schema(),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(book_ids)),
                Arc::new(Int32Array::from(positions)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(summaries)),
                Arc::new(StringArray::from(key_concepts)),
                Arc::new(StringArray::from(keywords)),
                Arc::new(TimestampMillisecondArray::from(indexed_ats)),
                Arc::new(embedding_array),
            ],
        )?;

        let table = self.db.open_table(TABLE_NAME).execute().await?;

        use arrow::record_batch::RecordBatchIterator;
        use std::iter::once;
        let schema = batch.schema();
        let batch_reader = RecordBatchIterator::new(once(Ok(batch)), schema);
        table.add(batch_reader).execute().await?;

        info!(book_id, chunks = chunks.len(), "Stored chunks in index");

        self.ensure_optimal_index().await?;

        Ok(chunks.len())
    }

    async fn query(
        &self,
        query_text: &str,
        limit: usize,
        book_filter: Option<&str>,
    ) -> Result<Vec<IndexHit>> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        let query_embedding = self
            .embedding_provider
            .generate_embedding(query_text)
            .await?;

        let mut query = table
            .vector_search(query_embedding.as_slice())?
            .distance_type(DistanceType::Cosine)
            .limit(limit);

        if let Some(book_id) = book_filter {
            query = query.only_if(Self::book_filter(book_id));
        }

        let mut results = query.execute().await?;
        let mut hits = Vec::new();

        while let Some(batch) = results.try_next().await? {
            if batch.num_rows() == 0 {
                continue;
            }

            let book_ids = string_column(&batch, "book_id")?;
            let positions = batch
                .column_by_name("position")
                .and_then(|col| col.as_any().downcast_ref::<Int32Array>())
                .context("Missing position column")?;
            let contents = string_column(&batch, "content")?;
            let summaries = string_column(&batch, "summary")?;
            let key_concepts = string_column(&batch, "key_concepts")?;
            let keywords = string_column(&batch, "keywords")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
                .context("Missing _distance column")?;

            for i in 0..batch.num_rows() {
                hits.push(IndexHit {
                    text: contents.value(i).to_string(),
                    metadata: ChunkMetadata {
                        book_id: book_ids.value(i).to_string(),
                        position: positions.value(i).max(0) as usize,
                        summary: summaries.value(i).to_string(),
                        key_concepts: key_concepts.value(i).to_string(),
                        keywords: keywords.value(i).to_string(),
                    },
                    distance: distances.value(i),
                });
            }
        }

        Ok(hits)
    }

    async fn count_existing(&self, book_id: &str) -> Result<usize> {
        let table = self.db.open_table(TABLE_NAME).execute().await?;
        let count = table.count_rows(Some(Self::book_filter(book_id))).await?;
        Ok(count)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .with_context(|| format!("Missing {} column", name))
}

fn timestamp_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a TimestampMillisecondArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<TimestampMillisecondArray>())
        .with_context(|| format!("Missing {} column", name))
}
