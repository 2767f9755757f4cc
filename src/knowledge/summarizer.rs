use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::config::IngestConfig;
use crate::knowledge::batch::BatchWorker;
use crate::knowledge::chunker::char_prefix;
use crate::knowledge::types::{Chunk, IndexedChunk};
use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::quiz::parsing::recover_object;

/// Characters of chunk text kept as summary when extraction fails
const FALLBACK_SUMMARY_CHARS: usize = 200;

/// Extracts a summary, key concepts and keywords for each chunk of one book
pub struct ChunkSummarizer {
    completion: Arc<dyn CompletionProvider>,
    book_id: String,
    input_chars: usize,
    max_tokens: u32,
}

impl ChunkSummarizer {
    pub fn new(completion: Arc<dyn CompletionProvider>, book_id: &str, config: &IngestConfig) -> Self {
        Self {
            completion,
            book_id: book_id.to_string(),
            input_chars: config.summary_input_chars,
            max_tokens: config.summary_max_tokens,
        }
    }

    fn build_request(&self, chunk: &Chunk) -> CompletionRequest {
        let excerpt = char_prefix(&chunk.text, self.input_chars);
        CompletionRequest::deterministic(
            vec![
                ChatMessage::system("Extract key information concisely."),
                ChatMessage::user(format!(
                    "From this text, extract:\n\
                     1. A 2-sentence summary\n\
                     2. 3 key concepts (comma-separated)\n\
                     3. 5 keywords (comma-separated)\n\n\
                     TEXT: {}\n\n\
                     Respond in JSON: {{\"summary\": \"...\", \"key_concepts\": \"...\", \"keywords\": \"...\"}}",
                    excerpt
                )),
            ],
            self.max_tokens,
        )
    }

    fn from_fields(&self, chunk: &Chunk, fields: &Map<String, Value>) -> IndexedChunk {
        let summary = fields.get("summary").and_then(flatten_field);
        let degraded = summary.is_none();

        IndexedChunk {
            chunk: chunk.clone(),
            book_id: self.book_id.clone(),
            summary: summary.unwrap_or_else(|| fallback_summary(chunk)),
            key_concepts: fields
                .get("key_concepts")
                .and_then(flatten_field)
                .unwrap_or_default(),
            keywords: fields
                .get("keywords")
                .and_then(flatten_field)
                .unwrap_or_default(),
            degraded,
        }
    }

    fn fallback(&self, chunk: &Chunk) -> IndexedChunk {
        IndexedChunk {
            chunk: chunk.clone(),
            book_id: self.book_id.clone(),
            summary: fallback_summary(chunk),
            key_concepts: String::new(),
            keywords: String::new(),
            degraded: true,
        }
    }
}

#[async_trait]
impl BatchWorker for ChunkSummarizer {
    type Output = IndexedChunk;

    /// Unparseable output degrades; only a failed completion call is an error
    async fn process(&self, chunk: &Chunk) -> Result<IndexedChunk> {
        let raw = self.completion.complete(&self.build_request(chunk)).await?;

        match recover_object(&raw).into_option() {
            Some(fields) => Ok(self.from_fields(chunk, &fields)),
            None => {
                debug!(
                    position = chunk.position,
                    "Summary output was not a JSON object, using text prefix"
                );
                Ok(self.fallback(chunk))
            }
        }
    }

    fn degraded(&self, chunk: &Chunk, _error: &anyhow::Error) -> IndexedChunk {
        self.fallback(chunk)
    }
}

fn fallback_summary(chunk: &Chunk) -> String {
    char_prefix(&chunk.text, FALLBACK_SUMMARY_CHARS).to_string()
}

/// Strings pass through; arrays of scalars are joined with ", "
fn flatten_field(value: &Value) -> Option<String> {
    let flat = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!flat.is_empty()).then_some(flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::batch::BatchScheduler;
    use crate::testing::ScriptedCompletion;

    fn chunk(position: usize, text: &str) -> Chunk {
        Chunk {
            position,
            text: text.to_string(),
        }
    }

    fn summarizer(completion: Arc<ScriptedCompletion>) -> ChunkSummarizer {
        ChunkSummarizer::new(completion, "book-1", &IngestConfig::default())
    }

    #[tokio::test]
    async fn test_strict_json_summary() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            r#"{"summary":"Cells divide.","key_concepts":"mitosis, cells, growth","keywords":"a, b"}"#
                .to_string(),
        ]));
        let indexed = summarizer(completion.clone())
            .process(&chunk(3, "Cells divide by mitosis."))
            .await
            .unwrap();

        assert_eq!(indexed.summary, "Cells divide.");
        assert_eq!(indexed.key_concepts, "mitosis, cells, growth");
        assert_eq!(indexed.record_id(), "book-1-3");
        assert!(!indexed.degraded);

        let request = &completion.requests()[0];
        assert_eq!(request.max_tokens, 200);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.system_prompt(), Some("Extract key information concisely."));
    }

    #[tokio::test]
    async fn test_object_in_prose_and_array_fields() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            "Sure:\n{\"summary\":\"S\",\"key_concepts\":[\"x\",\"y\",\"z\"],\"keywords\":[\"k1\",\"k2\"]}\nDone."
                .to_string(),
        ]));
        let indexed = summarizer(completion).process(&chunk(0, "text")).await.unwrap();

        assert_eq!(indexed.summary, "S");
        assert_eq!(indexed.key_concepts, "x, y, z");
        assert_eq!(indexed.keywords, "k1, k2");
    }

    #[tokio::test]
    async fn test_unparseable_output_degrades_to_prefix() {
        let long_text = "w".repeat(500);
        let completion = Arc::new(ScriptedCompletion::new(vec!["no json at all".to_string()]));
        let indexed = summarizer(completion)
            .process(&chunk(1, &long_text))
            .await
            .unwrap();

        assert!(indexed.degraded);
        assert_eq!(indexed.summary.chars().count(), 200);
        assert_eq!(indexed.key_concepts, "");
        assert_eq!(indexed.keywords, "");
    }

    #[tokio::test]
    async fn test_completion_failure_degrades() {
        let completion = Arc::new(ScriptedCompletion::with_results(vec![Err(
            "service unavailable".to_string(),
        )]));
        let s = summarizer(completion);

        let err = s.process(&chunk(0, "short")).await.unwrap_err();

        let indexed = s.degraded(&chunk(0, "short"), &err);
        assert_eq!(indexed.summary, "short");
        assert!(indexed.degraded);
    }

    #[tokio::test]
    async fn test_long_chunk_is_truncated_in_prompt() {
        let completion = Arc::new(ScriptedCompletion::new(vec!["{}".to_string()]));
        let text = format!("{}{}", "a".repeat(3000), "TAIL");
        summarizer(completion.clone())
            .process(&chunk(0, &text))
            .await
            .unwrap();

        let prompt = &completion.requests()[0].messages[1].content;
        assert!(prompt.contains(&"a".repeat(3000)));
        assert!(!prompt.contains("TAIL"));
    }

    #[tokio::test]
    async fn test_scheduler_keeps_every_chunk() {
        let completion = Arc::new(ScriptedCompletion::from_fn(|request| {
            let prompt = &request.messages[1].content;
            if prompt.contains("chunk 2") {
                anyhow::bail!("rate limited");
            }
            Ok(r#"{"summary":"ok","key_concepts":"","keywords":""}"#.to_string())
        }));
        let chunks: Vec<Chunk> = (0..5).map(|i| chunk(i, &format!("chunk {}", i))).collect();

        let indexed = BatchScheduler::new(3)
            .run(&chunks, &summarizer(completion))
            .await;

        assert_eq!(indexed.len(), 5);
        for (i, item) in indexed.iter().enumerate() {
            assert_eq!(item.chunk.position, i);
        }
        assert_eq!(indexed[2].summary, "chunk 2");
        assert!(indexed[2].degraded);
        assert_eq!(indexed[4].summary, "ok");
    }
}
