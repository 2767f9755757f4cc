// Copyright 2026 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! In-memory stand-ins for the external capabilities, used by unit tests.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::adaptive::performance::{HistoryStore, ResponseRecord};
use crate::knowledge::store::KnowledgeIndex;
use crate::knowledge::types::{ChunkMetadata, IndexHit, IndexedChunk};
use crate::llm::{CompletionProvider, CompletionRequest};
use crate::quiz::types::{AnswerLabel, Difficulty, Question};

type Handler = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

/// Completion provider answering from a script or a handler function.
/// Every request is recorded.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, String>>>,
    handler: Option<Handler>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    /// Answers with `responses` in order, then fails
    pub fn new(responses: Vec<String>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Like `new`, but `Err(message)` entries make the call fail
    pub fn with_results(results: Vec<Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            handler: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn from_fn(
        handler: impl Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            handler: Some(Box::new(handler)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of calls whose system prompt contains `needle`
    pub fn calls_with_system(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.system_prompt().is_some_and(|s| s.contains(needle)))
            .count()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(handler) = &self.handler {
            return handler(request);
        }
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("script exhausted")),
        }
    }
}

/// Provider that never answers within any reasonable timeout
pub struct Stalled;

#[async_trait]
impl CompletionProvider for Stalled {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

/// In-memory index. Distance is `1 - jaccard(query words, chunk words)`,
/// unless fixed hits were supplied.
#[derive(Default)]
pub struct MemoryIndex {
    chunks: Mutex<Vec<IndexedChunk>>,
    fixed_hits: Option<Vec<IndexHit>>,
    queries: Mutex<Vec<(String, usize, Option<String>)>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index whose queries always return `hits` (truncated to the limit)
    pub fn with_hits(hits: Vec<IndexHit>) -> Self {
        Self {
            fixed_hits: Some(hits),
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Vec<IndexedChunk> {
        self.chunks.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn last_query(&self) -> Option<(String, usize, Option<String>)> {
        self.queries.lock().unwrap().last().cloned()
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl KnowledgeIndex for MemoryIndex {
    async fn ingest(&self, _book_id: &str, chunks: &[IndexedChunk]) -> Result<usize> {
        self.chunks.lock().unwrap().extend_from_slice(chunks);
        Ok(chunks.len())
    }

    async fn query(
        &self,
        query_text: &str,
        limit: usize,
        book_filter: Option<&str>,
    ) -> Result<Vec<IndexHit>> {
        self.queries.lock().unwrap().push((
            query_text.to_string(),
            limit,
            book_filter.map(str::to_string),
        ));

        if let Some(hits) = &self.fixed_hits {
            return Ok(hits.iter().take(limit).cloned().collect());
        }

        let query_words = words(query_text);
        let mut hits: Vec<IndexHit> = self
            .chunks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| book_filter.is_none_or(|b| c.book_id == b))
            .map(|c| {
                let chunk_words = words(&c.chunk.text);
                let overlap = query_words.intersection(&chunk_words).count() as f32;
                let union = query_words.union(&chunk_words).count().max(1) as f32;
                IndexHit {
                    text: c.chunk.text.clone(),
                    metadata: ChunkMetadata {
                        book_id: c.book_id.clone(),
                        position: c.chunk.position,
                        summary: c.summary.clone(),
                        key_concepts: c.key_concepts.clone(),
                        keywords: c.keywords.clone(),
                    },
                    distance: 1.0 - overlap / union,
                }
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count_existing(&self, book_id: &str) -> Result<usize> {
        Ok(self
            .chunks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.book_id == book_id)
            .count())
    }
}

#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<HashMap<String, Vec<ResponseRecord>>>,
}

impl MemoryHistory {
    pub fn with(learner_id: &str, records: Vec<ResponseRecord>) -> Self {
        let history = Self::default();
        history
            .records
            .lock()
            .unwrap()
            .insert(learner_id.to_string(), records);
        history
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn history(&self, learner_id: &str) -> Result<Vec<ResponseRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(learner_id)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn hit(book_id: &str, position: usize, text: &str, distance: f32) -> IndexHit {
    IndexHit {
        text: text.to_string(),
        metadata: ChunkMetadata {
            book_id: book_id.to_string(),
            position,
            summary: format!("summary {}", position),
            key_concepts: String::new(),
            keywords: String::new(),
        },
        distance,
    }
}

pub fn question(text: &str) -> Question {
    Question {
        text: text.to_string(),
        choices: [
            "alpha".to_string(),
            "beta".to_string(),
            "gamma".to_string(),
            "delta".to_string(),
        ],
        correct: AnswerLabel::B,
        explanation: "beta is stated in the text".to_string(),
        hint: "second letter".to_string(),
        difficulty: Difficulty::Medium,
    }
}

pub fn question_json(text: &str) -> Value {
    json!({
        "question": text,
        "choices": ["alpha", "beta", "gamma", "delta"],
        "correct": "B",
        "explanation": "beta is stated in the text",
        "hint": "second letter",
        "difficulty": "medium"
    })
}

pub fn response(time_ms: u64, hints: u32) -> ResponseRecord {
    ResponseRecord {
        response_time_ms: time_ms,
        hints_used: hints,
        correct: None,
        answered_at: chrono::Utc::now(),
    }
}
