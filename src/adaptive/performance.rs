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

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Response time assumed for a learner without history
pub const NEUTRAL_RESPONSE_TIME_MS: f64 = 20000.0;
/// Hints per question assumed for a learner without history
pub const NEUTRAL_HINTS_USED: f64 = 0.5;

const FAST_RESPONSE_MS: f64 = 15000.0;
const SLOW_RESPONSE_MS: f64 = 30000.0;
const FEW_HINTS: f64 = 0.5;
const MANY_HINTS: f64 = 1.0;

/// One answered question in a learner's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub response_time_ms: u64,
    pub hints_used: u32,
    #[serde(default)]
    pub correct: Option<bool>,
    pub answered_at: DateTime<Utc>,
}

/// Record store holding learner response history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All records for the learner, oldest first. Unknown learners have none.
    async fn history(&self, learner_id: &str) -> Result<Vec<ResponseRecord>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyDirective {
    Increase,
    Decrease,
    Maintain,
}

impl DifficultyDirective {
    /// Fast answers with few hints raise difficulty; slow answers or many hints lower it
    pub fn for_performance(avg_response_time_ms: f64, avg_hints_used: f64) -> Self {
        if avg_response_time_ms < FAST_RESPONSE_MS && avg_hints_used < FEW_HINTS {
            DifficultyDirective::Increase
        } else if avg_response_time_ms > SLOW_RESPONSE_MS || avg_hints_used > MANY_HINTS {
            DifficultyDirective::Decrease
        } else {
            DifficultyDirective::Maintain
        }
    }
}

impl std::fmt::Display for DifficultyDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DifficultyDirective::Increase => write!(f, "increase difficulty"),
            DifficultyDirective::Decrease => write!(f, "decrease difficulty"),
            DifficultyDirective::Maintain => write!(f, "maintain difficulty"),
        }
    }
}

/// Averages over a learner's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceProfile {
    pub avg_response_time_ms: f64,
    pub avg_hints_used: f64,
    pub sample_count: usize,
    /// Share of correct answers among records that say
    pub accuracy: Option<f64>,
}

impl PerformanceProfile {
    pub fn from_history(records: &[ResponseRecord]) -> Self {
        if records.is_empty() {
            return Self {
                avg_response_time_ms: NEUTRAL_RESPONSE_TIME_MS,
                avg_hints_used: NEUTRAL_HINTS_USED,
                sample_count: 0,
                accuracy: None,
            };
        }

        let n = records.len() as f64;
        let total_time: f64 = records.iter().map(|r| r.response_time_ms as f64).sum();
        let total_hints: f64 = records.iter().map(|r| r.hints_used as f64).sum();

        let graded: Vec<bool> = records.iter().filter_map(|r| r.correct).collect();
        let accuracy = if graded.is_empty() {
            None
        } else {
            Some(graded.iter().filter(|c| **c).count() as f64 / graded.len() as f64)
        };

        Self {
            avg_response_time_ms: total_time / n,
            avg_hints_used: total_hints / n,
            sample_count: records.len(),
            accuracy,
        }
    }

    pub fn directive(&self) -> DifficultyDirective {
        DifficultyDirective::for_performance(self.avg_response_time_ms, self.avg_hints_used)
    }

    /// Prompt fragment handed to the adaptive generator
    pub fn instruction(&self) -> String {
        format!(
            "Student performance summary: avg_time_ms={}, avg_hints={:.2}. Instruction: {}.",
            self.avg_response_time_ms.round() as i64,
            self.avg_hints_used,
            self.directive()
        )
    }
}

/// Profile of a learner, read from the store
pub async fn estimate(store: &dyn HistoryStore, learner_id: &str) -> Result<PerformanceProfile> {
    let records = store.history(learner_id).await?;
    let profile = PerformanceProfile::from_history(&records);
    debug!(
        learner_id,
        samples = profile.sample_count,
        avg_time_ms = profile.avg_response_time_ms,
        avg_hints = profile.avg_hints_used,
        directive = %profile.directive(),
        "Estimated learner performance"
    );
    Ok(profile)
}

/// History kept as one JSON-lines file per learner
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, learner_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", learner_file_stem(learner_id)))
    }

    /// Append one record to the learner's history
    pub async fn record(&self, learner_id: &str, record: &ResponseRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.file_for(learner_id);
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn history(&self, learner_id: &str) -> Result<Vec<ResponseRecord>> {
        let path = self.file_for(learner_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    file = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "Skipping unreadable history record"
                ),
            }
        }

        Ok(records)
    }
}

/// File-name-safe form of a learner id. Ids that needed rewriting get a hash
/// suffix so two different ids never share a file.
fn learner_file_stem(learner_id: &str) -> String {
    let safe: String = learner_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe == learner_id && !safe.is_empty() {
        safe
    } else {
        format!(
            "{}-{}",
            safe,
            crate::storage::document_identifier(learner_id)
        )
    }
}
