// Copyright 2025 Muvon Un Limited
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

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Per-call deadline; a timed out call is handled like unparseable output
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Embedding configuration for the knowledge index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "fastembed:all-MiniLM-L6-v2".to_string(),
            batch_size: 32,
        }
    }
}

/// Document ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Number of chunks summarized concurrently
    pub batch_width: usize,
    /// Prefix of each chunk sent for summarization
    pub summary_input_chars: usize,
    pub summary_max_tokens: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            batch_width: 3,
            summary_input_chars: 3000,
            summary_max_tokens: 200,
        }
    }
}

/// Direct quiz generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub retrieval_width: usize,
    pub context_chars: usize,
    /// Lower bound of the output token budget
    pub max_tokens: u32,
    /// Output budget per requested question, used when it exceeds `max_tokens`
    pub tokens_per_question: u32,
    pub max_questions: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            retrieval_width: 6,
            context_chars: 16000,
            max_tokens: 2000,
            tokens_per_question: 350,
            max_questions: 50,
        }
    }
}

/// Fact-check validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub retrieval_width: usize,
    pub context_chars: usize,
    pub max_tokens: u32,
    pub repair_max_tokens: u32,
    pub auto_fix: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            retrieval_width: 8,
            context_chars: 8000,
            max_tokens: 400,
            repair_max_tokens: 500,
            auto_fix: true,
        }
    }
}

/// Adaptive re-leveling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    pub retrieval_width: usize,
    pub context_chars: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            retrieval_width: 6,
            context_chars: 12000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write JSON logs with daily rotation under the storage directory
    pub file: bool,
}

/// Main configuration for quizforge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub ingest: IngestConfig,
    pub generation: GenerationConfig,
    pub validation: ValidationConfig,
    pub adaptive: AdaptiveConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from config.toml file
    /// First tries to load from system config directory, falls back to embedded template
    pub fn load() -> Result<Self> {
        let config_path = crate::storage::get_system_config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Config doesn't exist, create from template
            let template_content = include_str!("../config-templates/default.toml");
            let config: Self = toml::from_str(template_content)?;

            if let Some(parent) = config_path.parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&config_path, template_content)?;

            Ok(config)
        }
    }
}
