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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::adaptive::performance::{estimate, DifficultyDirective, HistoryStore, PerformanceProfile};
use crate::config::{AdaptiveConfig, GenerationConfig};
use crate::knowledge::context::ContextAssembler;
use crate::knowledge::store::KnowledgeIndex;
use crate::llm::CompletionProvider;
use crate::quiz::generator::{GenerationRequest, QuestionGenerator};
use crate::quiz::types::GeneratedQuiz;

/// A quiz re-leveled for one learner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveQuiz {
    pub quiz: GeneratedQuiz,
    pub learner_id: String,
    pub directive: DifficultyDirective,
    pub profile: PerformanceProfile,
}

/// Regenerates quizzes with a difficulty instruction derived from history.
/// Questions are repaired but not fact-checked.
pub struct AdaptiveOrchestrator {
    history: Arc<dyn HistoryStore>,
    assembler: ContextAssembler,
    generator: QuestionGenerator,
    config: AdaptiveConfig,
}

impl AdaptiveOrchestrator {
    pub fn new(
        completion: Arc<dyn CompletionProvider>,
        index: Arc<dyn KnowledgeIndex>,
        history: Arc<dyn HistoryStore>,
        generation: &GenerationConfig,
        config: &AdaptiveConfig,
    ) -> Self {
        Self {
            history,
            assembler: ContextAssembler::new(index),
            generator: QuestionGenerator::new(completion, generation),
            config: config.clone(),
        }
    }

    pub async fn generate(
        &self,
        learner_id: &str,
        book_id: &str,
        topic: &str,
        count: usize,
    ) -> Result<AdaptiveQuiz> {
        self.generator.check_count(count)?;

        let profile = estimate(self.history.as_ref(), learner_id).await?;
        let directive = profile.directive();
        let instruction = profile.instruction();

        let context = self
            .assembler
            .assemble(
                topic,
                Some(book_id),
                self.config.retrieval_width,
                self.config.context_chars,
            )
            .await?;

        let generated = self
            .generator
            .generate(&GenerationRequest {
                topic,
                context: &context.text,
                count,
                difficulty_instruction: Some(&instruction),
            })
            .await?;

        info!(
            learner_id,
            book_id,
            directive = %directive,
            questions = generated.questions.len(),
            "Generated adaptive quiz"
        );

        Ok(AdaptiveQuiz {
            quiz: GeneratedQuiz::new(
                book_id,
                topic,
                generated.questions,
                generated.raw_output,
                context.chunks,
            ),
            learner_id: learner_id.to_string(),
            directive,
            profile,
        })
    }
}
