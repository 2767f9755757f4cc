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
use tracing::{info, warn};

use crate::adaptive::{AdaptiveOrchestrator, AdaptiveQuiz, HistoryStore};
use crate::config::Config;
use crate::knowledge::{ContextAssembler, IngestResult, KnowledgeIndex, KnowledgeManager};
use crate::llm::CompletionProvider;
use crate::quiz::{
    GeneratedQuiz, GenerationRequest, Question, QuestionGenerator, ValidationReport, Validator,
};

/// External capabilities the pipeline runs against
#[derive(Clone)]
pub struct Services {
    pub completion: Arc<dyn CompletionProvider>,
    pub index: Arc<dyn KnowledgeIndex>,
    pub history: Arc<dyn HistoryStore>,
}

/// Outcome of ingest, generate and validate in one go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub book_id: String,
    pub ingest: IngestResult,
    pub quiz: GeneratedQuiz,
    pub report: ValidationReport,
    pub final_questions: Vec<Question>,
}

/// The ingestion, generation, validation and adaptive stages over one set of services
pub struct QuizPipeline {
    config: Config,
    manager: KnowledgeManager,
    assembler: ContextAssembler,
    generator: QuestionGenerator,
    validator: Validator,
    orchestrator: AdaptiveOrchestrator,
}

impl QuizPipeline {
    pub fn new(config: &Config, services: Services) -> Self {
        Self {
            manager: KnowledgeManager::new(
                &config.ingest,
                services.index.clone(),
                services.completion.clone(),
            ),
            assembler: ContextAssembler::new(services.index.clone()),
            generator: QuestionGenerator::new(services.completion.clone(), &config.generation),
            validator: Validator::new(
                services.completion.clone(),
                services.index.clone(),
                &config.validation,
            ),
            orchestrator: AdaptiveOrchestrator::new(
                services.completion.clone(),
                services.index.clone(),
                services.history.clone(),
                &config.generation,
                &config.adaptive,
            ),
            config: config.clone(),
        }
    }

    pub async fn ingest(&self, book_id: &str, text: &str) -> Result<IngestResult> {
        self.manager.ingest(book_id, text).await
    }

    /// Generate `count` questions about `topic` from the book's chunks
    pub async fn generate_quiz(
        &self,
        book_id: &str,
        topic: &str,
        count: usize,
    ) -> Result<GeneratedQuiz> {
        self.generator.check_count(count)?;

        let context = self
            .assembler
            .assemble(
                topic,
                Some(book_id),
                self.config.generation.retrieval_width,
                self.config.generation.context_chars,
            )
            .await?;
        if context.is_empty() {
            warn!(book_id, topic, "No context retrieved, generating without grounding");
        }

        let generated = self
            .generator
            .generate(&GenerationRequest {
                topic,
                context: &context.text,
                count,
                difficulty_instruction: None,
            })
            .await?;

        Ok(GeneratedQuiz::new(
            book_id,
            topic,
            generated.questions,
            generated.raw_output,
            context.chunks,
        ))
    }

    pub async fn validate(
        &self,
        topic: &str,
        book_id: Option<&str>,
        questions: &[Question],
        auto_fix: bool,
    ) -> Result<ValidationReport> {
        self.validator
            .validate(topic, book_id, questions, auto_fix)
            .await
    }

    pub async fn adaptive_quiz(
        &self,
        learner_id: &str,
        book_id: &str,
        topic: &str,
        count: usize,
    ) -> Result<AdaptiveQuiz> {
        self.orchestrator
            .generate(learner_id, book_id, topic, count)
            .await
    }

    /// Ingest (skipped for known books), generate, validate with the configured
    /// auto-fix setting, then pick the final questions
    pub async fn run(
        &self,
        book_id: &str,
        text: &str,
        topic: &str,
        count: usize,
    ) -> Result<PipelineResult> {
        self.generator.check_count(count)?;

        let ingest = self.ingest(book_id, text).await?;
        let quiz = self.generate_quiz(book_id, topic, count).await?;
        let report = self
            .validate(
                topic,
                Some(book_id),
                &quiz.questions,
                self.config.validation.auto_fix,
            )
            .await?;
        let final_questions = report.final_questions(count);

        info!(
            book_id,
            topic,
            generated = quiz.questions.len(),
            selected = final_questions.len(),
            "Pipeline finished"
        );

        Ok(PipelineResult {
            book_id: book_id.to_string(),
            ingest,
            quiz,
            report,
            final_questions,
        })
    }
}
