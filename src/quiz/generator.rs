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
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::GenerationConfig;
use crate::error::QuizError;
use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::quiz::parsing::recover_array;
use crate::quiz::repair::SchemaRepairer;
use crate::quiz::types::Question;

const GENERATOR_SYSTEM_PROMPT: &str =
    "You are a strict quiz-generation assistant. Use only the context provided.";
const ADAPTIVE_SYSTEM_PROMPT: &str =
    "You are a quiz generator that adapts to student performance.";

const FIELD_LIST: &str = "- question (string): The question text\n\
     - choices (array of 4 strings labelled A-D order)\n\
     - correct (one of \"A\",\"B\",\"C\",\"D\"): The correct answer\n\
     - explanation (string): A clear explanation of why the correct answer is right, based on the context\n\
     - hint (short sentence grounded in context)\n\
     - difficulty (\"easy\"|\"medium\"|\"hard\")\n\n";

/// Input of one generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub topic: &'a str,
    pub context: &'a str,
    pub count: usize,
    /// Performance-derived instruction; switches to the adaptive prompt
    pub difficulty_instruction: Option<&'a str>,
}

/// Repaired questions plus the raw model output they came from
#[derive(Debug, Clone)]
pub struct GeneratedQuestions {
    pub questions: Vec<Question>,
    pub raw_output: String,
}

/// Generates multiple-choice questions grounded in a context block
pub struct QuestionGenerator {
    completion: Arc<dyn CompletionProvider>,
    config: GenerationConfig,
    repairer: SchemaRepairer,
}

impl QuestionGenerator {
    pub fn new(completion: Arc<dyn CompletionProvider>, config: &GenerationConfig) -> Self {
        Self {
            completion,
            config: config.clone(),
            repairer: SchemaRepairer,
        }
    }

    /// Reject counts outside `1..=max_questions`
    pub fn check_count(&self, count: usize) -> Result<(), QuizError> {
        if count == 0 || count > self.config.max_questions {
            return Err(QuizError::InvalidRequest(format!(
                "question count must be between 1 and {}, got {}",
                self.config.max_questions, count
            )));
        }
        Ok(())
    }

    /// Output budget grows with the number of questions asked for
    pub fn output_budget(&self, count: usize) -> u32 {
        let per_question = self
            .config
            .tokens_per_question
            .saturating_mul(count.min(u32::MAX as usize) as u32);
        self.config.max_tokens.max(per_question)
    }

    pub fn build_messages(&self, request: &GenerationRequest<'_>) -> Vec<ChatMessage> {
        let (system, instructions) = match request.difficulty_instruction {
            None => (
                GENERATOR_SYSTEM_PROMPT,
                format!(
                    "Generate {} high-quality multiple-choice questions about the TOPIC: \"{}\". \
                     You MUST base all content only on the CONTEXT and not invent facts. \
                     For each question return an object with fields:\n{}\
                     Return a JSON array of questions only. Provide no extra commentary outside the JSON.",
                    request.count, request.topic, FIELD_LIST
                ),
            ),
            Some(modifier) => (
                ADAPTIVE_SYSTEM_PROMPT,
                format!(
                    "Generate {} questions for topic \"{}\". Use only the CONTEXT. \
                     Adjust difficulty according to: {}. For each question include:\n{}\
                     Return a JSON array of question objects only.",
                    request.count, request.topic, modifier, FIELD_LIST
                ),
            ),
        };

        vec![
            ChatMessage::system(system),
            ChatMessage::user(instructions),
            ChatMessage::user(format!("CONTEXT:\n{}", request.context)),
        ]
    }

    pub async fn generate(&self, request: &GenerationRequest<'_>) -> Result<GeneratedQuestions> {
        self.check_count(request.count)?;

        let completion_request = CompletionRequest::deterministic(
            self.build_messages(request),
            self.output_budget(request.count),
        );
        debug!(
            topic = request.topic,
            count = request.count,
            max_tokens = completion_request.max_tokens,
            adaptive = request.difficulty_instruction.is_some(),
            "Requesting quiz questions"
        );

        let raw = self.completion.complete(&completion_request).await?;
        let items = recover_array(&raw)
            .or_structured_error("array", &raw)
            .inspect_err(|_| debug!(raw = %raw, "Quiz output held no JSON array"))?;
        let questions = self.repairer.repair_all(items);

        info!(
            topic = request.topic,
            requested = request.count,
            generated = questions.len(),
            "Generated quiz questions"
        );

        Ok(GeneratedQuestions {
            questions,
            raw_output: raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::types::AnswerLabel;
    use crate::testing::{question_json, ScriptedCompletion};
    use serde_json::json;

    fn generator(completion: Arc<ScriptedCompletion>) -> QuestionGenerator {
        QuestionGenerator::new(completion, &GenerationConfig::default())
    }

    fn request(count: usize) -> GenerationRequest<'static> {
        GenerationRequest {
            topic: "Photosynthesis",
            context: "--- CHUNK 1 ---\nPlants use light.",
            count,
            difficulty_instruction: None,
        }
    }

    #[tokio::test]
    async fn test_prose_wrapped_array() {
        let raw = r#"Here you go: [{"question":"Q1","choices":["a","b","c","d"],"correct":"B"}] thanks"#;
        let completion = Arc::new(ScriptedCompletion::new(vec![raw.to_string()]));

        let generated = generator(completion).generate(&request(1)).await.unwrap();

        assert_eq!(generated.questions.len(), 1);
        let q = &generated.questions[0];
        assert_eq!(q.text, "Q1");
        assert_eq!(q.correct, AnswerLabel::B);
        assert_eq!(q.explanation, "Based on the context, B is the correct answer.");
        assert_eq!(generated.raw_output, raw);
    }

    #[tokio::test]
    async fn test_prompt_shape_and_budget() {
        let response = serde_json::to_string(&json!([question_json("Q")])).unwrap();
        let completion = Arc::new(ScriptedCompletion::new(vec![response.clone(), response]));
        let gen = generator(completion.clone());

        gen.generate(&request(3)).await.unwrap();
        gen.generate(&request(10)).await.unwrap();

        let requests = completion.requests();
        let first = &requests[0];
        assert_eq!(first.messages.len(), 3);
        assert_eq!(first.system_prompt(), Some(GENERATOR_SYSTEM_PROMPT));
        assert!(first.messages[1].content.contains("TOPIC: \"Photosynthesis\""));
        for field in ["question", "choices", "correct", "explanation", "hint", "difficulty"] {
            assert!(first.messages[1].content.contains(&format!("- {} (", field)));
        }
        assert!(first.messages[2].content.starts_with("CONTEXT:\n"));
        assert_eq!(first.temperature, 0.0);
        assert_eq!(first.max_tokens, 2000);
        // 10 questions * 350 tokens exceeds the floor
        assert_eq!(requests[1].max_tokens, 3500);
    }

    #[tokio::test]
    async fn test_adaptive_prompt_variant() {
        let response = serde_json::to_string(&json!([question_json("Q")])).unwrap();
        let completion = Arc::new(ScriptedCompletion::new(vec![response]));
        let instruction = "Student performance summary: avg_time_ms=9000, avg_hints=0.00. Instruction: increase difficulty.";

        generator(completion.clone())
            .generate(&GenerationRequest {
                difficulty_instruction: Some(instruction),
                ..request(2)
            })
            .await
            .unwrap();

        let sent = &completion.requests()[0];
        assert_eq!(sent.system_prompt(), Some(ADAPTIVE_SYSTEM_PROMPT));
        assert!(sent.messages[1]
            .content
            .contains(&format!("Adjust difficulty according to: {}", instruction)));
    }

    #[tokio::test]
    async fn test_no_array_is_structured_error() {
        let raw = "I'm sorry, the context is insufficient.";
        let completion = Arc::new(ScriptedCompletion::new(vec![raw.to_string()]));

        let err = generator(completion).generate(&request(2)).await.unwrap_err();
        match err.downcast_ref::<QuizError>() {
            Some(QuizError::StructuredOutput { raw: kept, .. }) => assert_eq!(kept, raw),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("context is insufficient"));
    }

    #[tokio::test]
    async fn test_truncated_output_is_structured_error() {
        let raw = r#"[{"question":"Q1","choices":["a","b","c","d"],"correct":"A"},{"question":"Q2","ch"#;
        let completion = Arc::new(ScriptedCompletion::new(vec![raw.to_string()]));

        let err = generator(completion).generate(&request(2)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QuizError>(),
            Some(QuizError::StructuredOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_count_bounds() {
        let completion = Arc::new(ScriptedCompletion::new(vec![]));
        let gen = generator(completion.clone());

        for count in [0, 51] {
            let err = gen.generate(&request(count)).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<QuizError>(),
                Some(QuizError::InvalidRequest(_))
            ));
        }
        assert_eq!(completion.call_count(), 0);
        assert!(gen.check_count(50).is_ok());
    }
}
