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
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ValidationConfig;
use crate::error::QuizError;
use crate::knowledge::chunker::char_prefix;
use crate::knowledge::context::ContextAssembler;
use crate::knowledge::store::KnowledgeIndex;
use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::quiz::parsing::{parse_strict, recover_object};
use crate::quiz::repair::SchemaRepairer;
use crate::quiz::types::{Question, ValidationOutcome, ValidationReport};

const VALIDATOR_SYSTEM_PROMPT: &str =
    "You are a fact-checking validator. Only verify if the QUESTION is supported by the CONTEXT.";
const FIXER_SYSTEM_PROMPT: &str =
    "You are a quiz fixer. Regenerate a single question strictly from CONTEXT.";

/// Characters of unparsed validator output kept as the reason
const HEURISTIC_REASON_CHARS: usize = 300;

/// Verdict of one fact-check call
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub valid: bool,
    pub reason: String,
}

impl Verdict {
    /// Read a verdict from validator output. Output that is not a JSON object
    /// with a boolean `valid` falls back to a word heuristic.
    pub fn from_output(raw: &str) -> Self {
        if let Some(object) = parse_strict::<Map<String, Value>>(raw).into_option() {
            if let Some(valid) = object.get("valid").and_then(Value::as_bool) {
                let reason = object
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Self { valid, reason };
            }
        }

        // Approximate: "not true" reads as valid, "true or false" as invalid
        Self {
            valid: contains_word(raw, "true") && !contains_word(raw, "false"),
            reason: char_prefix(raw, HEURISTIC_REASON_CHARS).to_string(),
        }
    }
}

/// Case-insensitive whole-word match, word characters being alphanumerics and `_`
fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|token| token.eq_ignore_ascii_case(word))
}

/// Fact-checks questions against retrieved context and repairs the ones that fail
pub struct Validator {
    completion: Arc<dyn CompletionProvider>,
    assembler: ContextAssembler,
    config: ValidationConfig,
    repairer: SchemaRepairer,
}

impl Validator {
    pub fn new(
        completion: Arc<dyn CompletionProvider>,
        index: Arc<dyn KnowledgeIndex>,
        config: &ValidationConfig,
    ) -> Self {
        Self {
            completion,
            assembler: ContextAssembler::new(index),
            config: config.clone(),
            repairer: SchemaRepairer,
        }
    }

    /// Validate every question in order. Context is retrieved once for the
    /// whole run. Each question costs at most one check and one repair call.
    pub async fn validate(
        &self,
        topic: &str,
        book_id: Option<&str>,
        questions: &[Question],
        auto_fix: bool,
    ) -> Result<ValidationReport> {
        if questions.is_empty() {
            return Ok(ValidationReport::from_outcomes(topic, Vec::new()));
        }

        let context = self
            .assembler
            .assemble(
                topic,
                book_id,
                self.config.retrieval_width,
                self.config.context_chars,
            )
            .await?;

        let mut outcomes = Vec::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            let outcome = self
                .validate_one(question, &context.text, auto_fix)
                .await?;
            debug!(
                index,
                valid = outcome.valid,
                fixed = outcome.fixed_question.is_some(),
                "Validated question"
            );
            outcomes.push(outcome);
        }

        let report = ValidationReport::from_outcomes(topic, outcomes);
        info!(
            topic,
            total = report.total_questions,
            valid = report.valid_count,
            invalid = report.invalid_count,
            fixed = report.fixed_count,
            "Validation finished"
        );
        Ok(report)
    }

    async fn validate_one(
        &self,
        question: &Question,
        context: &str,
        auto_fix: bool,
    ) -> Result<ValidationOutcome> {
        let question_json = serde_json::to_string(question)?;

        let check = CompletionRequest::deterministic(
            vec![
                ChatMessage::system(VALIDATOR_SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Given QUESTION and CHOICES, answer with JSON {{ valid: boolean, reason: string }}.\n\
                     QUESTION: {}\n\nCONTEXT:\n{}",
                    question_json, context
                )),
            ],
            self.config.max_tokens,
        );

        let verdict = match self.completion.complete(&check).await {
            Ok(raw) => Verdict::from_output(&raw),
            Err(e) if QuizError::is_timeout(&e) => {
                warn!(question = %question.text, "Validation call timed out, marking invalid");
                return Ok(ValidationOutcome {
                    question: question.clone(),
                    valid: false,
                    reason: e.to_string(),
                    fixed_question: None,
                });
            }
            Err(e) => return Err(e),
        };

        let fixed_question = if !verdict.valid && auto_fix {
            self.repair(&question_json, context).await?
        } else {
            None
        };

        Ok(ValidationOutcome {
            question: question.clone(),
            valid: verdict.valid,
            reason: verdict.reason,
            fixed_question,
        })
    }

    async fn repair(&self, question_json: &str, context: &str) -> Result<Option<Question>> {
        let request = CompletionRequest::deterministic(
            vec![
                ChatMessage::system(FIXER_SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Original question: {}\n\nCONTEXT:\n{}\n\n\
                     Return a single JSON object with same fields: question, choices(A-D array), \
                     correct(A-D), explanation, hint, difficulty.",
                    question_json, context
                )),
            ],
            self.config.repair_max_tokens,
        );

        let raw = match self.completion.complete(&request).await {
            Ok(raw) => raw,
            Err(e) if QuizError::is_timeout(&e) => {
                warn!("Repair call timed out, leaving question unfixed");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match recover_object(&raw).into_option() {
            Some(object) => {
                let fixed = self.repairer.repair(&object);
                // A fix must carry its own question and choices
                if fixed.text.trim().is_empty() || fixed.has_placeholder_choices() {
                    debug!(
                        chars = raw.chars().count(),
                        "Repair output was not a usable question"
                    );
                    return Ok(None);
                }
                Ok(Some(fixed))
            }
            None => {
                debug!(chars = raw.chars().count(), "Repair output held no JSON object");
                Ok(None)
            }
        }
    }
}
