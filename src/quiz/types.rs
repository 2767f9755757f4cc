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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::knowledge::types::RetrievedChunk;

/// Label of a choice; A..D map to indices 0..3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerLabel {
    A,
    B,
    C,
    D,
}

impl AnswerLabel {
    pub const ALL: [AnswerLabel; 4] = [
        AnswerLabel::A,
        AnswerLabel::B,
        AnswerLabel::C,
        AnswerLabel::D,
    ];

    pub fn index(self) -> usize {
        match self {
            AnswerLabel::A => 0,
            AnswerLabel::B => 1,
            AnswerLabel::C => 2,
            AnswerLabel::D => 3,
        }
    }

    /// Lenient parse of model output: "B", "b", "B)", "(B)", "B. text"
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim().trim_start_matches('(');
        let mut chars = trimmed.chars();
        let label = match chars.next()?.to_ascii_uppercase() {
            'A' => AnswerLabel::A,
            'B' => AnswerLabel::B,
            'C' => AnswerLabel::C,
            'D' => AnswerLabel::D,
            _ => return None,
        };
        // Reject words that merely start with a label letter ("Because")
        match chars.next() {
            None => Some(label),
            Some(c) if !c.is_alphanumeric() => Some(label),
            Some(_) => None,
        }
    }
}

impl std::fmt::Display for AnswerLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AnswerLabel::A => "A",
            AnswerLabel::B => "B",
            AnswerLabel::C => "C",
            AnswerLabel::D => "D",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// A well-formed multiple-choice question.
/// Serialized with the wire field names used in generation prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question")]
    pub text: String,
    pub choices: [String; 4],
    pub correct: AnswerLabel,
    pub explanation: String,
    pub hint: String,
    pub difficulty: Difficulty,
}

impl Question {
    pub fn correct_choice(&self) -> &str {
        &self.choices[self.correct.index()]
    }

    /// True when choices were substituted by the schema repairer
    pub fn has_placeholder_choices(&self) -> bool {
        self.choices == crate::quiz::repair::placeholder_choices()
    }
}

/// Fact-check result for one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub question: Question,
    pub valid: bool,
    pub reason: String,
    pub fixed_question: Option<Question>,
}

impl ValidationOutcome {
    pub fn is_resolved(&self) -> bool {
        self.valid || self.fixed_question.is_some()
    }
}

/// Aggregate of a validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub topic: String,
    pub total_questions: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub fixed_count: usize,
    pub outcomes: Vec<ValidationOutcome>,
}

impl ValidationReport {
    pub fn from_outcomes(topic: &str, outcomes: Vec<ValidationOutcome>) -> Self {
        let valid_count = outcomes.iter().filter(|o| o.valid).count();
        let fixed_count = outcomes
            .iter()
            .filter(|o| o.fixed_question.is_some())
            .count();
        Self {
            topic: topic.to_string(),
            total_questions: outcomes.len(),
            valid_count,
            invalid_count: outcomes.len() - valid_count,
            fixed_count,
            outcomes,
        }
    }

    /// Questions to keep: the fix when there is one, otherwise the original if valid.
    /// Tops up with unresolved originals, in order, until `requested` is reached.
    pub fn final_questions(&self, requested: usize) -> Vec<Question> {
        let mut selected: Vec<Question> = self
            .outcomes
            .iter()
            .filter_map(|o| match (&o.fixed_question, o.valid) {
                (Some(fixed), _) => Some(fixed.clone()),
                (None, true) => Some(o.question.clone()),
                (None, false) => None,
            })
            .collect();

        for outcome in self.outcomes.iter().filter(|o| !o.is_resolved()) {
            if selected.len() >= requested {
                break;
            }
            selected.push(outcome.question.clone());
        }

        selected
    }
}

/// A generated quiz with its provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuiz {
    pub quiz_id: String,
    pub book_id: String,
    pub topic: String,
    pub questions: Vec<Question>,
    pub chunks_used: usize,
    pub retrieved: Vec<RetrievedChunk>,
    pub raw_output: String,
    pub created_at: DateTime<Utc>,
}

impl GeneratedQuiz {
    pub fn new(
        book_id: &str,
        topic: &str,
        questions: Vec<Question>,
        raw_output: String,
        retrieved: Vec<RetrievedChunk>,
    ) -> Self {
        Self {
            quiz_id: uuid::Uuid::new_v4().to_string(),
            book_id: book_id.to_string(),
            topic: topic.to_string(),
            questions,
            chunks_used: retrieved.len(),
            retrieved,
            raw_output,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str) -> Question {
        Question {
            text: text.to_string(),
            choices: [
                "one".to_string(),
                "two".to_string(),
                "three".to_string(),
                "four".to_string(),
            ],
            correct: AnswerLabel::C,
            explanation: "because".to_string(),
            hint: "think".to_string(),
            difficulty: Difficulty::Easy,
        }
    }

    fn outcome(text: &str, valid: bool, fixed: Option<&str>) -> ValidationOutcome {
        ValidationOutcome {
            question: question(text),
            valid,
            reason: String::new(),
            fixed_question: fixed.map(question),
        }
    }

    #[test]
    fn test_answer_label_parsing() {
        assert_eq!(AnswerLabel::parse("B"), Some(AnswerLabel::B));
        assert_eq!(AnswerLabel::parse(" d "), Some(AnswerLabel::D));
        assert_eq!(AnswerLabel::parse("(C)"), Some(AnswerLabel::C));
        assert_eq!(AnswerLabel::parse("A) Paris"), Some(AnswerLabel::A));
        assert_eq!(AnswerLabel::parse("Because"), None);
        assert_eq!(AnswerLabel::parse("E"), None);
        assert_eq!(AnswerLabel::parse(""), None);
        assert_eq!(AnswerLabel::C.index(), 2);
    }

    #[test]
    fn test_question_wire_format() {
        let value = serde_json::to_value(question("What?")).unwrap();
        assert_eq!(value["question"], "What?");
        assert_eq!(value["correct"], "C");
        assert_eq!(value["difficulty"], "easy");
        assert_eq!(value["choices"].as_array().unwrap().len(), 4);
        assert_eq!(question("x").correct_choice(), "three");
    }

    #[test]
    fn test_report_counts() {
        let report = ValidationReport::from_outcomes(
            "topic",
            vec![
                outcome("q1", true, None),
                outcome("q2", false, Some("q2 fixed")),
                outcome("q3", false, None),
            ],
        );
        assert_eq!(report.total_questions, 3);
        assert_eq!(report.valid_count, 1);
        assert_eq!(report.invalid_count, 2);
        assert_eq!(report.fixed_count, 1);
        assert!(!report.outcomes[2].is_resolved());
    }

    #[test]
    fn test_final_questions_prefers_fixes_then_tops_up() {
        let report = ValidationReport::from_outcomes(
            "topic",
            vec![
                outcome("q1", true, None),
                outcome("q2", false, Some("q2 fixed")),
                outcome("q3", false, None),
                outcome("q4", false, None),
            ],
        );

        let texts = |qs: Vec<Question>| qs.into_iter().map(|q| q.text).collect::<Vec<_>>();

        assert_eq!(texts(report.final_questions(2)), vec!["q1", "q2 fixed"]);
        assert_eq!(texts(report.final_questions(3)), vec!["q1", "q2 fixed", "q3"]);
        assert_eq!(
            texts(report.final_questions(10)),
            vec!["q1", "q2 fixed", "q3", "q4"]
        );
    }
}
