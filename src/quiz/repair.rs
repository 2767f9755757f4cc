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

use serde_json::{Map, Value};
use tracing::warn;

use crate::quiz::types::{AnswerLabel, Difficulty, Question};

const PLACEHOLDER_CHOICES: [&str; 4] = ["Option A", "Option B", "Option C", "Option D"];

pub fn placeholder_choices() -> [String; 4] {
    PLACEHOLDER_CHOICES.map(String::from)
}

/// Explanation substituted when the model omitted one
pub fn synthesized_explanation(label: AnswerLabel) -> String {
    format!("Based on the context, {} is the correct answer.", label)
}

pub fn is_synthesized_explanation(question: &Question) -> bool {
    question.explanation == synthesized_explanation(question.correct)
}

/// Forces loosely-shaped question objects into well-formed [`Question`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaRepairer;

impl SchemaRepairer {
    /// Repair every element; elements that are not JSON objects are dropped
    pub fn repair_all(&self, items: Vec<Value>) -> Vec<Question> {
        items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match item {
                Value::Object(object) => Some(self.repair(&object)),
                other => {
                    warn!(index, kind = %json_kind(&other), "Dropping non-object question entry");
                    None
                }
            })
            .collect()
    }

    pub fn repair(&self, object: &Map<String, Value>) -> Question {
        let correct = object
            .get("correct")
            .and_then(Value::as_str)
            .and_then(AnswerLabel::parse)
            .unwrap_or_else(|| {
                warn!(value = ?object.get("correct"), "Unresolvable correct label, defaulting to A");
                AnswerLabel::A
            });

        let choices = object
            .get("choices")
            .and_then(four_strings)
            .unwrap_or_else(placeholder_choices);

        let explanation = non_empty_str(object, "explanation")
            .map(str::to_string)
            .unwrap_or_else(|| synthesized_explanation(correct));

        let difficulty = object
            .get("difficulty")
            .and_then(Value::as_str)
            .and_then(Difficulty::parse)
            .unwrap_or_default();

        Question {
            text: non_empty_str(object, "question").unwrap_or_default().to_string(),
            choices,
            correct,
            explanation,
            hint: non_empty_str(object, "hint").unwrap_or_default().to_string(),
            difficulty,
        }
    }
}

fn non_empty_str<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn four_strings(value: &Value) -> Option<[String; 4]> {
    let items = value.as_array()?;
    if items.len() != 4 {
        return None;
    }
    let mut choices: [String; 4] = Default::default();
    for (slot, item) in choices.iter_mut().zip(items) {
        *slot = item.as_str()?.to_string();
    }
    Some(choices)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_complete_question_untouched() {
        let q = SchemaRepairer.repair(&object(json!({
            "question": "Capital of France?",
            "choices": ["Berlin", "Paris", "Rome", "Madrid"],
            "correct": "B",
            "explanation": "Paris is the capital.",
            "hint": "City of light",
            "difficulty": "easy"
        })));

        assert_eq!(q.text, "Capital of France?");
        assert_eq!(q.correct_choice(), "Paris");
        assert_eq!(q.explanation, "Paris is the capital.");
        assert_eq!(q.difficulty, Difficulty::Easy);
        assert!(!q.has_placeholder_choices());
        assert!(!is_synthesized_explanation(&q));
    }

    #[test]
    fn test_missing_explanation_references_label() {
        let q = SchemaRepairer.repair(&object(json!({
            "question": "Q",
            "choices": ["a", "b", "c", "d"],
            "correct": "D",
            "explanation": "   "
        })));
        assert_eq!(q.explanation, "Based on the context, D is the correct answer.");
        assert!(is_synthesized_explanation(&q));
    }

    #[test]
    fn test_bad_choices_get_placeholders() {
        for choices in [
            json!(null),
            json!(["a", "b", "c"]),
            json!(["a", "b", "c", "d", "e"]),
            json!(["a", 2, "c", "d"]),
            json!({"A": "a", "B": "b", "C": "c", "D": "d"}),
            json!("a, b, c, d"),
        ] {
            let q = SchemaRepairer.repair(&object(json!({
                "question": "Q",
                "choices": choices,
                "correct": "A",
            })));
            assert!(q.has_placeholder_choices(), "choices {:?}", choices);
        }

        let q = SchemaRepairer.repair(&object(json!({"question": "Q", "correct": "A"})));
        assert_eq!(q.choices, placeholder_choices());
    }

    #[test]
    fn test_invalid_label_and_difficulty_defaults() {
        let q = SchemaRepairer.repair(&object(json!({
            "question": "Q",
            "choices": ["a", "b", "c", "d"],
            "correct": "Z",
            "difficulty": "impossible"
        })));
        assert_eq!(q.correct, AnswerLabel::A);
        assert_eq!(q.difficulty, Difficulty::Medium);
        assert_eq!(q.hint, "");
    }

    #[test]
    fn test_schema_closure_over_messy_batch() {
        let items = vec![
            json!({"question": "Q1"}),
            json!("not a question"),
            json!({"question": "Q2", "choices": [], "correct": "c"}),
            json!(42),
            json!({"question": "Q3", "choices": ["w", "x", "y", "z"], "correct": "(d)"}),
            json!({}),
        ];

        let questions = SchemaRepairer.repair_all(items);

        assert_eq!(questions.len(), 4);
        for q in &questions {
            assert_eq!(q.choices.len(), 4);
            assert!(AnswerLabel::ALL.contains(&q.correct));
            assert!(!q.explanation.is_empty());
        }
        assert_eq!(questions[1].correct, AnswerLabel::C);
        assert_eq!(questions[2].correct_choice(), "z");
    }
}
