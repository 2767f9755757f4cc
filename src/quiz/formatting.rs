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

use colored::Colorize;

use crate::knowledge::chunker::char_prefix;
use crate::quiz::repair::is_synthesized_explanation;
use crate::quiz::types::{AnswerLabel, GeneratedQuiz, Question, ValidationReport};

pub fn format_questions(questions: &[Question]) -> String {
    if questions.is_empty() {
        return "No questions".to_string();
    }

    let mut output = String::new();

    for (i, question) in questions.iter().enumerate() {
        output.push_str(&"━".repeat(60));
        output.push('\n');

        output.push_str(
            &format!("{}. {}", i + 1, question.text)
                .bold()
                .to_string(),
        );
        output.push_str(&format!(" [{}]", question.difficulty).bright_black().to_string());
        output.push('\n');

        for label in AnswerLabel::ALL {
            let line = format!("   {}) {}", label, question.choices[label.index()]);
            if label == question.correct {
                output.push_str(&line.green().to_string());
            } else {
                output.push_str(&line);
            }
            output.push('\n');
        }

        if !question.hint.is_empty() {
            output.push_str(&format!("   Hint: {}", question.hint).cyan().to_string());
            output.push('\n');
        }
        let answer = if is_synthesized_explanation(question) {
            format!("   Answer: {}", question.correct)
        } else {
            format!("   Answer: {} - {}", question.correct, question.explanation)
        };
        output.push_str(&answer.bright_black().to_string());
        output.push_str("\n\n");
    }

    output
}

pub fn format_quiz(quiz: &GeneratedQuiz) -> String {
    let mut output = String::new();

    output.push_str(&format!("Quiz: {}", quiz.topic).blue().bold().to_string());
    output.push('\n');
    output.push_str(
        &format!(
            "id {} | book {} | {} question(s) from {} chunk(s)",
            quiz.quiz_id,
            quiz.book_id,
            quiz.questions.len(),
            quiz.chunks_used
        )
        .bright_black()
        .to_string(),
    );
    output.push_str("\n\n");
    output.push_str(&format_questions(&quiz.questions));

    output
}

pub fn format_report(report: &ValidationReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Validation: {}", report.topic).bold().to_string());
    output.push('\n');
    output.push_str(&format!(
        "Total: {}  {}  {}  {}",
        report.total_questions,
        format!("valid {}", report.valid_count).green(),
        format!("invalid {}", report.invalid_count).red(),
        format!("fixed {}", report.fixed_count).yellow()
    ));
    output.push_str("\n\n");

    for (i, outcome) in report.outcomes.iter().enumerate() {
        let status = if outcome.valid {
            "VALID".green()
        } else if outcome.fixed_question.is_some() {
            "FIXED".yellow()
        } else {
            "INVALID".red()
        };
        output.push_str(&format!("{:>3}. [{}] {}", i + 1, status, outcome.question.text));
        output.push('\n');

        if !outcome.reason.is_empty() {
            output.push_str(
                &format!("     {}", char_prefix(&outcome.reason, 160))
                    .bright_black()
                    .to_string(),
            );
            output.push('\n');
        }
        if let Some(fixed) = &outcome.fixed_question {
            output.push_str(&format!("     -> {}", fixed.text).cyan().to_string());
            output.push('\n');
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::types::ValidationOutcome;
    use crate::testing::question;

    #[test]
    fn test_questions_list_choices_and_answer() {
        colored::control::set_override(false);
        let out = format_questions(&[question("What is beta?")]);
        assert!(out.contains("1. What is beta?"));
        assert!(out.contains("   B) beta"));
        assert!(out.contains("Answer: B - beta is stated in the text"));
    }

    #[test]
    fn test_report_statuses() {
        colored::control::set_override(false);
        let report = ValidationReport::from_outcomes(
            "t",
            vec![
                ValidationOutcome {
                    question: question("ok"),
                    valid: true,
                    reason: String::new(),
                    fixed_question: None,
                },
                ValidationOutcome {
                    question: question("bad"),
                    valid: false,
                    reason: "not supported".to_string(),
                    fixed_question: Some(question("better")),
                },
            ],
        );
        let out = format_report(&report);
        assert!(out.contains("[VALID] ok"));
        assert!(out.contains("[FIXED] bad"));
        assert!(out.contains("-> better"));
    }
}
