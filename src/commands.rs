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
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::adaptive::{AdaptiveQuiz, FileHistoryStore, HistoryStore, PerformanceProfile, ResponseRecord};
use crate::cli::{Commands, IndexCommand, LearnerCommand};
use crate::config::Config;
use crate::knowledge::formatting::{format_book_list, format_ingest_result, format_stats};
use crate::knowledge::KnowledgeStore;
use crate::llm::{OpenAiCompatibleClient, TimedCompletion};
use crate::pipeline::{PipelineResult, QuizPipeline, Services};
use crate::quiz::formatting::{format_questions, format_quiz, format_report};
use crate::quiz::repair::SchemaRepairer;
use crate::quiz::Question;

#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(format: &str) -> Result<Self> {
        match format.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => anyhow::bail!("Unknown output format '{}', expected text or json", other),
        }
    }
}

/// Render `value` as JSON or through `text`, then print or write it.
/// Files never receive color escapes.
fn emit<T: Serialize>(
    value: &T,
    format: OutputFormat,
    output: Option<&Path>,
    text: impl FnOnce(&T) -> String,
) -> Result<()> {
    match output {
        Some(path) => {
            colored::control::set_override(false);
            let rendered = render(value, format, text);
            colored::control::unset_override();

            std::fs::write(path, rendered?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{}", format!("Wrote {}", path.display()).green());
        }
        None => println!("{}", render(value, format, text)?),
    }
    Ok(())
}

fn render<T: Serialize>(
    value: &T,
    format: OutputFormat,
    text: impl FnOnce(&T) -> String,
) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Text => text(value),
    })
}

async fn open_store(config: &Config) -> Result<KnowledgeStore> {
    let provider = crate::embedding::create_embedding_provider(&config.embedding).await?;
    let index_path = crate::storage::get_index_path()?;
    KnowledgeStore::new(&index_path, provider, config.embedding.batch_size).await
}

fn open_history() -> Result<FileHistoryStore> {
    Ok(FileHistoryStore::new(crate::storage::get_history_dir()?))
}

async fn build_pipeline(config: &Config) -> Result<QuizPipeline> {
    let client = OpenAiCompatibleClient::new(&config.llm)?;
    let completion = Arc::new(TimedCompletion::new(
        Arc::new(client),
        Duration::from_secs(config.llm.timeout_secs),
    ));

    let services = Services {
        completion,
        index: Arc::new(open_store(config).await?),
        history: Arc::new(open_history()?),
    };

    Ok(QuizPipeline::new(config, services))
}

async fn resolve_document(file: &Path, book_id: Option<String>) -> Result<(String, String)> {
    let text = crate::document::load_document(file).await?;
    let book_id = book_id.unwrap_or_else(|| crate::storage::document_identifier(&text));
    Ok((book_id, text))
}

/// Questions plus the topic and book recorded in a quiz file, if any
struct QuizFile {
    questions: Vec<Question>,
    topic: Option<String>,
    book_id: Option<String>,
}

/// Accepts a generated quiz object or a bare array of questions.
/// Questions go through schema repair, so hand-written files are tolerated.
fn read_quiz_file(path: &Path) -> Result<QuizFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let field = |object: &serde_json::Map<String, Value>, key: &str| {
        object.get(key).and_then(Value::as_str).map(str::to_string)
    };

    let (items, topic, book_id) = match value {
        Value::Array(items) => (items, None, None),
        Value::Object(object) => {
            let topic = field(&object, "topic");
            let book_id = field(&object, "book_id");
            let items = match object.get("questions") {
                Some(Value::Array(items)) => items.clone(),
                _ => anyhow::bail!("{} has no questions array", path.display()),
            };
            (items, topic, book_id)
        }
        _ => anyhow::bail!("{} must hold a quiz object or a questions array", path.display()),
    };

    Ok(QuizFile {
        questions: SchemaRepairer.repair_all(items),
        topic,
        book_id,
    })
}

fn format_adaptive(adaptive: &AdaptiveQuiz) -> String {
    let mut output = format_profile(&adaptive.learner_id, &adaptive.profile);
    output.push('\n');
    output.push_str(&format_quiz(&adaptive.quiz));
    output
}

fn format_profile(learner_id: &str, profile: &PerformanceProfile) -> String {
    let mut output = String::new();
    output.push_str(&format!("Learner: {}", learner_id).bold().to_string());
    output.push('\n');
    output.push_str(&format!("Answers recorded: {}", profile.sample_count));
    output.push('\n');
    output.push_str(&format!(
        "Average time: {} ms",
        profile.avg_response_time_ms.round() as i64
    ));
    output.push('\n');
    output.push_str(&format!("Average hints: {:.2}", profile.avg_hints_used));
    output.push('\n');
    if let Some(accuracy) = profile.accuracy {
        output.push_str(&format!("Accuracy: {:.0}%", accuracy * 100.0));
        output.push('\n');
    }
    output.push_str(
        &format!("Directive: {}", profile.directive())
            .cyan()
            .to_string(),
    );
    output.push('\n');
    output
}

fn format_pipeline(result: &PipelineResult) -> String {
    let mut output = format_ingest_result(&result.ingest);
    output.push('\n');
    output.push_str(&format_report(&result.report));
    output.push('\n');
    output.push_str(
        &format!(
            "Final quiz: {} question(s) on {}",
            result.final_questions.len(),
            result.quiz.topic
        )
        .blue()
        .bold()
        .to_string(),
    );
    output.push_str("\n\n");
    output.push_str(&format_questions(&result.final_questions));
    output
}

pub async fn execute(config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Ingest {
            file,
            book_id,
            format,
        } => {
            let format = OutputFormat::parse(&format)?;
            let (book_id, text) = resolve_document(&file, book_id).await?;
            let pipeline = build_pipeline(config).await?;
            let result = pipeline.ingest(&book_id, &text).await?;
            emit(&result, format, None, format_ingest_result)
        }
        Commands::Generate {
            book_id,
            topic,
            count,
            format,
            output,
        } => {
            let format = OutputFormat::parse(&format)?;
            let pipeline = build_pipeline(config).await?;
            let quiz = pipeline.generate_quiz(&book_id, &topic, count).await?;
            emit(&quiz, format, output.as_deref(), format_quiz)
        }
        Commands::Validate {
            quiz,
            topic,
            book_id,
            no_fix,
            format,
            output,
        } => {
            let format = OutputFormat::parse(&format)?;
            let quiz_file = read_quiz_file(&quiz)?;
            let topic = topic
                .or(quiz_file.topic)
                .context("No topic given and the quiz file does not record one")?;
            let book_id = book_id.or(quiz_file.book_id);

            let pipeline = build_pipeline(config).await?;
            let auto_fix = config.validation.auto_fix && !no_fix;
            let report = pipeline
                .validate(&topic, book_id.as_deref(), &quiz_file.questions, auto_fix)
                .await?;
            emit(&report, format, output.as_deref(), format_report)
        }
        Commands::Adaptive {
            learner,
            book_id,
            topic,
            count,
            format,
            output,
        } => {
            let format = OutputFormat::parse(&format)?;
            let pipeline = build_pipeline(config).await?;
            let adaptive = pipeline
                .adaptive_quiz(&learner, &book_id, &topic, count)
                .await?;
            emit(&adaptive, format, output.as_deref(), format_adaptive)
        }
        Commands::Run {
            file,
            topic,
            book_id,
            count,
            format,
            output,
        } => {
            let format = OutputFormat::parse(&format)?;
            let (book_id, text) = resolve_document(&file, book_id).await?;
            let pipeline = build_pipeline(config).await?;
            let result = pipeline.run(&book_id, &text, &topic, count).await?;
            emit(&result, format, output.as_deref(), format_pipeline)
        }
        Commands::Learner { command } => execute_learner(command).await,
        Commands::Index { command } => execute_index(config, command).await,
    }
}

async fn execute_learner(command: LearnerCommand) -> Result<()> {
    let store = open_history()?;

    match command {
        LearnerCommand::Record {
            learner,
            time_ms,
            hints,
            correct,
        } => {
            let record = ResponseRecord {
                response_time_ms: time_ms,
                hints_used: hints,
                correct,
                answered_at: chrono::Utc::now(),
            };
            store.record(&learner, &record).await?;
            println!("{}", format!("Recorded answer for {}", learner).green());
            Ok(())
        }
        LearnerCommand::Stats { learner, format } => {
            let format = OutputFormat::parse(&format)?;
            let records = store.history(&learner).await?;
            let profile = PerformanceProfile::from_history(&records);
            emit(&profile, format, None, |p| format_profile(&learner, p))
        }
    }
}

async fn execute_index(config: &Config, command: IndexCommand) -> Result<()> {
    let store = open_store(config).await?;

    match command {
        IndexCommand::Stats => {
            let stats = store.get_stats().await?;
            print!("{}", format_stats(&stats));
        }
        IndexCommand::List { limit } => {
            let books = store.list_books(limit).await?;
            println!("{}", format_book_list(&books));
        }
        IndexCommand::Delete { book_id, yes } => {
            if !yes {
                println!(
                    "{}",
                    format!(
                        "This removes every chunk of book {}. Re-run with --yes to confirm.",
                        book_id
                    )
                    .yellow()
                );
                return Ok(());
            }
            store.delete_book(&book_id).await?;
            println!("{}", format!("Deleted book {}", book_id).green());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::parse("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text").unwrap(), OutputFormat::Text);
        assert!(OutputFormat::parse("yaml").is_err());
    }

    #[test]
    fn test_file_output_is_uncolored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiz.txt");

        emit(&"beta", OutputFormat::Text, Some(&path), |v| {
            format!("Answer: {}", (*v).green().bold())
        })
        .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "Answer: beta");
        assert!(!written.contains('\u{1b}'));
    }

    #[test]
    fn test_read_quiz_file_variants() {
        let dir = tempfile::tempdir().unwrap();

        let quiz_path = dir.path().join("quiz.json");
        std::fs::write(
            &quiz_path,
            r#"{"topic":"cells","book_id":"bio","questions":[{"question":"Q","choices":["a","b","c","d"],"correct":"B"}]}"#,
        )
        .unwrap();
        let quiz = read_quiz_file(&quiz_path).unwrap();
        assert_eq!(quiz.topic.as_deref(), Some("cells"));
        assert_eq!(quiz.book_id.as_deref(), Some("bio"));
        assert_eq!(quiz.questions[0].correct_choice(), "b");

        let array_path = dir.path().join("questions.json");
        std::fs::write(&array_path, r#"[{"question":"Q1"},{"question":"Q2"}]"#).unwrap();
        let quiz = read_quiz_file(&array_path).unwrap();
        assert_eq!(quiz.questions.len(), 2);
        assert!(quiz.topic.is_none());

        let bad_path = dir.path().join("bad.json");
        std::fs::write(&bad_path, r#"{"topic":"x"}"#).unwrap();
        assert!(read_quiz_file(&bad_path).is_err());
    }
}
