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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quizforge")]
#[command(version, author = "Muvon Un Limited <opensource@muvon.io>")]
#[command(about = "Grounded multiple-choice quiz generation from long documents", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk, summarize and index a document (.pdf or plain text)
    Ingest {
        /// Document to ingest
        file: PathBuf,

        /// Book identifier (defaults to a hash of the document text)
        #[arg(short, long)]
        book_id: Option<String>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Generate a quiz from an indexed book
    Generate {
        /// Book identifier
        #[arg(short, long)]
        book_id: String,

        /// Topic the questions should cover
        #[arg(short, long)]
        topic: String,

        /// Number of questions (1-50)
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Write the result to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fact-check a generated quiz against the index and repair invalid questions
    Validate {
        /// Quiz JSON file (output of `generate --format json`, or an array of questions)
        quiz: PathBuf,

        /// Topic used for retrieval (defaults to the quiz topic)
        #[arg(short, long)]
        topic: Option<String>,

        /// Restrict retrieval to this book (defaults to the quiz book)
        #[arg(short, long)]
        book_id: Option<String>,

        /// Report invalid questions without asking for fixes
        #[arg(long)]
        no_fix: bool,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Write the result to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a quiz leveled to a learner's response history
    Adaptive {
        /// Learner identifier
        #[arg(short, long)]
        learner: String,

        /// Book identifier
        #[arg(short, long)]
        book_id: String,

        /// Topic the questions should cover
        #[arg(short, long)]
        topic: String,

        /// Number of questions (1-50)
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Write the result to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ingest, generate and validate in one go
    Run {
        /// Document to ingest
        file: PathBuf,

        /// Topic the questions should cover
        #[arg(short, long)]
        topic: String,

        /// Book identifier (defaults to a hash of the document text)
        #[arg(short, long)]
        book_id: Option<String>,

        /// Number of questions (1-50)
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Write the result to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Learner response history
    Learner {
        #[command(subcommand)]
        command: LearnerCommand,
    },

    /// Knowledge index management
    Index {
        #[command(subcommand)]
        command: IndexCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum LearnerCommand {
    /// Record one answered question
    Record {
        /// Learner identifier
        learner: String,

        /// Time taken to answer, in milliseconds
        #[arg(short = 'm', long)]
        time_ms: u64,

        /// Hints used before answering
        #[arg(long, default_value = "0")]
        hints: u32,

        /// Whether the answer was correct
        #[arg(short, long)]
        correct: Option<bool>,
    },

    /// Show a learner's performance profile and difficulty directive
    Stats {
        /// Learner identifier
        learner: String,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum IndexCommand {
    /// Show index statistics
    Stats,

    /// List indexed books
    List {
        /// Maximum number of books to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Remove every chunk of a book
    Delete {
        /// Book identifier
        book_id: String,

        /// Confirm deletion without prompting
        #[arg(short = 'y', long)]
        yes: bool,
    },
}
