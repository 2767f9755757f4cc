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

use std::time::Duration;
use thiserror::Error;

/// Failures callers need to branch on. Everything else travels as `anyhow::Error`.
#[derive(Debug, Error)]
pub enum QuizError {
    /// No JSON value of the expected shape could be located in model output
    #[error("could not recover a JSON {expected} from model output: {}", preview(raw))]
    StructuredOutput { expected: &'static str, raw: String },

    #[error("completion call timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Model output shown in error messages is cut to this many characters
const RAW_PREVIEW_CHARS: usize = 200;

fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(RAW_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}... ({} chars)", &trimmed[..cut], trimmed.chars().count()),
        None => trimmed.to_string(),
    }
}

impl QuizError {
    /// True when `err` is (or wraps) a completion timeout
    pub fn is_timeout(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<QuizError>(), Some(QuizError::Timeout(_)))
    }
}
