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

//! Recovery of structured JSON from free-form model output.
//!
//! Every tier returns an [`Extraction`], so the fallback chain is a plain
//! sequence of `or_else` calls:
//!
//! 1. strict parse of the whole response
//! 2. parse of the substring between the first opening and the last closing bracket
//!
//! What happens when both tiers fail is up to the caller (degrade or error).

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::QuizError;

/// Outcome of one recovery tier
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    Parsed(T),
    /// Something was there but did not parse; carries the offending text
    Malformed(String),
    /// Nothing to parse
    Absent,
}

impl<T> Extraction<T> {
    /// Run the next tier unless this one already produced a value
    pub fn or_else(self, next: impl FnOnce() -> Extraction<T>) -> Extraction<T> {
        match self {
            Extraction::Parsed(value) => Extraction::Parsed(value),
            _ => next(),
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Extraction::Parsed(value) => Some(value),
            _ => None,
        }
    }

    /// Turn a failed extraction into [`QuizError::StructuredOutput`] carrying `raw`
    pub fn or_structured_error(self, expected: &'static str, raw: &str) -> Result<T, QuizError> {
        match self {
            Extraction::Parsed(value) => Ok(value),
            _ => Err(QuizError::StructuredOutput {
                expected,
                raw: raw.to_string(),
            }),
        }
    }
}

/// Parse the whole text as `T`
pub fn parse_strict<T: DeserializeOwned>(raw: &str) -> Extraction<T> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Extraction::Absent;
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => Extraction::Parsed(value),
        Err(_) => Extraction::Malformed(trimmed.to_string()),
    }
}

/// Parse the span from the first `open` to the last `close` as `T`
pub fn parse_bracketed<T: DeserializeOwned>(raw: &str, open: char, close: char) -> Extraction<T> {
    let (Some(start), Some(end)) = (raw.find(open), raw.rfind(close)) else {
        return Extraction::Absent;
    };
    if end <= start {
        return Extraction::Absent;
    }

    let candidate = &raw[start..end + close.len_utf8()];
    match serde_json::from_str(candidate) {
        Ok(value) => Extraction::Parsed(value),
        Err(_) => Extraction::Malformed(candidate.to_string()),
    }
}

/// Recover a JSON array: strict parse, then `[`..`]` scan
pub fn recover_array(raw: &str) -> Extraction<Vec<Value>> {
    parse_strict(raw).or_else(|| parse_bracketed(raw, '[', ']'))
}

/// Recover a JSON object: strict parse, then `{`..`}` scan
pub fn recover_object(raw: &str) -> Extraction<Map<String, Value>> {
    parse_strict(raw).or_else(|| parse_bracketed(raw, '{', '}'))
}
