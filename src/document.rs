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
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::QuizError;

/// Documents with less readable text than this are rejected
pub const MIN_CONTENT_CHARS: usize = 50;

/// Extract text from `path`: PDFs through pdf-extract, anything else as UTF-8
pub async fn load_document(path: &Path) -> Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    let text = if is_pdf {
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || extract_pdf_text(&owned))
            .await
            .context("PDF extraction task failed")??
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    ensure_readable(&text)?;
    debug!(
        path = %path.display(),
        chars = text.chars().count(),
        "Loaded document"
    );
    Ok(text)
}

fn extract_pdf_text(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| anyhow::anyhow!("Failed to extract text from {}: {}", path.display(), e))
}

/// Reject text with fewer than [`MIN_CONTENT_CHARS`] non-whitespace characters
pub fn ensure_readable(text: &str) -> Result<(), QuizError> {
    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
    if visible < MIN_CONTENT_CHARS {
        return Err(QuizError::InvalidRequest(format!(
            "document has only {} readable characters, at least {} required",
            visible, MIN_CONTENT_CHARS
        )));
    }
    Ok(())
}
