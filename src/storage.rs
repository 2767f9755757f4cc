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
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

/// Get the system-wide storage directory for Quizforge
/// Following XDG Base Directory specification on Unix-like systems
/// and proper conventions on other systems
pub fn get_system_storage_dir() -> Result<PathBuf> {
    let base_dir = if cfg!(target_os = "macos") {
        // macOS: ~/.local/share/quizforge
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".local")
            .join("share")
            .join("quizforge")
    } else if cfg!(target_os = "windows") {
        // Windows: %APPDATA%/quizforge
        dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine data directory"))?
            .join("quizforge")
    } else {
        // Linux and other Unix-like: ~/.local/share/quizforge or $XDG_DATA_HOME/quizforge
        if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
            PathBuf::from(xdg_data_home).join("quizforge")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".local")
                .join("share")
                .join("quizforge")
        }
    };

    if !base_dir.exists() {
        fs::create_dir_all(&base_dir)?;
    }

    Ok(base_dir)
}

/// Get a named subdirectory of the storage directory, creating it if needed
fn get_storage_subdir(name: &str) -> Result<PathBuf> {
    let dir = get_system_storage_dir()?.join(name);
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// LanceDB directory holding the knowledge index
pub fn get_index_path() -> Result<PathBuf> {
    get_storage_subdir("knowledge")
}

/// Directory of per-learner response history files
pub fn get_history_dir() -> Result<PathBuf> {
    get_storage_subdir("history")
}

/// Directory for rotated log files
pub fn get_log_dir() -> Result<PathBuf> {
    get_storage_subdir("logs")
}

/// Get the system config file path
/// Stored directly under ~/.local/share/quizforge/ on all systems
pub fn get_system_config_path() -> Result<PathBuf> {
    let system_dir = get_system_storage_dir()?;
    Ok(system_dir.join("config.toml"))
}

/// Stable identifier for a document derived from its text
/// Uses the first 16 hex chars of the SHA256 digest
pub fn document_identifier(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_identifier_is_stable() {
        let a = document_identifier("Para A.\n\nPara B.");
        let b = document_identifier("Para A.\n\nPara B.");
        let c = document_identifier("Para A.\n\nPara C.");

        assert_eq!(a.len(), 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
