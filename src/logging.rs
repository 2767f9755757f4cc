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

use tracing::debug;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt::Layer, prelude::*, registry::Registry, EnvFilter};

use crate::config::LoggingConfig;

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "quizforge=debug"
    } else {
        "quizforge=info"
    }
}

/// Initialize logging: human-readable lines on stderr, plus daily-rotated
/// JSON files under the storage directory when enabled in config.
/// `RUST_LOG` overrides the default filter.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<(), anyhow::Error> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    // stdout stays clean for quiz output
    let console_layer = Layer::new()
        .with_writer(std::io::stderr)
        .with_target(false);

    let log_dir = if config.file {
        let dir = crate::storage::get_log_dir()?;
        std::fs::create_dir_all(&dir)?;
        Some(dir)
    } else {
        None
    };

    let file_layer = log_dir.as_ref().map(|dir| {
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "quizforge.log");
        Layer::new()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .json()
    });

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()?;

    if let Some(dir) = &log_dir {
        debug!(log_directory = %dir.display(), "File logging enabled");
    }

    Ok(())
}
