use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::knowledge::chunker::char_prefix;
use crate::knowledge::types::{BookEntry, IndexStats, IngestResult};

pub fn format_ingest_result(result: &IngestResult) -> String {
    let mut output = String::new();

    if result.was_cached {
        output.push_str(
            &format!(
                "Book {} already indexed ({} chunks), nothing to do",
                result.book_id, result.chunk_count
            )
            .yellow()
            .to_string(),
        );
        output.push('\n');
        return output;
    }

    output.push_str(
        &format!("Indexed book {}", result.book_id)
            .green()
            .bold()
            .to_string(),
    );
    output.push('\n');
    output.push_str(&format!("Chunks: {}", result.chunk_count));
    output.push('\n');

    if result.degraded_chunks > 0 {
        output.push_str(
            &format!(
                "{} chunk(s) stored with a fallback summary",
                result.degraded_chunks
            )
            .yellow()
            .to_string(),
        );
        output.push('\n');
    }

    if !result.digests.is_empty() {
        output.push('\n');
        for digest in &result.digests {
            output.push_str(&format!("[{}] ", digest.position).bright_black().to_string());
            output.push_str(&digest.summary);
            output.push('\n');
            if !digest.key_concepts.is_empty() {
                output.push_str(&format!("    {}", digest.key_concepts).cyan().to_string());
                output.push('\n');
            }
        }
    }

    output
}

pub fn format_stats(stats: &IndexStats) -> String {
    let mut output = String::new();

    output.push_str(&"Knowledge Index Statistics".bold().to_string());
    output.push('\n');
    output.push_str(&format!("Total Books: {}", stats.total_books));
    output.push('\n');
    output.push_str(&format!("Total Chunks: {}", stats.total_chunks));
    output.push('\n');

    if stats.total_books > 0 {
        let avg = stats.total_chunks / stats.total_books;
        output.push_str(&format!("Average Chunks/Book: {}", avg));
        output.push('\n');
    }

    if let Some(oldest) = stats.oldest_indexed {
        output.push_str(&format!("Oldest Indexed: {}", format_relative_time(oldest)));
        output.push('\n');
    }

    if let Some(newest) = stats.newest_indexed {
        output.push_str(&format!("Newest Indexed: {}", format_relative_time(newest)));
        output.push('\n');
    }

    output
}

pub fn format_book_list(books: &[BookEntry]) -> String {
    if books.is_empty() {
        return "No books indexed".to_string();
    }

    let mut output = String::new();

    output.push_str(
        &format!("{:<42} {:<8} {}\n", "Book", "Chunks", "Last Indexed")
            .bold()
            .to_string(),
    );
    output.push_str(&"─".repeat(72));
    output.push('\n');

    for book in books {
        let id = if book.book_id.chars().count() > 40 {
            format!("{}...", char_prefix(&book.book_id, 37))
        } else {
            book.book_id.clone()
        };

        output.push_str(&format!(
            "{:<42} {:<8} {}\n",
            id,
            book.chunks,
            format_relative_time(book.last_indexed)
        ));
    }

    output
}

pub(crate) fn format_relative_time(dt: DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(dt);

    if duration.num_days() > 0 {
        format!("{} days ago", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{} hours ago", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{} minutes ago", duration.num_minutes())
    } else {
        "just now".to_string()
    }
}
