use crate::knowledge::types::Chunk;

/// Splits documents into paragraph-aligned chunks of bounded size
pub struct TextChunker {
    chunk_size: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Greedily pack paragraphs into chunks of at most `chunk_size` characters.
    /// A paragraph longer than `chunk_size` becomes a chunk of its own.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_chars = 0;

        for paragraph in split_paragraphs(text) {
            let paragraph_chars = paragraph.chars().count();
            let combined_chars = if current.is_empty() {
                paragraph_chars
            } else {
                current_chars + 2 + paragraph_chars
            };

            if combined_chars > self.chunk_size && !current.is_empty() {
                chunks.push(Chunk {
                    position: chunks.len(),
                    text: std::mem::take(&mut current),
                });
                current.push_str(paragraph);
                current_chars = paragraph_chars;
            } else {
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(paragraph);
                current_chars = combined_chars;
            }
        }

        if !current.is_empty() {
            chunks.push(Chunk {
                position: chunks.len(),
                text: current,
            });
        }

        chunks
    }
}

/// Split text into trimmed, non-empty paragraphs separated by blank lines.
/// A line holding only whitespace counts as blank.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                paragraphs.push(text[s..end].trim());
            }
        } else {
            if start.is_none() {
                start = Some(offset);
            }
            end = offset + line.len();
        }
        offset += line.len();
    }

    if let Some(s) = start {
        paragraphs.push(text[s..end].trim());
    }

    paragraphs
}

/// Longest prefix of `text` holding at most `max_chars` characters
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
