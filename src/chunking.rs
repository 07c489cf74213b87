//! Splitting documents into overlapping, line-respecting windows.
//!
//! Chunks are the retrieval granularity: each one is a contiguous slice
//! of a source document, bounded by `chunk_size` characters but never
//! splitting inside a line. A configurable overlap of trailing lines is
//! carried into the next chunk to preserve context across boundaries.

use serde::{Deserialize, Serialize};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default overlap between adjacent chunks in characters.
pub const DEFAULT_OVERLAP_SIZE: usize = 256;

/// One indexed chunk of a source document, persisted index-aligned with
/// the rows of the weighted matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Source file name within the collection directory.
    pub filename: String,
    /// Zero-based chunk index within the source file.
    pub chunk_index: usize,
    /// The chunk text content.
    pub text: String,
    /// Index terms produced from `text`.
    pub tokens: Vec<String>,
}

/// Split text into line-respecting windows of at most `chunk_size`
/// characters, carrying up to `overlap` characters of trailing lines
/// into the next window.
///
/// Lines longer than `chunk_size` become their own chunk rather than
/// being split mid-line.
pub fn split_into_chunks(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0;

    for line in text.split('\n') {
        let line_size = line.chars().count();

        if current_size + line_size > chunk_size && !current.is_empty() {
            chunks.push(current.join("\n"));

            if overlap > 0 && current.len() > 1 {
                // Carry trailing lines into the next chunk, newest last,
                // up to the overlap budget.
                let mut carried: Vec<&str> = Vec::new();
                let mut carried_size = 0;
                for prev in current.iter().rev() {
                    let prev_size = prev.chars().count();
                    if carried_size + prev_size <= overlap {
                        carried.insert(0, prev);
                        carried_size += prev_size;
                    } else {
                        break;
                    }
                }
                current = carried;
                current_size = carried_size;
            } else {
                current.clear();
                current_size = 0;
            }
        }

        current.push(line);
        current_size += line_size;
    }

    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunks = split_into_chunks("hello\nworld", 100, 10);
        assert_eq!(chunks, vec!["hello\nworld"]);
    }

    #[test]
    fn empty_text_no_chunks() {
        assert!(split_into_chunks("", 100, 10).is_empty());
    }

    #[test]
    fn splits_at_line_boundaries() {
        let text = (0..20)
            .map(|i| format!("line number {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = split_into_chunks(&text, 60, 0);

        assert!(chunks.len() > 1);
        // No chunk splits inside a line.
        for chunk in &chunks {
            for line in chunk.split('\n') {
                assert!(line.starts_with("line number "));
            }
        }
    }

    #[test]
    fn overlap_repeats_trailing_lines() {
        let text = "aaaa\nbbbb\ncccc\ndddd\neeee\nffff";
        let chunks = split_into_chunks(&text, 12, 5);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_line = pair[0].split('\n').next_back().unwrap();
            assert!(
                pair[1].starts_with(last_line),
                "next chunk should start with the carried line"
            );
        }
    }

    #[test]
    fn zero_overlap_has_no_repeats() {
        let text = "aaaa\nbbbb\ncccc\ndddd";
        let chunks = split_into_chunks(&text, 9, 0);

        let rejoined = chunks.join("\n");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn oversized_line_becomes_own_chunk() {
        let long = "x".repeat(500);
        let text = format!("short\n{long}\ntail");
        let chunks = split_into_chunks(&text, 100, 10);

        assert!(chunks.iter().any(|c| c.contains(&long)));
    }

    #[test]
    fn multibyte_sizes_are_counted_in_chars() {
        // 3 lines of 10 cyrillic chars each; chunk budget of 20 chars
        // fits exactly two lines.
        let text = "абвгдежзик\nабвгдежзик\nабвгдежзик";
        let chunks = split_into_chunks(&text, 20, 0);
        assert_eq!(chunks.len(), 2);
    }
}
