use crate::error::IngestError;
use crate::models::{IngestionOptions, Record};
use std::collections::VecDeque;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            chunk_overlap: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits `text` into windows of at most `chunk_size` characters, trying
/// paragraph, line and word boundaries before falling back to single characters.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;
    Ok(split_recursive(text, &SEPARATORS, config))
}

/// Splits every record and copies its metadata onto each resulting window.
pub fn split_records(records: &[Record], config: ChunkingConfig) -> Result<Vec<Record>, IngestError> {
    config.validate()?;

    let mut windows = Vec::new();
    for record in records {
        for piece in split_recursive(&record.content, &SEPARATORS, config) {
            windows.push(Record {
                content: piece,
                metadata: record.metadata.clone(),
            });
        }
    }
    Ok(windows)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn split_recursive(text: &str, separators: &[&str], config: ChunkingConfig) -> Vec<String> {
    let (index, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, candidate)| candidate.is_empty() || text.contains(**candidate))
        .map(|(index, candidate)| (index, *candidate))
        .unwrap_or((separators.len().saturating_sub(1), ""));
    let remaining = separators.get(index + 1..).unwrap_or(&[]);

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        split_keeping_separator(text, separator)
    };

    let mut chunks = Vec::new();
    let mut pending = Vec::new();

    for piece in pieces {
        if char_len(&piece) < config.chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, config));
            pending.clear();
        }

        if remaining.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_recursive(&piece, remaining, config));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, config));
    }

    chunks
}

/// Splits on `separator`, keeping each separator at the start of the piece that follows it.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(text[start..index].to_string());
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }

    pieces
}

/// Greedily packs pieces into windows of at most `chunk_size` characters, carrying up to
/// `chunk_overlap` characters of trailing pieces into the next window.
fn merge_pieces(pieces: &[String], config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let length = char_len(piece);

        if total + length > config.chunk_size && !window.is_empty() {
            push_window(&mut chunks, &window);

            while total > config.chunk_overlap || (total > 0 && total + length > config.chunk_size)
            {
                let Some((_, dropped)) = window.pop_front() else {
                    break;
                };
                total = total.saturating_sub(dropped);
            }
        }

        window.push_back((piece.as_str(), length));
        total += length;
    }

    push_window(&mut chunks, &window);
    chunks
}

fn push_window(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            chunk_overlap,
        }
    }

    #[test]
    fn short_text_is_a_single_window() {
        let chunks = split_text("Cúm gây sốt và ho.", config(100, 10)).unwrap();
        assert_eq!(chunks, vec!["Cúm gây sốt và ho.".to_string()]);
    }

    #[test]
    fn paragraphs_are_preferred_split_points() {
        let text = "aaaa bbbb\n\ncccc dddd\n\neeee ffff";
        let chunks = split_text(text, config(12, 0)).unwrap();
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc dddd", "eeee ffff"]);
    }

    #[test]
    fn windows_respect_size_and_carry_overlap() {
        let text = "một hai ba bốn năm sáu bảy tám chín mười";
        let chunks = split_text(text, config(15, 8)).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 15, "{chunk:?} is too long");
        }
        let first_tail = chunks[0].split(' ').last().unwrap();
        assert!(chunks[1].contains(first_tail));
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let text = "x".repeat(25);
        let chunks = split_text(&text, config(10, 0)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "xxxxx");
    }

    #[test]
    fn invalid_overlap_is_rejected() {
        let result = split_text("abc", config(10, 10));
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }

    #[test]
    fn split_records_copies_metadata() {
        let record = Record::new("alpha beta\n\ngamma delta").with_metadata("page", 4);
        let windows = split_records(&[record], config(14, 0)).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].content, "gamma delta");
        assert!(windows
            .iter()
            .all(|window| window.metadata["page"].as_integer() == Some(4)));
    }

    #[test]
    fn separators_stay_with_following_piece() {
        assert_eq!(
            split_keeping_separator("a\n\nb\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\nc"]
        );
        assert_eq!(split_keeping_separator(" lead", " "), vec![" lead"]);
    }

    #[test]
    fn overlap_counts_the_kept_separator() {
        // " bbb" and " ccc" together exceed the window, so nothing carries over.
        let chunks = split_text("aaa bbb ccc", config(7, 4)).unwrap();
        assert_eq!(chunks, vec!["aaa bbb", "ccc"]);
    }
}
