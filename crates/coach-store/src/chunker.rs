use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A bounded slice of corpus text stored as one retrieval unit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the chunk list; doubles as the vector id in the index.
    pub id: usize,
    pub text: String,
    /// Character offset of the first (post-trim) character in the corpus.
    pub source_offset: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk_size must be greater than zero")]
    ZeroSize,

    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// Sliding window parameters, measured in characters.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

/// Split corpus text into overlapping chunks.
///
/// The text is first cut into paragraphs (runs of non-blank lines); each
/// paragraph is then walked with a character window of `chunk_size` that
/// advances by `chunk_size - overlap`. Windows are trimmed, empty ones are
/// dropped and the last window of a paragraph is clipped at its end.
/// Ids are sequential across the whole corpus.
pub fn split(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for (offset, paragraph) in paragraphs(text) {
        window_paragraph(paragraph, offset, config, &mut chunks);
    }

    chunks
}

/// Returns `(char_offset, paragraph)` pairs in corpus order.
fn paragraphs(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    // (byte, char) position where the current paragraph started
    let mut open: Option<(usize, usize)> = None;
    let mut paragraph_end = 0;
    let mut byte_pos = 0;
    let mut char_pos = 0;

    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some((start_byte, start_char)) = open.take() {
                out.push((start_char, &text[start_byte..paragraph_end]));
            }
        } else {
            if open.is_none() {
                open = Some((byte_pos, char_pos));
            }
            paragraph_end = byte_pos + line.len();
        }

        byte_pos += line.len();
        char_pos += line.chars().count();
    }

    if let Some((start_byte, start_char)) = open {
        out.push((start_char, &text[start_byte..paragraph_end]));
    }

    out
}

fn window_paragraph(paragraph: &str, base_offset: usize, config: &ChunkConfig, out: &mut Vec<Chunk>) {
    // Byte index of every char boundary, including the end of the paragraph.
    let boundaries: Vec<usize> = paragraph
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(paragraph.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    let mut start = 0;
    while start < char_len {
        let end = (start + config.chunk_size).min(char_len);
        let window = &paragraph[boundaries[start]..boundaries[end]];

        let left_trimmed = window.trim_start();
        let leading = window[..window.len() - left_trimmed.len()].chars().count();
        let text = left_trimmed.trim_end();

        if !text.is_empty() {
            out.push(Chunk {
                id: out.len(),
                text: text.to_string(),
                source_offset: base_offset + start + leading,
            });
        }

        if end == char_len {
            break;
        }
        start += config.step();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig::new(size, overlap).unwrap()
    }

    #[test]
    fn test_config_rejects_zero_size() {
        assert_eq!(ChunkConfig::new(0, 0), Err(ChunkError::ZeroSize));
    }

    #[test]
    fn test_config_rejects_overlap_not_smaller_than_size() {
        assert!(matches!(
            ChunkConfig::new(10, 10),
            Err(ChunkError::OverlapTooLarge { .. })
        ));
        assert!(ChunkConfig::new(10, 9).is_ok());
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(split("", &config(500, 50)).is_empty());
        assert!(split("", &config(1, 0)).is_empty());
        assert!(split("\n\n   \n", &config(10, 3)).is_empty());
    }

    #[test]
    fn test_chunk_count_matches_window_arithmetic() {
        let text = "abcdefghijklmnopqrstuvwxyz0123456789".repeat(7);
        let (c, o) = (40, 10);
        let chunks = split(&text, &config(c, o));

        let l = text.chars().count();
        let expected = (l - o).div_ceil(c - o);
        assert_eq!(chunks.len(), expected);
    }

    #[test]
    fn test_last_window_is_clipped_not_padded() {
        let chunks = split("abcdefghij", &config(4, 1));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);

        let chunks = split("abcdefghijk", &config(4, 1));
        assert_eq!(chunks.last().unwrap().text, "jk");
    }

    #[test]
    fn test_overlap_removal_reconstructs_text() {
        let text = "TheQuickBrownFoxJumpsOverTheLazyDog".repeat(5);
        let chunks = split(&text, &config(16, 5));

        let mut rebuilt: Vec<char> = Vec::new();
        for chunk in &chunks {
            for (i, ch) in chunk.text.chars().enumerate() {
                let pos = chunk.source_offset + i;
                if pos < rebuilt.len() {
                    assert_eq!(rebuilt[pos], ch, "overlap disagrees at {pos}");
                } else {
                    rebuilt.push(ch);
                }
            }
        }

        assert_eq!(rebuilt.into_iter().collect::<String>(), text);
    }

    #[test]
    fn test_paragraphs_become_separate_chunks() {
        let corpus = "Deadlifts need neutral spine and braced core.\n\nSquats build leg strength.\n";
        let chunks = split(corpus, &config(500, 50));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, 0);
        assert_eq!(chunks[1].id, 1);
        assert!(chunks[0].text.starts_with("Deadlifts"));
        assert_eq!(chunks[1].text, "Squats build leg strength.");
        assert_eq!(chunks[1].source_offset, corpus.find("Squats").unwrap());
    }

    #[test]
    fn test_windows_are_trimmed_and_offsets_skip_whitespace() {
        let chunks = split("ab   cd", &config(3, 0));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        // "ab " -> "ab", "  c" -> "c", "d" -> "d"
        assert_eq!(texts, vec!["ab", "c", "d"]);
        assert_eq!(chunks[1].source_offset, 5);
        assert_eq!(chunks[2].source_offset, 6);
    }

    #[test]
    fn test_whitespace_only_windows_are_dropped() {
        let chunks = split("abc      def", &config(3, 0));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abc", "def"]);
        assert_eq!(chunks[1].id, 1);
    }

    #[test]
    fn test_multibyte_text_is_windowed_by_characters() {
        let chunks = split("ééééé", &config(2, 0));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["éé", "éé", "é"]);
        assert_eq!(chunks[2].source_offset, 4);
    }

    #[test]
    fn test_split_is_pure() {
        let text = "Warm up first.\n\nThen lift heavy with good form and progressive overload.";
        let cfg = config(20, 5);
        assert_eq!(split(text, &cfg), split(text, &cfg));
    }
}
