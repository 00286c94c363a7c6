// src/chunker.rs
// Page-aware, paragraph-aware chunking bounded by a word budget.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ChunkError;
use crate::model::{Chunk, Page};

/// Word budget used by the ingest pipeline.
pub const DEFAULT_MAX_WORDS: usize = 300;

// A blank line may carry stray spaces or tabs; `\s*` also swallows runs of
// several blank lines so they count as one boundary.
static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("paragraph break pattern is valid"));

#[derive(Debug, Clone)]
pub struct TextChunker {
    max_words: usize,
}

impl TextChunker {
    pub fn new(max_words: usize) -> Result<Self, ChunkError> {
        if max_words == 0 {
            return Err(ChunkError::InvalidMaxWords(max_words));
        }
        Ok(Self { max_words })
    }

    pub fn max_words(&self) -> usize {
        self.max_words
    }

    /// Splits every page into paragraph chunks. Paragraphs above the word
    /// budget are cut into consecutive, non-overlapping windows of
    /// `max_words` words joined by single spaces.
    ///
    /// Output order is page, then paragraph, then window. No chunk spans two
    /// pages.
    pub fn chunk(&self, pages: &[Page]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages {
            for paragraph in split_paragraphs(&page.text) {
                let words: Vec<&str> = paragraph.split_whitespace().collect();
                if words.len() <= self.max_words {
                    chunks.push(Chunk::paragraph(paragraph, page.page));
                } else {
                    for window in words.chunks(self.max_words) {
                        chunks.push(Chunk::paragraph(window.join(" "), page.page));
                    }
                }
            }
        }

        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

/// Trimmed, non-empty paragraphs of `text` in their original order.
pub fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

/// Convenience wrapper matching the pipeline contract `chunk(pages, maxWords)`.
pub fn chunk_pages(pages: &[Page], max_words: usize) -> Result<Vec<Chunk>, ChunkError> {
    Ok(TextChunker::new(max_words)?.chunk(pages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChunkType;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_zero_max_words_is_rejected() {
        assert_eq!(
            TextChunker::new(0).unwrap_err(),
            ChunkError::InvalidMaxWords(0)
        );
        assert!(chunk_pages(&[], 0).is_err());
    }

    #[test]
    fn test_short_paragraphs_are_kept_whole() {
        let pages = vec![Page::new(1, "First  paragraph\nstill first.\n\n\n  Second one.  \n")];
        let chunks = TextChunker::new(10).unwrap().chunk(&pages);

        assert_eq!(chunks.len(), 2);
        // Short paragraphs keep their original inner whitespace.
        assert_eq!(chunks[0].text, "First  paragraph\nstill first.");
        assert_eq!(chunks[1].text, "Second one.");
        assert!(chunks.iter().all(|c| c.page == 1));
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkType::Paragraph));
    }

    #[test]
    fn test_whitespace_only_blank_lines_split_paragraphs() {
        let pages = vec![Page::new(1, "alpha\n \t \nbeta")];
        let chunks = TextChunker::default().chunk(&pages);
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_long_paragraph_windows() {
        for (count, max) in [(7usize, 3usize), (9, 3), (1001, 300), (4, 1)] {
            let pages = vec![Page::new(2, words(count))];
            let chunks = TextChunker::new(max).unwrap().chunk(&pages);

            assert_eq!(chunks.len(), count.div_ceil(max), "count={} max={}", count, max);
            for chunk in &chunks[..chunks.len() - 1] {
                assert_eq!(chunk.text.split_whitespace().count(), max);
            }
            let last = chunks.last().unwrap().text.split_whitespace().count();
            assert!(last >= 1 && last <= max);
            assert!(chunks.iter().all(|c| c.page == 2));
        }
    }

    #[test]
    fn test_windows_rejoin_with_single_spaces() {
        let pages = vec![Page::new(1, "a   b\tc\nd e")];
        let chunks = TextChunker::new(2).unwrap().chunk(&pages);
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a b", "c d", "e"]);
    }

    #[test]
    fn test_no_words_dropped_or_duplicated() {
        let text = format!("{}\n\n{}\n\nshort tail", words(25), words(4));
        let pages = vec![Page::new(1, text.clone())];
        let chunks = TextChunker::new(6).unwrap().chunk(&pages);

        let rejoined: Vec<String> = chunks
            .iter()
            .flat_map(|c| c.text.split_whitespace().map(str::to_string))
            .collect();
        let original: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn test_order_is_page_then_paragraph_then_window() {
        let pages = vec![
            Page::new(1, "p1a\n\np1b one two three"),
            Page::new(2, "p2a"),
        ];
        let chunks = TextChunker::new(2).unwrap().chunk(&pages);
        let seen: Vec<(u32, &str)> = chunks.iter().map(|c| (c.page, c.text.as_str())).collect();
        assert_eq!(
            seen,
            vec![(1, "p1a"), (1, "p1b one"), (1, "two three"), (2, "p2a")]
        );
    }

    #[test]
    fn test_empty_pages_produce_nothing() {
        let pages = vec![Page::new(1, ""), Page::new(2, "  \n\n \n")];
        assert!(TextChunker::default().chunk(&pages).is_empty());
    }
}
