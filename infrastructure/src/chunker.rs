//! Splits page text into overlapping windows for embedding.
//!
//! Window sizes are measured in characters, never bytes, so multi-byte text
//! is never cut inside a code point. Every window is an exact substring of
//! the input.

use anyhow::bail;
use domain::models::{Chunk, Document};
use shared::types::Result;
use std::collections::VecDeque;
use std::ops::Range;

/// Preferred split points, strongest first: paragraph, line, sentence, word,
/// and finally any character.
pub const SEPARATORS: [&str; 5] = ["\n\n", "\n", ".", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitStrategy {
    /// Split on [`SEPARATORS`] and merge pieces back up to the window size.
    #[default]
    Recursive,
    /// Plain sliding window; starts advance by `chunk_size - chunk_overlap`.
    Fixed,
}

/// A window of text and the character offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    strategy: SplitStrategy,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize, strategy: SplitStrategy) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk size must be at least 1");
        }
        if chunk_overlap >= chunk_size {
            bail!("chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})");
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            strategy,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into windows. Whitespace-only windows are kept here so the
    /// result always covers the whole input.
    pub fn split_text(&self, text: &str) -> Vec<TextSpan> {
        let ranges = match self.strategy {
            SplitStrategy::Fixed => self.split_fixed(text),
            SplitStrategy::Recursive => self.split_recursive(text),
        };
        ranges
            .into_iter()
            .map(|range| TextSpan {
                start: text[..range.start].chars().count(),
                text: text[range].to_string(),
            })
            .collect()
    }

    /// Chunk every document, numbering chunks in input order.
    ///
    /// Windows holding nothing but whitespace are dropped.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for document in documents {
            for span in self.split_text(&document.text) {
                if span.text.trim().is_empty() {
                    continue;
                }
                let source = document.source.to_string_lossy();
                let page = document.page.map(|p| p.to_string()).unwrap_or_default();
                let id = format!(
                    "{:x}",
                    md5::compute(format!("{source}:{page}:{}", span.start).as_bytes())
                );
                chunks.push(Chunk {
                    id,
                    text: span.text,
                    source: document.source.clone(),
                    page: document.page,
                    position: chunks.len(),
                    start: span.start,
                });
            }
        }
        chunks
    }

    fn split_fixed(&self, text: &str) -> Vec<Range<usize>> {
        let bounds = char_bounds(text);
        let char_count = bounds.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut ranges = Vec::new();
        let mut start = 0;
        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            ranges.push(bounds[start]..bounds[end]);
            if end == char_count {
                break;
            }
            start += step;
        }
        ranges
    }

    fn split_recursive(&self, text: &str) -> Vec<Range<usize>> {
        let mut pieces = Vec::new();
        self.collect_pieces(text, 0..text.len(), &SEPARATORS, &mut pieces);
        self.merge_pieces(text, &pieces)
    }

    /// Break `range` into contiguous pieces no longer than the window size,
    /// using the first separator that occurs in it and recursing with the
    /// weaker ones for pieces that are still too long.
    fn collect_pieces(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[&str],
        out: &mut Vec<Range<usize>>,
    ) {
        if range.is_empty() {
            return;
        }
        let segment = &text[range.clone()];
        if segment.chars().count() <= self.chunk_size {
            out.push(range);
            return;
        }

        let found = separators
            .iter()
            .position(|sep| !sep.is_empty() && segment.contains(sep));
        let Some(idx) = found else {
            self.hard_split(text, range, out);
            return;
        };
        let separator = separators[idx];
        let weaker = &separators[idx + 1..];

        let mut piece_start = range.start;
        for (pos, _) in segment.match_indices(separator) {
            // The separator stays with the text before it.
            let piece_end = range.start + pos + separator.len();
            self.collect_pieces(text, piece_start..piece_end, weaker, out);
            piece_start = piece_end;
        }
        self.collect_pieces(text, piece_start..range.end, weaker, out);
    }

    fn hard_split(&self, text: &str, range: Range<usize>, out: &mut Vec<Range<usize>>) {
        let offset = range.start;
        let bounds = char_bounds(&text[range]);
        let char_count = bounds.len() - 1;
        let mut start = 0;
        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            out.push(offset + bounds[start]..offset + bounds[end]);
            start = end;
        }
    }

    /// Greedily join adjacent pieces into windows, carrying up to
    /// `chunk_overlap` characters of trailing pieces into the next window.
    fn merge_pieces(&self, text: &str, pieces: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut windows = Vec::new();
        let mut current: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = text[piece.clone()].chars().count();
            if total + len > self.chunk_size {
                if let (Some(first), Some(last)) = (current.front(), current.back()) {
                    windows.push(first.0.start..last.0.end);
                }
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match current.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            current.push_back((piece.clone(), len));
            total += len;
        }

        if let (Some(first), Some(last)) = (current.front(), current.back()) {
            windows.push(first.0.start..last.0.end);
        }
        windows
    }
}

/// Byte offset of every char boundary, including the end of the string.
fn char_bounds(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}
