//! Boundary-aware sliding-window text chunker.
//!
//! Splits cleaned document text into overlapping chunks of at most
//! `chunk_size` characters. Each window is cut at the last sentence end
//! (`.`) when it falls after 60% of the window, otherwise at the last space
//! when it falls after 80%, otherwise at the raw window edge. The next
//! window starts `overlap` characters before the cut, moved back to just
//! after the nearest space (or onto the nearest period). When no boundary
//! lies between the two starts, the window advances by one character.
//!
//! Offsets are counted in characters, not bytes. Output is lazy: [`split_text`]
//! returns an iterator that can be re-created at will and always yields
//! the same sequence for the same input.

use crate::models::DocumentChunk;

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive windows in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Chunks whose trimmed length is not above this are discarded.
pub const DEFAULT_MIN_CHUNK_LENGTH: usize = 50;

/// Only cut at a sentence end found past this fraction of the window.
const SENTENCE_CUT_RATIO: f64 = 0.6;
/// Only cut at a space found past this fraction of the window.
const WORD_CUT_RATIO: f64 = 0.8;
/// Overlap used when the configured overlap would not let windows advance.
const FALLBACK_OVERLAP_RATIO: f64 = 0.3;

/// Chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_length: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            min_length: DEFAULT_MIN_CHUNK_LENGTH,
        }
    }
}

impl ChunkParams {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            ..Default::default()
        }
    }

    /// Overlap actually applied: clamped to 30% of the chunk size when it
    /// is not smaller than the chunk size.
    pub fn effective_overlap(&self) -> usize {
        if self.overlap >= self.chunk_size {
            (self.chunk_size as f64 * FALLBACK_OVERLAP_RATIO) as usize
        } else {
            self.overlap
        }
    }
}

/// A half-open `[start, end)` character range of the source text, before trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

/// Iterator over the raw windows of a text, including ones later discarded
/// for being too short.
#[derive(Debug, Clone)]
pub struct Windows {
    chars: Vec<char>,
    chunk_size: usize,
    overlap: usize,
    start: usize,
    done: bool,
}

impl Windows {
    pub fn new(text: &str, params: &ChunkParams) -> Self {
        Self {
            chars: text.chars().collect(),
            chunk_size: params.chunk_size,
            overlap: params.effective_overlap(),
            start: 0,
            done: false,
        }
    }

    /// Pick the end of the window beginning at `start`.
    fn cut_point(&self, start: usize) -> usize {
        let len = self.chars.len();
        let end = (start + self.chunk_size).min(len);
        if end == len {
            return end;
        }

        let window = &self.chars[start..end];
        let width = window.len() as f64;

        if let Some(dot) = window.iter().rposition(|&c| c == '.') {
            if dot as f64 > width * SENTENCE_CUT_RATIO {
                return start + dot + 1;
            }
        }
        if let Some(space) = window.iter().rposition(|&c| c == ' ') {
            if space as f64 > width * WORD_CUT_RATIO {
                return start + space;
            }
        }
        end
    }

    /// Pick the start of the window following `[start, end)`.
    fn next_start(&self, start: usize, end: usize) -> usize {
        let mut next = end.saturating_sub(self.overlap);

        if next > start {
            while next > start && !matches!(self.chars[next], ' ' | '.') {
                next -= 1;
            }
            if self.chars[next] == ' ' {
                next += 1;
            }
        }

        // Always advance, even when the walk fell back to `start`.
        next.max(start + 1)
    }
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.done {
            return None;
        }

        let len = self.chars.len();
        if len <= self.chunk_size {
            self.done = true;
            return Some(Window { start: 0, end: len });
        }
        if self.start >= len {
            self.done = true;
            return None;
        }

        let start = self.start;
        let end = self.cut_point(start);
        if end >= len {
            self.done = true;
        } else {
            self.start = self.next_start(start, end);
        }

        Some(Window { start, end })
    }
}

/// Iterator over the trimmed chunk strings of a text.
#[derive(Debug, Clone)]
pub struct Chunks {
    windows: Windows,
    min_length: usize,
}

impl Iterator for Chunks {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let window = self.windows.next()?;
            let raw: String = self.windows.chars[window.start..window.end]
                .iter()
                .collect();
            let trimmed = raw.trim();
            if trimmed.chars().count() > self.min_length {
                return Some(trimmed.to_string());
            }
        }
    }
}

/// Split text into trimmed, overlapping chunks longer than `params.min_length`.
pub fn split_text(text: &str, params: &ChunkParams) -> Chunks {
    Chunks {
        windows: Windows::new(text, params),
        min_length: params.min_length,
    }
}

/// Split a document's cleaned text into [`DocumentChunk`]s with contiguous
/// indices starting at 0.
pub fn chunk_document(source: &str, text: &str, params: &ChunkParams) -> Vec<DocumentChunk> {
    split_text(text, params)
        .enumerate()
        .map(|(index, content)| DocumentChunk::new(source, index, content))
        .collect()
}
