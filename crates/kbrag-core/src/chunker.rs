//! Overlapping fixed-size text splitter.
//!
//! Sizes are counted in `char`s. A chunk ends at the latest paragraph break,
//! line break or space found in the second half of its window, falling back to
//! a hard cut at `max_size`. Every chunk after the first starts with exactly the
//! last `overlap` characters of its predecessor, so dropping those prefixes and
//! concatenating gives back the input.

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_size: 800, overlap: 100 }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(s: &ChunkingSettings) -> Self {
        Self { max_size: s.max_size, overlap: s.overlap }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::InvalidConfig("chunk max_size must be positive".into()));
        }
        if self.overlap >= self.max_size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than max_size ({})",
                self.overlap, self.max_size
            )));
        }
        Ok(())
    }

    pub fn split(&self, text: &str) -> Result<Vec<String>> {
        split(text, self.max_size, self.overlap)
    }
}

pub fn split(text: &str, max_size: usize, overlap: usize) -> Result<Vec<String>> {
    ChunkingConfig { max_size, overlap }.validate()?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    // Boundaries are only searched past this offset so chunks never shrink below half a window.
    let min_advance = (overlap + 1).max(max_size / 2);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + max_size).min(total);
        if hard_end == total {
            chunks.push(chars[start..].iter().collect());
            break;
        }
        let lo = start + min_advance;
        let end = find_boundary(&chars, lo, hard_end).unwrap_or(hard_end);
        chunks.push(chars[start..end].iter().collect());
        start = end - overlap;
    }
    Ok(chunks)
}

/// Largest `end` in `lo..=hi` such that `chars[..end]` finishes on a separator,
/// trying paragraph breaks first, then line breaks, then spaces.
fn find_boundary(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    if lo > hi {
        return None;
    }
    let paragraph = |e: usize| e >= 2 && chars[e - 1] == '\n' && chars[e - 2] == '\n';
    let line = |e: usize| chars[e - 1] == '\n';
    let space = |e: usize| chars[e - 1] == ' ' || chars[e - 1] == '\t';

    let candidates: [&dyn Fn(usize) -> bool; 3] = [&paragraph, &line, &space];
    candidates
        .iter()
        .find_map(|is_break| (lo.max(1)..=hi).rev().find(|&e| is_break(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_paragraph_break_over_space() {
        let text = format!("{}\n\n{} tail words here", "a".repeat(30), "b".repeat(10));
        let chunks = split(&text, 50, 5).unwrap();
        assert!(chunks[0].ends_with("\n\n"), "first chunk: {:?}", chunks[0]);
    }

    #[test]
    fn hard_cut_without_separators() {
        let text = "x".repeat(25);
        let chunks = split(&text, 10, 2).unwrap();
        assert_eq!(chunks, vec!["x".repeat(10), "x".repeat(10), "x".repeat(9)]);
    }
}
