//! Separator-based splitters.
//!
//! # Example
//!
//! ```rust
//! use vecdocs_core::splitter::Character;
//!
//! let splitter = Character::new().unwrap().chunk_size(23).combining_string("");
//! let text = vec!["A".repeat(10); 10].join("\n\n");
//! let chunks = splitter.split(&text);
//! assert_eq!(chunks.len(), 5);
//! assert_eq!(chunks.concat(), "A".repeat(100));
//! ```

use anyhow::Result;
use regex::Regex;

use crate::error::StoreError;

use super::{combine, compile, fragment};

const DEFAULT_CHUNK_SIZE: usize = 4096;
const DEFAULT_COMBINING_STRING: &str = "\n\n";

/// Splits on a single separator and recombines greedily.
#[derive(Debug, Clone)]
pub struct Character {
    separator: Regex,
    include_separator: bool,
    combining_string: String,
    chunk_size: usize,
}

impl Character {
    /// Paragraph breaks: two or more line endings.
    pub const DEFAULT_SEPARATOR: &'static str = r"(?:\r?\n){2,}";

    pub fn new() -> Result<Self> {
        Self::with_separator(Self::DEFAULT_SEPARATOR)
    }

    pub fn with_separator(pattern: &str) -> Result<Self> {
        Ok(Self::from_regex(compile(pattern)?))
    }

    pub fn from_regex(separator: Regex) -> Self {
        Self {
            separator,
            include_separator: false,
            combining_string: DEFAULT_COMBINING_STRING.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Keep separators attached to the end of each fragment.
    pub fn include_separator(mut self, include: bool) -> Self {
        self.include_separator = include;
        self
    }

    /// String appended after each fragment added to a chunk.
    pub fn combining_string(mut self, combining: impl Into<String>) -> Self {
        self.combining_string = combining.into();
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        combine(
            fragment(text, &self.separator, self.include_separator),
            &self.combining_string,
            self.chunk_size,
        )
    }
}

/// Splits with a list of separators, coarse to fine.
///
/// Chunks still longer than `chunk_size` after one separator are split
/// again with the remaining ones. Recursion depth is bounded by the number
/// of separators; with the default list the last separator matches between
/// every pair of characters.
#[derive(Debug, Clone)]
pub struct RecursiveCharacter {
    separators: Vec<Regex>,
    include_separator: bool,
    combining_string: String,
    chunk_size: usize,
}

impl RecursiveCharacter {
    /// Paragraph break, line break, word boundary, between any two
    /// characters.
    pub const DEFAULT_SEPARATORS: [&'static str; 4] = [r"(?:\r?\n){2,}", r"\r?\n", r"\b", ""];

    pub fn new() -> Result<Self> {
        Self::with_separators(&Self::DEFAULT_SEPARATORS)
    }

    pub fn with_separators<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        if patterns.is_empty() {
            return Err(StoreError::Configuration(
                "non-empty list of separators required".to_string(),
            )
            .into());
        }
        let separators = patterns
            .iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            separators,
            include_separator: false,
            combining_string: DEFAULT_COMBINING_STRING.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn include_separator(mut self, include: bool) -> Self {
        self.include_separator = include;
        self
    }

    pub fn combining_string(mut self, combining: impl Into<String>) -> Self {
        self.combining_string = combining.into();
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[Regex]) -> Vec<String> {
        let Some((separator, rest)) = separators.split_first() else {
            return vec![text.to_string()];
        };
        let chunks = combine(
            fragment(text, separator, self.include_separator),
            &self.combining_string,
            self.chunk_size,
        );
        if chunks.is_empty() {
            return vec![text.to_string()];
        }
        chunks
            .into_iter()
            .flat_map(|chunk| {
                if chunk.chars().count() > self.chunk_size {
                    self.split_with(&chunk, rest)
                } else {
                    vec![chunk]
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(sep: &str) -> String {
        vec!["A".repeat(10); 10].join(sep)
    }

    fn splitter() -> Character {
        Character::new().unwrap().chunk_size(23).combining_string("")
    }

    #[test]
    fn test_character_split() {
        let chunks = splitter().split(&paragraphs("\n\n"));
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks.concat(), "A".repeat(100));
    }

    #[test]
    fn test_character_combining_string() {
        let splitter = Character::new().unwrap().chunk_size(25).combining_string("X");
        let chunks = splitter.split(&paragraphs("\n\n"));
        assert_eq!(chunks.len(), 5);
        assert_eq!(
            chunks.join("B"),
            "AAAAAAAAAAXAAAAAAAAAAXBAAAAAAAAAAAAAAAAAAAAXBAAAAAAAAAAAAAAAAAAAAXB\
             AAAAAAAAAAAAAAAAAAAAXBAAAAAAAAAAAAAAAAAAAAX"
        );
    }

    #[test]
    fn test_character_include_separator() {
        let splitter = Character::new()
            .unwrap()
            .chunk_size(25)
            .include_separator(true)
            .combining_string("");
        let text = paragraphs("\n\n");
        let chunks = splitter.split(&text);
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_character_cannot_split() {
        let text = paragraphs("\n");
        let chunks = splitter().split(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks.concat().matches('A').count(), 100);

        let chunks = splitter().split(&"A".repeat(25));
        assert_eq!(chunks, vec!["A".repeat(25)]);
    }

    #[test]
    fn test_character_sentences() {
        let splitter = Character::with_separator(r"[.!?]\s*(?:\b|\z)")
            .unwrap()
            .chunk_size(2);
        let chunks = splitter.split("foo.foo. bar!bar! baz?baz? quux.\nquux.");
        assert_eq!(
            chunks,
            vec!["foo", "foo", "bar", "bar", "baz", "baz", "quux", "quux"]
        );
    }

    #[test]
    fn test_character_counts_chars_not_bytes() {
        let splitter = Character::with_separator(" ")
            .unwrap()
            .chunk_size(6)
            .combining_string("");
        assert_eq!(splitter.split("éé éé éé"), vec!["éééé", "éé"]);
    }

    fn recursive() -> RecursiveCharacter {
        RecursiveCharacter::new()
            .unwrap()
            .chunk_size(23)
            .combining_string("")
    }

    #[test]
    fn test_recursive_split() {
        let chunks = recursive().split(&paragraphs("\n\n"));
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks.concat(), "A".repeat(100));
    }

    #[test]
    fn test_recursive_cannot_split() {
        let separators = &RecursiveCharacter::DEFAULT_SEPARATORS[..3];
        let splitter = RecursiveCharacter::with_separators(separators)
            .unwrap()
            .chunk_size(23)
            .include_separator(true);
        let chunks = splitter.split(&"A".repeat(25));
        assert_eq!(chunks, vec!["A".repeat(25)]);
    }

    #[test]
    fn test_recursive_include_separator() {
        let splitter = RecursiveCharacter::new()
            .unwrap()
            .chunk_size(25)
            .include_separator(true)
            .combining_string("");
        for sep in ["\n\n", "\n"] {
            let text = paragraphs(sep);
            let chunks = splitter.split(&text);
            assert_eq!(chunks.len(), 5);
            assert_eq!(chunks.concat(), text);
        }
    }

    #[test]
    fn test_recursive_single_newline() {
        let chunks = recursive().split(&paragraphs("\n"));
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks.concat(), "A".repeat(100));
    }

    #[test]
    fn test_recursive_falls_through_to_characters() {
        let chunks = recursive().split(&"A".repeat(50));
        assert!(chunks.iter().all(|c| c.chars().count() <= 23));
        assert_eq!(chunks.concat(), "A".repeat(50));
    }

    #[test]
    fn test_recursive_requires_separators() {
        let err = RecursiveCharacter::with_separators::<&str>(&[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Configuration(_))
        ));
    }
}
