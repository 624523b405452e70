//! Text splitters that cut documents into chunks before they are embedded.
//!
//! - [`Character`]: split on one separator pattern, then greedily
//!   recombine the fragments up to `chunk_size` characters.
//! - [`RecursiveCharacter`]: like [`Character`], retrying oversized chunks
//!   with progressively finer separators.
//! - [`Semantic`]: cut where the embeddings of consecutive sentences drift
//!   apart, then pack the segments like [`Character`].
//!
//! All lengths are counted in characters, not bytes.
//!
//! # Fragmenting
//!
//! Separators are regular expressions. A zero-length match at the start
//! of the remaining text never produces a field, and trailing empty fields
//! are dropped. With `include_separator`, each separator is appended to the
//! fragment before it, so the fragments concatenate back to the input.

pub mod character;
pub mod semantic;

pub use character::{Character, RecursiveCharacter};
pub use semantic::{Breakpoint, Semantic, SemanticOptions};

use regex::Regex;

use crate::error::StoreError;

/// Compile a separator pattern, reporting a bad pattern as a configuration
/// error.
pub(crate) fn compile(pattern: &str) -> Result<Regex, StoreError> {
    Regex::new(pattern)
        .map_err(|e| StoreError::Configuration(format!("invalid separator {pattern:?}: {e}")))
}

/// Split `text` on every match of `separator`.
pub(crate) fn fragment(text: &str, separator: &Regex, include_separator: bool) -> Vec<String> {
    let mut fields = Vec::new();
    let mut start = 0;
    for m in separator.find_iter(text) {
        if m.start() == m.end() && m.start() == start {
            continue;
        }
        let mut field = text[start..m.start()].to_string();
        if include_separator {
            field.push_str(m.as_str());
        }
        fields.push(field);
        start = m.end();
    }
    if start < text.len() {
        fields.push(text[start..].to_string());
    }
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// Greedy recombination of fragments.
///
/// A fragment joins the current chunk (followed by `combining`) while the
/// combined length stays strictly below `chunk_size`; otherwise the current
/// chunk is emitted and the fragment starts the next one. A fragment that
/// is itself too large becomes a chunk of its own.
pub(crate) fn combine<I>(fragments: I, combining: &str, chunk_size: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let combining_len = combining.chars().count();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for fragment in fragments {
        let len = fragment.chars().count();
        if current_len + len < chunk_size {
            current.push_str(&fragment);
            current.push_str(combining);
            current_len += len + combining_len;
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current = fragment;
            current_len = len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(pattern: &str) -> Regex {
        compile(pattern).unwrap()
    }

    #[test]
    fn test_fragment_drops_trailing_empty() {
        assert_eq!(fragment("a,b,,", &re(","), false), vec!["a", "b"]);
        assert_eq!(fragment(",a", &re(","), false), vec!["", "a"]);
    }

    #[test]
    fn test_fragment_empty_pattern_is_per_char() {
        assert_eq!(fragment("abc", &re(""), false), vec!["a", "b", "c"]);
        assert_eq!(fragment("héé", &re(""), false), vec!["h", "é", "é"]);
    }

    #[test]
    fn test_fragment_word_boundary() {
        assert_eq!(fragment("ab cd", &re(r"\b"), false), vec!["ab", " ", "cd"]);
        assert_eq!(fragment("abc", &re(r"\b"), false), vec!["abc"]);
    }

    #[test]
    fn test_fragment_include_separator() {
        let text = "one\n\ntwo\n\n\nthree";
        let fields = fragment(text, &re(r"(?:\r?\n){2,}"), true);
        assert_eq!(fields, vec!["one\n\n", "two\n\n\n", "three"]);
        assert_eq!(fields.concat(), text);
    }

    #[test]
    fn test_fragment_empty_text() {
        assert!(fragment("", &re(","), false).is_empty());
    }

    #[test]
    fn test_combine_oversized_fragment_kept_whole() {
        let chunks = combine(vec!["x".repeat(30), "y".into()], "", 10);
        assert_eq!(chunks, vec!["x".repeat(30), "y".to_string()]);
    }

    #[test]
    fn test_compile_rejects_bad_pattern() {
        let err = compile("(").unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }
}
