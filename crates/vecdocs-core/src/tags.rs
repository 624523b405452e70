//! Sorted, deduplicated tag sets.
//!
//! A [`Tag`] is a label plus an optional provenance source (a file path or
//! URL). Tags compare by label only, so a [`Tags`] set never holds two tags
//! with the same label; the first source seen for a label is the one kept.
//!
//! ```rust
//! use vecdocs_core::tags::Tags;
//!
//! let mut tags = Tags::new(["foo", "#bar"], None);
//! tags.add("foo", Some("other.md"));
//! assert_eq!(tags.to_vec(), vec!["bar", "foo"]);
//! assert_eq!(tags.to_string(), "#bar #foo");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

/// A single label with optional provenance.
#[derive(Debug, Clone)]
pub struct Tag {
    value: String,
    source: Option<String>,
}

impl Tag {
    /// Create a tag, stripping any leading `#` characters from `value`.
    pub fn new(value: impl AsRef<str>, source: Option<&str>) -> Self {
        Self {
            value: value.as_ref().trim_start_matches('#').to_string(),
            source: source.map(str::to_string),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Render as `#value`, wrapped in a terminal hyperlink to the source
    /// when `link` is set and a source is known.
    pub fn render(&self, link: bool) -> String {
        let tag_string = format!("#{}", self.value);
        match (link, self.source.as_deref()) {
            (true, Some(source)) => hyperlink(&source_url(source), &tag_string),
            _ => tag_string,
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Tag {}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// Turn a tag source into a URL: web and file URLs pass through, anything
/// else is treated as a local path and made absolute.
fn source_url(source: &str) -> String {
    if source.starts_with("http://")
        || source.starts_with("https://")
        || source.starts_with("file://")
    {
        return source.to_string();
    }
    let path = std::path::absolute(Path::new(source)).unwrap_or_else(|_| source.into());
    format!("file://{}", path.display())
}

/// OSC 8 terminal hyperlink.
fn hyperlink(url: &str, text: &str) -> String {
    format!("\x1b]8;;{url}\x1b\\{text}\x1b]8;;\x1b\\")
}

/// An ordered set of [`Tag`]s, unique by label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    set: Vec<Tag>,
}

impl Tags {
    /// Build a set from labels, all sharing the same `source`.
    pub fn new<I, S>(values: I, source: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tags = Self::default();
        tags.merge(values, source);
        tags
    }

    /// Insert a label in sorted position. Adding a label that is already
    /// present is a no-op.
    pub fn add(&mut self, value: impl AsRef<str>, source: Option<&str>) -> &mut Self {
        self.add_tag(Tag::new(value, source))
    }

    pub fn add_tag(&mut self, tag: Tag) -> &mut Self {
        if let Err(index) = self.set.binary_search(&tag) {
            self.set.insert(index, tag);
        }
        self
    }

    /// Add every label in `values`.
    pub fn merge<I, S>(&mut self, values: I, source: Option<&str>) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for value in values {
            self.add(value, source);
        }
        self
    }

    /// The sorted labels.
    pub fn to_vec(&self) -> Vec<String> {
        self.set.iter().map(|t| t.value.clone()).collect()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.set
            .binary_search_by(|t| t.value.as_str().cmp(value))
            .is_ok()
    }

    /// True when at least one of `values` is in the set.
    pub fn intersects<S: AsRef<str>>(&self, values: &[S]) -> bool {
        values.iter().any(|v| self.contains(v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn clear(&mut self) {
        self.set.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.set.iter()
    }

    /// Space-joined `#tag` tokens; see [`Tag::render`].
    pub fn render(&self, link: bool) -> String {
        self.set
            .iter()
            .map(|t| t.render(link))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.set.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_and_sorted() {
        let tags = Tags::new(["foo", "bar", "foo"], None);
        assert_eq!(tags.to_vec(), vec!["bar", "foo"]);
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_add_and_merge() {
        let mut tags = Tags::new(["foo"], None);
        tags.add("bar", None);
        assert_eq!(tags.to_vec(), vec!["bar", "foo"]);
        tags.merge(["baz", "baz2"], None);
        assert_eq!(tags.to_vec(), vec!["bar", "baz", "baz2", "foo"]);
    }

    #[test]
    fn test_first_source_wins() {
        let mut tags = Tags::new(["foo"], Some("a.md"));
        tags.add("foo", Some("b.md"));
        let tag = tags.iter().next().unwrap();
        assert_eq!(tag.source(), Some("a.md"));
    }

    #[test]
    fn test_leading_hashes_stripped() {
        let tags = Tags::new(["##foo", "#bar"], None);
        assert_eq!(tags.to_vec(), vec!["bar", "foo"]);
    }

    #[test]
    fn test_render_plain() {
        assert_eq!(Tags::new(["foo", "bar"], None).to_string(), "#bar #foo");
        assert_eq!(Tags::default().to_string(), "");
    }

    #[test]
    fn test_render_link_url_source() {
        let tags = Tags::new(["doc"], Some("https://example.com/doc.html"));
        assert_eq!(
            tags.render(true),
            "\x1b]8;;https://example.com/doc.html\x1b\\#doc\x1b]8;;\x1b\\"
        );
        assert_eq!(tags.render(false), "#doc");
    }

    #[test]
    fn test_render_link_file_source_is_absolute() {
        let tags = Tags::new(["notes"], Some("notes.md"));
        let rendered = tags.render(true);
        assert!(rendered.starts_with("\x1b]8;;file:///"));
        assert!(rendered.contains("notes.md\x1b\\#notes"));
    }

    #[test]
    fn test_intersects() {
        let tags = Tags::new(["a", "b"], None);
        assert!(tags.intersects(&["x", "b"]));
        assert!(!tags.intersects(&["x", "y"]));
        assert!(!tags.intersects::<&str>(&[]));
    }
}
