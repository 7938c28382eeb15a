use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` range over the global text, tagged with an entity type
///
/// Offsets count characters, not bytes. `text` is whatever the oracle claimed
/// the span covers; renderers read `[start, end)` from the source instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSpan {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub fn new(
        entity_type: impl Into<String>,
        text: impl Into<String>,
        start: usize,
        end: usize,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            text: text.into(),
            start,
            end,
        }
    }

    /// Number of characters covered in the source text
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Canonical ordering key shared by the resolver and the audit output
    pub fn sort_key(&self) -> (usize, usize) {
        (self.start, self.end)
    }
}

/// Ordered, non-overlapping spans that all lie within one text
///
/// Only the resolver builds these, so every holder can rely on
/// `spans[i].end <= spans[i + 1].start` and `end <= text_len`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedSpans {
    spans: Vec<TextSpan>,
}

impl ResolvedSpans {
    pub(crate) fn from_sorted(spans: Vec<TextSpan>) -> Self {
        debug_assert!(spans.windows(2).all(|w| w[0].end <= w[1].start));
        Self { spans }
    }

    pub fn as_slice(&self) -> &[TextSpan] {
        &self.spans
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TextSpan> {
        self.spans.iter()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn into_vec(self) -> Vec<TextSpan> {
        self.spans
    }
}

impl<'a> IntoIterator for &'a ResolvedSpans {
    type Item = &'a TextSpan;
    type IntoIter = std::slice::Iter<'a, TextSpan>;

    fn into_iter(self) -> Self::IntoIter {
        self.spans.iter()
    }
}

/// Character-offset to byte-offset lookup for one text
///
/// Holds one entry per character plus a final entry for `text.len()`, so
/// `byte_offset(char_len())` is valid and slices never split a character.
#[derive(Debug, Clone)]
pub struct CharIndex {
    byte_offsets: Vec<usize>,
}

impl CharIndex {
    pub fn new(text: &str) -> Self {
        let mut byte_offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        byte_offsets.push(text.len());
        Self { byte_offsets }
    }

    /// Number of characters in the indexed text
    pub fn char_len(&self) -> usize {
        self.byte_offsets.len() - 1
    }

    /// Byte offset of a character position, clamped to the end of the text
    pub fn byte_offset(&self, char_pos: usize) -> usize {
        let last = self.byte_offsets.len() - 1;
        self.byte_offsets[char_pos.min(last)]
    }

    /// Slice `text[start..end)` by character positions
    pub fn slice<'t>(&self, text: &'t str, start: usize, end: usize) -> &'t str {
        let from = self.byte_offset(start);
        let to = self.byte_offset(end.max(start));
        &text[from..to]
    }
}

/// Character count, the unit every span offset is expressed in
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
