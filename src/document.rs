use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Page separator emitted by most PDF-to-text extractors
pub const PAGE_SEPARATOR: char = '\u{000C}';

/// A contiguous piece of extracted text and where it starts in the full text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    /// 1-based page number, when the source format has pages
    pub page: Option<u32>,
    pub text: String,
    /// Character offset of `text` in the full document text
    pub start_offset: usize,
}

/// Extracted document text plus optional page boundaries
///
/// Page data is only used for audit output; redaction works on `full_text`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentText {
    pub blocks: Vec<TextBlock>,
    pub full_text: String,
}

impl DocumentText {
    pub fn from_blocks(blocks: Vec<TextBlock>) -> Self {
        let full_text = blocks.iter().map(|b| b.text.as_str()).collect();
        Self { blocks, full_text }
    }

    /// Split plain text into pages at form feeds, keeping each separator
    /// with the page it ends so `full_text` is unchanged
    pub fn from_plain_text(text: &str) -> Self {
        if !text.contains(PAGE_SEPARATOR) {
            let blocks = if text.is_empty() {
                Vec::new()
            } else {
                vec![TextBlock {
                    page: None,
                    text: text.to_string(),
                    start_offset: 0,
                }]
            };
            return Self {
                blocks,
                full_text: text.to_string(),
            };
        }

        let mut blocks = Vec::new();
        let mut start_offset = 0;
        // WHY: split_inclusive keeps each separator, so blocks concatenate back
        // to the exact input and page offsets match span offsets
        for (page, piece) in (1u32..).zip(text.split_inclusive(PAGE_SEPARATOR)) {
            let chars = piece.chars().count();
            blocks.push(TextBlock {
                page: Some(page),
                text: piece.to_string(),
                start_offset,
            });
            start_offset += chars;
        }
        Self::from_blocks(blocks)
    }

    /// Page containing character `offset`, if the document has pages
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        let index = self.blocks.partition_point(|b| b.start_offset <= offset);
        self.blocks.get(index.checked_sub(1)?)?.page
    }

    pub fn page_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.page.is_some()).count()
    }
}

/// Read a UTF-8 text file into a `DocumentText`
pub async fn read_document<P: AsRef<Path>>(path: P) -> Result<DocumentText> {
    let path = path.as_ref();
    let started = Instant::now();
    debug!("Reading document: {}", path.display());

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to open file {}", path.display()))?;
    let text = String::from_utf8(bytes)
        .with_context(|| format!("UTF-8 decoding error in {}", path.display()))?;

    let document = DocumentText::from_plain_text(&text);
    info!(
        path = %path.display(),
        bytes = text.len(),
        pages = document.page_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Read document"
    );
    Ok(document)
}
