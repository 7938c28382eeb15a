// Persisted artifacts of a redaction run and where they are written

use crate::config::{MaskStyle, RedactionConfig};
use crate::detection::{DetectionLogEntry, DetectionReport};
use crate::document::DocumentText;
use crate::span::TextSpan;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Entity count for one page of the source document
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub page: u32,
    pub start_offset: usize,
    pub entity_count: usize,
}

/// Audit record for one redaction run, consumed by preview and storage
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub source: String,
    pub chunk_size: i64,
    pub mask_style: MaskStyle,
    /// Every span the oracle reported, after normalization
    pub entities: Vec<TextSpan>,
    /// The spans actually used for masking
    pub resolved: Vec<TextSpan>,
    pub logs: Vec<DetectionLogEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<PageSummary>,
}

impl AuditRecord {
    pub fn new(
        source: &Path,
        config: &RedactionConfig,
        document: &DocumentText,
        report: &DetectionReport,
    ) -> Self {
        Self {
            source: source.display().to_string(),
            chunk_size: config.chunk_size,
            mask_style: config.mask_style,
            entities: report.entities.clone(),
            resolved: report.resolved.as_slice().to_vec(),
            logs: report.log.clone(),
            pages: summarize_pages(document, &report.entities),
        }
    }

    /// Write the record as pretty JSON, creating parent directories
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_artifact(path, &content).await
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read audit record {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid audit record {}", path.display()))
    }
}

fn summarize_pages(document: &DocumentText, entities: &[TextSpan]) -> Vec<PageSummary> {
    let mut pages: Vec<PageSummary> = document
        .blocks
        .iter()
        .filter_map(|block| {
            block.page.map(|page| PageSummary {
                page,
                start_offset: block.start_offset,
                entity_count: 0,
            })
        })
        .collect();

    for entity in entities {
        if let Some(page) = document.page_at(entity.start) {
            if let Some(summary) = pages.iter_mut().find(|s| s.page == page) {
                summary.entity_count += 1;
            }
        }
    }
    pages
}

/// Write a text artifact, creating parent directories as needed
pub async fn write_artifact(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn sibling_path(source_path: &Path, suffix: &str) -> PathBuf {
    let mut path = source_path.to_path_buf();
    let file_stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string();
    path.set_file_name(format!("{file_stem}{suffix}"));
    path
}

/// `{stem}_masked.txt` next to the source
pub fn masked_output_path(source_path: &Path) -> PathBuf {
    sibling_path(source_path, "_masked.txt")
}

/// `{stem}_preview.html` next to the source
pub fn preview_output_path(source_path: &Path) -> PathBuf {
    sibling_path(source_path, "_preview.html")
}

/// `{stem}_audit.json` next to the source
pub fn audit_output_path(source_path: &Path) -> PathBuf {
    sibling_path(source_path, "_audit.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths() {
        let source = Path::new("/data/contract.v2.txt");
        assert_eq!(masked_output_path(source), PathBuf::from("/data/contract.v2_masked.txt"));
        assert_eq!(preview_output_path(source), PathBuf::from("/data/contract.v2_preview.html"));
        assert_eq!(audit_output_path(source), PathBuf::from("/data/contract.v2_audit.json"));
    }

    #[test]
    fn test_page_summary_counts_entities_by_start() {
        let document = DocumentText::from_plain_text("Alice\u{000C}Bob and Carol");
        let entities = vec![
            TextSpan::new("PERSON", "Alice", 0, 5),
            TextSpan::new("PERSON", "Bob", 6, 9),
            TextSpan::new("PERSON", "Carol", 14, 19),
        ];

        let pages = summarize_pages(&document, &entities);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].entity_count, 1);
        assert_eq!(pages[1].entity_count, 2);
        assert_eq!(pages[1].start_offset, 6);
    }

    #[test]
    fn test_page_summary_empty_without_pages() {
        let document = DocumentText::from_plain_text("no pages here");
        assert!(summarize_pages(&document, &[TextSpan::new("PERSON", "", 0, 2)]).is_empty());
    }
}
