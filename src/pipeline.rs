use crate::config::RedactionConfig;
use crate::detection::{detect_entities_with_progress, ChunkReport, DetectionReport};
use crate::error::Result;
use crate::oracle::EntityOracle;
use crate::render::{highlight_text, mask_text};
use tracing::info;

/// Output of one full redaction run
#[derive(Debug, Clone)]
pub struct RedactionOutcome {
    /// Plain text with every resolved span masked
    pub masked: String,
    /// HTML fragment with every resolved span highlighted
    pub highlighted: String,
    pub report: DetectionReport,
}

/// Detection, resolution and rendering behind one call
pub struct Redactor<O> {
    config: RedactionConfig,
    oracle: O,
}

impl<O: EntityOracle> Redactor<O> {
    /// Fails with a configuration error before any oracle is contacted
    pub fn new(config: &RedactionConfig, oracle: O) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            oracle,
        })
    }

    pub fn config(&self) -> &RedactionConfig {
        &self.config
    }

    pub async fn redact(&self, text: &str) -> Result<RedactionOutcome> {
        self.redact_with_progress(text, |_| {}).await
    }

    pub async fn redact_with_progress<F>(&self, text: &str, on_chunk: F) -> Result<RedactionOutcome>
    where
        F: FnMut(&ChunkReport),
    {
        let report =
            detect_entities_with_progress(text, &self.config, &self.oracle, on_chunk).await?;

        let masked = mask_text(text, &report.resolved, self.config.mask_style);
        let highlighted = highlight_text(text, &report.resolved);
        info!(
            masked_spans = report.resolved.len(),
            style = %self.config.mask_style,
            "Rendered masked and highlighted output"
        );

        Ok(RedactionOutcome {
            masked,
            highlighted,
            report,
        })
    }
}
