//! Chunk-by-chunk detection pass and its audit log
//!
//! Every chunk is sent to the oracle independently. Each call produces its own
//! `ChunkReport` (spans or a typed failure, plus log entries); reports are
//! gathered in full and only then resolved, so completion order never matters.

use crate::chunker::{chunk_text, Chunk};
use crate::config::RedactionConfig;
use crate::error::{ChunkFailure, Result};
use crate::normalizer::{try_normalize, ChunkBounds};
use crate::oracle::{EntityOracle, OracleRequest};
use crate::resolver::resolve;
use crate::span::{char_len, truncate_chars, ResolvedSpans, TextSpan};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info};

/// Which side of an oracle interaction an entry records
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Request,
    Response,
    Error,
}

/// One audit record of an oracle interaction
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DetectionLogEntry {
    pub direction: Direction,
    /// Global character offset of the chunk involved
    pub offset: usize,
    /// Chunk length in characters, for requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Payload snippet, bounded by the log's snippet length
    pub body: String,
}

impl DetectionLogEntry {
    pub fn request(offset: usize, length: usize, body: String) -> Self {
        Self {
            direction: Direction::Request,
            offset,
            length: Some(length),
            status: None,
            error: None,
            body,
        }
    }

    pub fn response(offset: usize, body: String) -> Self {
        Self {
            direction: Direction::Response,
            offset,
            length: None,
            status: None,
            error: None,
            body,
        }
    }

    pub fn failure(offset: usize, failure: &ChunkFailure) -> Self {
        let (status, body) = match failure {
            ChunkFailure::OracleCall(err) => (err.status(), err.body().to_string()),
            ChunkFailure::MalformedResponse { snippet } => (None, snippet.clone()),
        };
        Self {
            direction: Direction::Error,
            offset,
            length: None,
            status,
            error: Some(failure.to_string()),
            body,
        }
    }
}

/// Append-only collection of log entries with bounded payload snippets
#[derive(Debug, Clone)]
pub struct DetectionLog {
    snippet_chars: usize,
    entries: Vec<DetectionLogEntry>,
}

impl DetectionLog {
    pub fn new(snippet_chars: usize) -> Self {
        Self {
            snippet_chars,
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, mut entry: DetectionLogEntry) {
        entry.body = truncate_chars(&entry.body, self.snippet_chars);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[DetectionLogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<DetectionLogEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What one chunk contributed to the pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Spans(Vec<TextSpan>),
    Failed(ChunkFailure),
}

/// Result of processing a single chunk
#[derive(Debug, Clone)]
pub struct ChunkReport {
    pub offset: usize,
    pub outcome: ChunkOutcome,
    pub log: DetectionLog,
}

impl ChunkReport {
    pub fn span_count(&self) -> usize {
        match &self.outcome {
            ChunkOutcome::Spans(spans) => spans.len(),
            ChunkOutcome::Failed(_) => 0,
        }
    }
}

/// Everything a detection pass produced
#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    /// Every normalized span from every chunk, in canonical order
    pub entities: Vec<TextSpan>,
    /// Non-overlapping spans used for rendering
    pub resolved: ResolvedSpans,
    /// Oracle interactions, grouped per chunk in chunk order
    pub log: Vec<DetectionLogEntry>,
    pub chunks_processed: usize,
    pub chunks_failed: usize,
}

/// Run detection over `text` and resolve the result
pub async fn detect_entities<O: EntityOracle>(
    text: &str,
    config: &RedactionConfig,
    oracle: &O,
) -> Result<DetectionReport> {
    detect_entities_with_progress(text, config, oracle, |_| {}).await
}

/// Like `detect_entities`, calling `on_chunk` as each chunk completes
pub async fn detect_entities_with_progress<O, F>(
    text: &str,
    config: &RedactionConfig,
    oracle: &O,
    mut on_chunk: F,
) -> Result<DetectionReport>
where
    O: EntityOracle,
    F: FnMut(&ChunkReport),
{
    config.validate()?;

    if text.trim().is_empty() {
        debug!("Text is blank, skipping oracle calls");
        return Ok(DetectionReport::default());
    }

    let chunks = chunk_text(text, config.chunk_size)?;
    let started = Instant::now();
    info!(
        chunks = chunks.len(),
        concurrency = config.max_concurrent_calls,
        "Starting detection pass"
    );

    let mut reports: Vec<ChunkReport> = stream::iter(chunks.iter())
        .map(|chunk| process_chunk(chunk, config, oracle))
        .buffer_unordered(config.max_concurrent_calls)
        .inspect(|report| on_chunk(report))
        .collect()
        .await;

    // WHY: buffer_unordered yields in completion order; chunk order keeps the
    // merged entities and log identical across runs
    reports.sort_by_key(|report| report.offset);

    let mut report = DetectionReport {
        chunks_processed: reports.len(),
        ..DetectionReport::default()
    };
    for chunk_report in reports {
        match chunk_report.outcome {
            ChunkOutcome::Spans(spans) => report.entities.extend(spans),
            ChunkOutcome::Failed(_) => report.chunks_failed += 1,
        }
        report.log.extend(chunk_report.log.into_entries());
    }

    report.resolved = resolve(report.entities.clone(), char_len(text));
    report.entities.sort_by_key(TextSpan::sort_key);

    info!(
        entities = report.entities.len(),
        resolved = report.resolved.len(),
        failed_chunks = report.chunks_failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Detection pass completed"
    );
    Ok(report)
}

async fn process_chunk<O: EntityOracle>(
    chunk: &Chunk,
    config: &RedactionConfig,
    oracle: &O,
) -> ChunkReport {
    let mut log = DetectionLog::new(config.log_snippet_chars);
    let bounds = ChunkBounds::from(chunk);
    let request = OracleRequest::for_chunk(chunk);

    log.record(DetectionLogEntry::request(
        chunk.global_offset,
        chunk.char_len,
        request.body.to_string(),
    ));

    let outcome = match oracle.detect(&request).await {
        Ok(response) => {
            log.record(DetectionLogEntry::response(chunk.global_offset, response.raw_text()));
            match try_normalize(&response, bounds) {
                Ok(spans) => ChunkOutcome::Spans(spans),
                Err(failure) => {
                    let failure = failure.bounded(config.log_snippet_chars);
                    log.record(DetectionLogEntry::failure(chunk.global_offset, &failure));
                    ChunkOutcome::Failed(failure)
                }
            }
        }
        Err(err) => {
            error!(offset = chunk.global_offset, "Oracle request failed: {}", err);
            let failure = ChunkFailure::OracleCall(err).bounded(config.log_snippet_chars);
            log.record(DetectionLogEntry::failure(chunk.global_offset, &failure));
            ChunkOutcome::Failed(failure)
        }
    };

    ChunkReport {
        offset: chunk.global_offset,
        outcome,
        log,
    }
}
