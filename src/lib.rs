pub mod audit;
pub mod chunker;
pub mod config;
pub mod detection;
pub mod document;
pub mod error;
pub mod normalizer;
pub mod oracle;
pub mod pipeline;
pub mod render;
pub mod resolver;
pub mod span;

// Re-export main types for convenient access
pub use chunker::{chunk_text, Chunk};
pub use config::{MaskStyle, RedactionConfig};
pub use detection::{
    detect_entities, detect_entities_with_progress, ChunkOutcome, ChunkReport, DetectionLog,
    DetectionLogEntry, DetectionReport, Direction,
};
pub use error::{ChunkFailure, OracleError, RedactError};
pub use normalizer::{normalize, try_normalize, ChunkBounds, OracleResponse};
pub use oracle::{CommandOracle, EntityOracle, OracleRequest, ReplayOracle};
pub use pipeline::{RedactionOutcome, Redactor};
pub use render::{
    highlight_text, mask_text, render, HighlightStrategy, MaskStrategy, RenderStrategy,
};
pub use resolver::resolve;
pub use span::{ResolvedSpans, TextSpan};
