//! Oracle payload extraction and span rebasing
//!
//! Oracle output is untrusted. Extraction walks a fixed chain of parse
//! attempts and takes the first one that yields a JSON payload; each entity in
//! that payload is then validated on its own, so one bad span never costs the
//! rest of the chunk.

use crate::chunker::Chunk;
use crate::detection::{DetectionLog, DetectionLogEntry};
use crate::error::ChunkFailure;
use crate::span::TextSpan;
use serde_json::Value;
use tracing::{debug, error};

/// Collection key the oracle is asked to return entities under
pub const ENTITIES_KEY: &str = "entities";

/// Entity type used when the oracle omits one
pub const UNKNOWN_TYPE: &str = "UNKNOWN";

/// Raw answer from the oracle for one chunk
#[derive(Debug, Clone, PartialEq)]
pub enum OracleResponse {
    /// Already-decoded JSON
    Structured(Value),
    /// Free text that may or may not contain JSON
    Unstructured(String),
}

impl OracleResponse {
    /// Decode a raw body: valid JSON becomes `Structured`, anything else stays text
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => OracleResponse::Structured(value),
            Err(_) => OracleResponse::Unstructured(body.to_string()),
        }
    }

    /// Raw payload as text, for logging
    pub fn raw_text(&self) -> String {
        match self {
            OracleResponse::Structured(value) => value.to_string(),
            OracleResponse::Unstructured(text) => text.clone(),
        }
    }
}

/// Chunk coordinates a response is rebased against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBounds {
    pub offset: usize,
    pub char_len: usize,
}

impl ChunkBounds {
    pub fn end(&self) -> usize {
        self.offset + self.char_len
    }
}

impl From<&Chunk> for ChunkBounds {
    fn from(chunk: &Chunk) -> Self {
        Self {
            offset: chunk.global_offset,
            char_len: chunk.char_len,
        }
    }
}

/// Normalize one response into global spans, never failing
///
/// An undecodable payload yields no spans and exactly one error entry in `log`.
pub fn normalize(
    response: &OracleResponse,
    bounds: ChunkBounds,
    log: &mut DetectionLog,
) -> Vec<TextSpan> {
    match try_normalize(response, bounds) {
        Ok(spans) => spans,
        Err(failure) => {
            log.record(DetectionLogEntry::failure(bounds.offset, &failure));
            Vec::new()
        }
    }
}

/// Normalize one response, reporting an undecodable payload as a typed failure
pub fn try_normalize(
    response: &OracleResponse,
    bounds: ChunkBounds,
) -> Result<Vec<TextSpan>, ChunkFailure> {
    let payload = match extract_payload(response) {
        Some(payload) => payload,
        None => {
            let raw = response.raw_text();
            error!(offset = bounds.offset, "Failed to decode oracle response: {}", raw);
            return Err(ChunkFailure::MalformedResponse { snippet: raw });
        }
    };

    let candidates = match payload.get(ENTITIES_KEY) {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[][..],
    };

    let mut spans = Vec::with_capacity(candidates.len());
    let mut dropped = 0usize;
    for item in candidates {
        match rebase_entity(item, bounds) {
            Some(span) => spans.push(span),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(
            offset = bounds.offset,
            dropped,
            kept = spans.len(),
            "Dropped invalid oracle spans"
        );
    }
    Ok(spans)
}

/// Find the entity payload in a response, first success wins
pub fn extract_payload(response: &OracleResponse) -> Option<Value> {
    match response {
        OracleResponse::Structured(value) => unwrap_structured(value),
        OracleResponse::Unstructured(text) => parse_text_payload(text),
    }
}

fn unwrap_structured(value: &Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            match map.get(ENTITIES_KEY) {
                Some(Value::String(text)) if !text.trim().is_empty() => {
                    return parse_text_payload(text);
                }
                Some(Value::Array(items)) if !items.is_empty() => return Some(value.clone()),
                _ => {}
            }
            // Completion envelope: result.alternatives[0].message.text
            let completion_text = value
                .pointer("/result/alternatives/0/message/text")
                .and_then(Value::as_str);
            match completion_text {
                Some(text) => parse_text_payload(text),
                None => Some(value.clone()),
            }
        }
        Value::Array(items) => Some(wrap_entities(items.clone())),
        Value::String(text) => parse_text_payload(text),
        _ => None,
    }
}

fn parse_text_payload(text: &str) -> Option<Value> {
    let cleaned = strip_code_fence(text);
    if let Some(value) = parse_json_container(cleaned) {
        return Some(value);
    }

    // WHY: the outermost container is whichever bracket opens first, so an
    // entity array in prose is not mistaken for its first inner object
    let object = cleaned.find('{');
    let array = cleaned.find('[');
    let order = match (object, array) {
        (Some(o), Some(a)) if a < o => [('[', ']'), ('{', '}')],
        _ => [('{', '}'), ('[', ']')],
    };
    order.into_iter().find_map(|(open, close)| {
        slice_between(cleaned, open, close).and_then(parse_json_container)
    })
}

/// Drop surrounding whitespace and a markdown code fence with its language tag
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.trim_matches(|c: char| c == '`' || c.is_whitespace());
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Opening fence line may carry a language tag such as `json`
    let body = match inner.split_once('\n') {
        Some((tag, rest)) if !tag.contains(|c: char| c == '{' || c == '[') => rest,
        _ => inner,
    };
    body.trim()
}

/// Greedy slice from the first `open` to the last `close`
fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn parse_json_container(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        value @ Value::Object(_) => Some(value),
        Value::Array(items) => Some(wrap_entities(items)),
        _ => None,
    }
}

fn wrap_entities(items: Vec<Value>) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(ENTITIES_KEY.to_string(), Value::Array(items));
    Value::Object(map)
}

fn rebase_entity(item: &Value, bounds: ChunkBounds) -> Option<TextSpan> {
    let object = item.as_object()?;

    let entity_type = object
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNKNOWN_TYPE);
    let text = object.get("text").and_then(Value::as_str).unwrap_or("");

    let local_start = coerce_offset(object.get("start"))?;
    let local_end = coerce_offset(object.get("end"))?;

    let start = bounds.offset.checked_add(local_start)?;
    let end = bounds.offset.checked_add(local_end)?;

    if end < start || end > bounds.end() {
        debug!(start, end, chunk_end = bounds.end(), "Out-of-bounds span dropped");
        return None;
    }

    Some(TextSpan::new(entity_type, text, start, end))
}

/// Coerce an offset field to a non-negative integer
fn coerce_offset(value: Option<&Value>) -> Option<usize> {
    match value? {
        Value::Number(number) => {
            if let Some(n) = number.as_u64() {
                usize::try_from(n).ok()
            } else if let Some(f) = number.as_f64() {
                if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 {
                    Some(f as usize)
                } else {
                    None
                }
            } else {
                None
            }
        }
        Value::String(text) => text.trim().parse::<usize>().ok(),
        _ => None,
    }
}
