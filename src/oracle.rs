//! Entity detection oracle contract and local adapters
//!
//! The engine never talks to a network service itself. Anything that can turn
//! an `OracleRequest` into an `OracleResponse` can drive a detection pass:
//! `CommandOracle` pipes each request through an external program, and
//! `ReplayOracle` serves recorded responses keyed by chunk offset.

use crate::chunker::Chunk;
use crate::error::OracleError;
use crate::normalizer::OracleResponse;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// System role message sent with every chunk
pub const SYSTEM_INSTRUCTION: &str = "You extract entities from text.";

/// User instruction preceding the chunk text
pub const ENTITY_PROMPT: &str = "Find personal data, company names, projects and bank or legal \
    requisites in the text. Return JSON with the key entities, where each object has the \
    fields type, text, start, end. Offsets are 0-based character positions within this \
    text. Example: {\"entities\": [{\"type\": \"PERSON\", \"text\": \"Ivan Ivanov\", \
    \"start\": 0, \"end\": 11}]}. Text:\n";

/// Exit status a command oracle uses to report rejected credentials
pub const UNAUTHORIZED_EXIT_CODE: i32 = 77;

/// One chunk's worth of work for the oracle
#[derive(Debug, Clone)]
pub struct OracleRequest {
    /// Character offset of the chunk in the full text
    pub offset: usize,
    /// Chunk text the oracle must analyse
    pub text: String,
    /// Complete request body: instruction, chunk and output schema
    pub body: Value,
}

impl OracleRequest {
    pub fn for_chunk(chunk: &Chunk) -> Self {
        Self {
            offset: chunk.global_offset,
            text: chunk.content.clone(),
            body: build_request_body(&chunk.content),
        }
    }
}

/// Build the completion request body for one chunk
pub fn build_request_body(chunk_text: &str) -> Value {
    json!({
        "completionOptions": {
            "stream": false,
            "temperature": 0.1,
            "maxTokens": 1000
        },
        "messages": [
            {"role": "system", "text": SYSTEM_INSTRUCTION},
            {"role": "user", "text": format!("{ENTITY_PROMPT}{chunk_text}")}
        ],
        "responseSchema": {
            "type": "object",
            "properties": {
                "entities": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": {"type": "string"},
                            "text": {"type": "string"},
                            "start": {"type": "integer", "minimum": 0},
                            "end": {"type": "integer", "minimum": 0}
                        },
                        "required": ["type", "text", "start", "end"]
                    }
                }
            },
            "required": ["entities"]
        }
    })
}

/// External entity detector, called once per chunk
///
/// Calls may run concurrently. A failure only ever affects its own chunk.
pub trait EntityOracle {
    fn detect(
        &self,
        request: &OracleRequest,
    ) -> impl Future<Output = Result<OracleResponse, OracleError>> + Send;
}

/// Runs an external program per chunk: request JSON on stdin, response on stdout
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

impl EntityOracle for CommandOracle {
    async fn detect(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let payload = serde_json::to_vec(&request.body)
            .map_err(|e| OracleError::Transport(format!("failed to encode request: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // WHY: a timed-out call drops the child; it must not outlive the chunk
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                OracleError::Transport(format!("failed to start '{}': {e}", self.program))
            })?;

        // WHY: stdin is fed from its own task so a child that writes before it
        // finishes reading cannot deadlock on a full stdout pipe
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await
            })
        });

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| OracleError::Transport(e.to_string()))?,
            Err(_) => return Err(OracleError::Timeout(self.timeout.as_secs())),
        };

        if let Some(writer) = writer {
            if let Ok(Err(e)) = writer.await {
                debug!(offset = request.offset, "Oracle command closed stdin early: {}", e);
            }
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        match output.status.code() {
            Some(0) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                Ok(OracleResponse::from_body(&stdout))
            }
            Some(UNAUTHORIZED_EXIT_CODE) => Err(OracleError::Unauthorized {
                status: 401,
                body: stderr,
            }),
            Some(code) => Err(OracleError::Status {
                status: u16::try_from(code).unwrap_or(u16::MAX),
                body: stderr,
            }),
            None => Err(OracleError::Transport(format!(
                "'{}' was terminated by a signal",
                self.program
            ))),
        }
    }
}

/// Serves previously recorded responses keyed by chunk offset
///
/// Offsets without a recording answer with an empty entity list.
#[derive(Debug, Clone, Default)]
pub struct ReplayOracle {
    responses: HashMap<usize, OracleResponse>,
}

impl ReplayOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, offset: usize, response: OracleResponse) {
        self.responses.insert(offset, response);
    }

    /// Load recordings from a JSON object mapping offsets to responses
    ///
    /// String values are treated as raw response bodies; any other value is
    /// used as an already-structured response.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid replay file {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let recordings: HashMap<String, Value> = serde_json::from_str(content)?;
        let mut oracle = Self::new();
        for (key, value) in recordings {
            let offset: usize = key
                .trim()
                .parse()
                .with_context(|| format!("Replay key '{key}' is not a chunk offset"))?;
            let response = match value {
                Value::String(body) => OracleResponse::from_body(&body),
                other => OracleResponse::Structured(other),
            };
            oracle.insert(offset, response);
        }
        Ok(oracle)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl EntityOracle for ReplayOracle {
    async fn detect(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        match self.responses.get(&request.offset) {
            Some(response) => Ok(response.clone()),
            None => {
                warn!(offset = request.offset, "No recorded response for chunk");
                Ok(OracleResponse::Structured(json!({ "entities": [] })))
            }
        }
    }
}
