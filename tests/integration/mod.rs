// Integration test utilities and common code
// WHY: Centralized utilities avoid duplication across integration tests

#![allow(dead_code)]

use spanmask::{EntityOracle, OracleError, OracleRequest, OracleResponse};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Test fixture helper for creating temporary directories with input documents
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with temporary directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();

        Self { temp_dir, root_path }
    }

    /// Create a text file with given content
    pub fn create_text_file<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.root_path.join(relative_path);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }
}

/// What the scripted oracle does for one chunk offset
#[derive(Clone)]
pub struct Script {
    pub reply: Result<OracleResponse, OracleError>,
    pub delay: Duration,
}

/// Oracle double answering from a per-offset script
///
/// Unscripted offsets answer with an empty entity list. Every request is
/// recorded so tests can check which chunks were sent.
#[derive(Default)]
pub struct ScriptedOracle {
    scripts: HashMap<usize, Script>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    seen: Mutex<Vec<(usize, String)>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the chunk at `offset` with a raw body (JSON or prose)
    pub fn body(mut self, offset: usize, body: &str) -> Self {
        self.scripts.insert(offset, Script {
            reply: Ok(OracleResponse::from_body(body)),
            delay: Duration::ZERO,
        });
        self
    }

    /// Answer the chunk at `offset` with entities given as `(type, text, start, end)`
    pub fn entities(self, offset: usize, entities: &[(&str, &str, i64, i64)]) -> Self {
        let items: Vec<serde_json::Value> = entities
            .iter()
            .map(|(t, text, start, end)| {
                serde_json::json!({"type": t, "text": text, "start": start, "end": end})
            })
            .collect();
        self.body(offset, &serde_json::json!({ "entities": items }).to_string())
    }

    /// Fail the chunk at `offset`
    pub fn failure(mut self, offset: usize, error: OracleError) -> Self {
        self.scripts.insert(offset, Script {
            reply: Err(error),
            delay: Duration::ZERO,
        });
        self
    }

    /// Delay the answer for the chunk at `offset`
    pub fn delay(mut self, offset: usize, delay: Duration) -> Self {
        let script = self.scripts.entry(offset).or_insert_with(|| Script {
            reply: Ok(OracleResponse::from_body(r#"{"entities": []}"#)),
            delay: Duration::ZERO,
        });
        script.delay = delay;
        self
    }

    /// Delay the answer for every chunk in `offsets`
    pub fn delay_all(self, offsets: impl IntoIterator<Item = usize>, delay: Duration) -> Self {
        offsets
            .into_iter()
            .fold(self, |oracle, offset| oracle.delay(offset, delay))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls that were ever running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// `(offset, chunk text)` of every request received
    pub fn seen_chunks(&self) -> Vec<(usize, String)> {
        let mut seen = self.seen.lock().expect("seen lock poisoned").clone();
        seen.sort();
        seen
    }
}

impl EntityOracle for ScriptedOracle {
    async fn detect(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        self.seen
            .lock()
            .expect("seen lock poisoned")
            .push((request.offset, request.text.clone()));

        let script = self.scripts.get(&request.offset).cloned();
        let reply = match script {
            Some(script) => {
                if !script.delay.is_zero() {
                    tokio::time::sleep(script.delay).await;
                }
                script.reply
            }
            None => Ok(OracleResponse::from_body(r#"{"entities": []}"#)),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}
