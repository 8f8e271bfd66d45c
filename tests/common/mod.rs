//! In-process stub of the catalog API for integration tests.

#![allow(dead_code)]

use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use stagesync::SyncConfig;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Canned responses served by [`StubServer`].
#[derive(Debug, Default, Clone)]
pub struct StubCatalog {
    /// Body of `GET /stages`.
    pub stages: Value,
    /// Status line to answer `GET /stages` with instead of the body.
    pub stages_status: Option<&'static str>,
    /// Body of `GET /stages/{stage}/testcases`, keyed by stage name.
    pub testcases: HashMap<String, Value>,
    /// Body of `GET /file-content`, keyed by `(stageName, filePath)`.
    pub files: HashMap<(String, String), Value>,
    /// Time each file-content request is held open.
    pub file_delay: Duration,
}

impl StubCatalog {
    pub fn new(git_hash: Option<&str>, stages: &[(&str, Value)]) -> Self {
        let stages: Vec<Value> = stages
            .iter()
            .map(|(name, marker)| json!({ "name": name, "last_updated": marker }))
            .collect();
        let mut body = json!({ "stages": stages });
        if let Some(hash) = git_hash {
            body["gitInfo"] = json!({ "git_hash": hash });
        }
        Self {
            stages: body,
            ..Self::default()
        }
    }

    pub fn with_testcases(mut self, stage: &str, testcases: Value) -> Self {
        self.testcases
            .insert(stage.to_string(), json!({ "testcases": testcases }));
        self
    }

    pub fn with_file(self, stage: &str, path: &str, content: &str) -> Self {
        self.with_file_body(stage, path, json!({ "content": content }))
    }

    pub fn with_file_body(mut self, stage: &str, path: &str, body: Value) -> Self {
        self.files.insert((stage.to_string(), path.to_string()), body);
        self
    }
}

/// What the stub observed.
#[derive(Debug, Default)]
pub struct StubStats {
    /// Raw request targets, in arrival order.
    pub requests: Mutex<Vec<String>>,
    /// Decoded `filePath` query values.
    pub file_paths: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    /// Highest number of file-content requests served at once.
    pub max_in_flight: AtomicUsize,
}

pub struct StubServer {
    pub base_url: String,
    pub stats: Arc<StubStats>,
}

impl StubServer {
    pub async fn start(catalog: StubCatalog) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let stats = Arc::new(StubStats::default());
        let catalog = Arc::new(catalog);

        let server_stats = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle(
                    stream,
                    Arc::clone(&catalog),
                    Arc::clone(&server_stats),
                ));
            }
        });

        Self {
            base_url: format!("http://{}/api", addr),
            stats,
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.stats.requests.lock().unwrap().clone()
    }

    pub fn count_requests(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|target| target.starts_with(prefix))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.stats.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn config(&self, mirror_root: &Path) -> SyncConfig {
        SyncConfig {
            base_url: self.base_url.clone(),
            mirror_root: mirror_root.to_path_buf(),
            request_timeout: Duration::from_secs(10),
            ..SyncConfig::default()
        }
    }
}

fn decode(value: &str) -> String {
    percent_decode_str(value)
        .decode_utf8()
        .expect("utf-8 query value")
        .into_owned()
}

async fn handle(mut stream: TcpStream, catalog: Arc<StubCatalog>, stats: Arc<StubStats>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let request = String::from_utf8_lossy(&buf);
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    stats.requests.lock().unwrap().push(target.clone());

    let (status, body) = route(&target, &catalog, &stats).await;
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn route(target: &str, catalog: &StubCatalog, stats: &StubStats) -> (&'static str, String) {
    const OK: &str = "200 OK";
    const NOT_FOUND: &str = "404 Not Found";

    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let path = path.strip_prefix("/api").unwrap_or(path);

    if path == "/stages" {
        if let Some(status) = catalog.stages_status {
            return (status, json!({ "error": "maintenance" }).to_string());
        }
        return (OK, catalog.stages.to_string());
    }

    if path == "/file-content" {
        let params: HashMap<&str, String> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(key, value)| (key, decode(value)))
            .collect();
        let stage = params.get("stageName").cloned().unwrap_or_default();
        let file = params.get("filePath").cloned().unwrap_or_default();
        stats.file_paths.lock().unwrap().push(file.clone());

        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(catalog.file_delay).await;
        stats.in_flight.fetch_sub(1, Ordering::SeqCst);

        return match catalog.files.get(&(stage, file)) {
            Some(body) => (OK, body.to_string()),
            None => (NOT_FOUND, json!({ "error": "no such file" }).to_string()),
        };
    }

    let stage = path
        .strip_prefix("/stages/")
        .and_then(|rest| rest.strip_suffix("/testcases"))
        .map(decode);
    match stage.and_then(|stage| catalog.testcases.get(&stage)) {
        Some(body) => (OK, body.to_string()),
        None => (NOT_FOUND, json!({ "error": "not found" }).to_string()),
    }
}
