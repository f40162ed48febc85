//! In-memory fakes for the ports the lifecycle layer talks to.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rover_runner_core::settings::{Settings, TimingSettings};
use rover_runner_core::workspace::RUNNER_DIR;
use rover_runner_core::{Error, RemoteUrls, Subgraph, UrlLookup, Workspace};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::health::{HealthCheck, Liveness};
use crate::lifecycle::{Collaborators, Runtime};
use crate::rover::{IntrospectRequest, SchemaIntrospector};
use crate::terminal::{TerminalError, TerminalHost};

/// One call made against [`RecordingTerminals`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOp {
    Open(String),
    Send(String, String),
    Interrupt(String),
    Dispose(String),
}

#[derive(Debug, Default)]
struct Recorded {
    open: HashMap<String, Option<PathBuf>>,
    sent: HashMap<String, Vec<String>>,
    ops: Vec<TerminalOp>,
    stuck: HashSet<String>,
}

/// Terminal host that records every call instead of spawning shells.
#[derive(Debug, Default)]
pub struct RecordingTerminals {
    inner: Mutex<Recorded>,
}

impl RecordingTerminals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `dispose` fail for `name`, leaving the terminal open.
    pub async fn stick(&self, name: &str) {
        self.inner.lock().await.stuck.insert(name.to_owned());
    }

    /// Every line sent to `name`, including before it was disposed.
    pub async fn sent(&self, name: &str) -> Vec<String> {
        self.inner
            .lock()
            .await
            .sent
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn ops(&self) -> Vec<TerminalOp> {
        self.inner.lock().await.ops.clone()
    }
}

#[async_trait]
impl TerminalHost for RecordingTerminals {
    async fn open(&self, name: &str) -> Result<(), TerminalError> {
        let mut inner = self.inner.lock().await;
        inner.ops.push(TerminalOp::Open(name.to_owned()));
        inner.open.entry(name.to_owned()).or_insert(None);
        drop(inner);
        Ok(())
    }

    async fn send_text(&self, name: &str, text: &str) -> Result<(), TerminalError> {
        let mut inner = self.inner.lock().await;
        if !inner.open.contains_key(name) {
            return Err(TerminalError::NotFound {
                name: name.to_owned(),
            });
        }
        inner
            .ops
            .push(TerminalOp::Send(name.to_owned(), text.to_owned()));
        inner
            .sent
            .entry(name.to_owned())
            .or_default()
            .push(text.to_owned());
        drop(inner);
        Ok(())
    }

    async fn working_dir(&self, name: &str) -> Option<PathBuf> {
        self.inner.lock().await.open.get(name).cloned().flatten()
    }

    async fn set_working_dir(&self, name: &str, dir: &Path) {
        if let Some(cwd) = self.inner.lock().await.open.get_mut(name) {
            *cwd = Some(dir.to_path_buf());
        }
    }

    async fn interrupt(&self, name: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.open.contains_key(name) {
            return false;
        }
        inner.ops.push(TerminalOp::Interrupt(name.to_owned()));
        drop(inner);
        true
    }

    async fn dispose(&self, name: &str) -> Result<(), TerminalError> {
        let mut inner = self.inner.lock().await;
        if inner.stuck.contains(name) {
            return Err(TerminalError::Exited {
                name: name.to_owned(),
            });
        }
        if inner.open.remove(name).is_none() {
            return Err(TerminalError::NotFound {
                name: name.to_owned(),
            });
        }
        inner.ops.push(TerminalOp::Dispose(name.to_owned()));
        drop(inner);
        Ok(())
    }

    async fn exists(&self, name: &str) -> bool {
        self.inner.lock().await.open.contains_key(name)
    }
}

/// Introspector that succeeds unless the URL was marked as failing.
#[derive(Debug, Default)]
pub struct FakeIntrospector {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<IntrospectRequest>>,
}

impl FakeIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_for(&self, url: &str) {
        self.failing.lock().await.insert(url.to_owned());
    }

    pub async fn calls(&self) -> Vec<IntrospectRequest> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl SchemaIntrospector for FakeIntrospector {
    async fn introspect(&self, request: &IntrospectRequest) -> rover_runner_core::Result<PathBuf> {
        self.calls.lock().await.push(request.clone());
        if self.failing.lock().await.contains(&request.url) {
            return Err(Error::IntrospectionFailed {
                url: request.url.clone(),
            });
        }
        Ok(request.output_path())
    }
}

/// Health check answering from a fixed table; unknown subgraphs are up.
#[derive(Debug, Default)]
pub struct FakeHealth {
    down: Mutex<HashSet<String>>,
    probes: Mutex<Vec<(String, Instant)>>,
}

impl FakeHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mark_down(&self, subgraph: &str) {
        self.down.lock().await.insert(subgraph.to_owned());
    }

    /// Subgraph names with the instant each probe ran.
    pub async fn probes(&self) -> Vec<(String, Instant)> {
        self.probes.lock().await.clone()
    }
}

#[async_trait]
impl HealthCheck for FakeHealth {
    async fn probe(&self, subgraph: &Subgraph) -> Liveness {
        self.probes
            .lock()
            .await
            .push((subgraph.name.clone(), Instant::now()));
        if self.down.lock().await.contains(&subgraph.name) {
            Liveness::NotListening
        } else {
            Liveness::Listening
        }
    }
}

/// What [`FakeLookup`] answers with.
#[derive(Debug, Clone)]
pub enum LookupAnswer {
    Urls(RemoteUrls),
    Unavailable(String),
    NotConfigured,
}

/// URL lookup returning a canned answer and counting calls.
#[derive(Debug)]
pub struct FakeLookup {
    answer: LookupAnswer,
    calls: AtomicUsize,
}

impl FakeLookup {
    pub fn new(answer: LookupAnswer) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn urls<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(LookupAnswer::Urls(pairs.into_iter().collect()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UrlLookup for FakeLookup {
    async fn fetch_subgraph_urls(&self) -> rover_runner_core::Result<RemoteUrls> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            LookupAnswer::Urls(urls) => Ok(urls.clone()),
            LookupAnswer::Unavailable(reason) => Err(Error::RemoteUnavailable(reason.clone())),
            LookupAnswer::NotConfigured => Err(Error::NotConfigured("apiKey is empty".into())),
        }
    }
}

/// Declaration shared by lifecycle and orchestrator tests.
pub const DECLARATION: &str = r#"{
    "subgraphs": {
        "users": { "path": "subgraphs/users", "localUrl": "http://localhost:4001/graphql" },
        "orders": { "path": "", "localUrl": "http://localhost:4002/graphql", "devUrl": "https://override" },
        "reviews": { "path": "subgraphs/reviews", "localUrl": "http://localhost:4003/graphql" }
    },
    "supergraphs": {
        "shop": ["users", "orders"],
        "broken": ["users", "ghost"]
    }
}"#;

/// Temporary workspace plus fakes for every collaborator.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub terminals: Arc<RecordingTerminals>,
    pub introspector: Arc<FakeIntrospector>,
    pub health: Arc<FakeHealth>,
    pub lookup: Arc<FakeLookup>,
}

impl Fixture {
    /// Workspace with [`DECLARATION`] and a lookup knowing every subgraph.
    pub fn new() -> Self {
        Self::with(
            Some(DECLARATION),
            LookupAnswer::Urls(
                [
                    ("users", "https://users.remote/graphql"),
                    ("orders", "https://remote"),
                    ("reviews", "https://reviews.remote/graphql"),
                ]
                .into_iter()
                .collect(),
            ),
        )
    }

    #[allow(clippy::unwrap_used)]
    pub fn with(declaration: Option<&str>, answer: LookupAnswer) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let runner_dir = dir.path().join(RUNNER_DIR);
        std::fs::create_dir_all(&runner_dir).unwrap();
        if let Some(content) = declaration {
            std::fs::write(runner_dir.join("supergraph.json"), content).unwrap();
        }
        Self {
            dir,
            terminals: Arc::new(RecordingTerminals::new()),
            introspector: Arc::new(FakeIntrospector::new()),
            health: Arc::new(FakeHealth::new()),
            lookup: Arc::new(FakeLookup::new(answer)),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.dir.path())
    }

    pub fn settings() -> Settings {
        Settings {
            timing: TimingSettings::immediate(),
            ..Settings::default()
        }
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime_with_health(self.health.clone())
    }

    pub fn runtime_with_health(&self, health: Arc<dyn HealthCheck>) -> Runtime {
        self.build_runtime(Self::settings(), health)
    }

    /// Runtime with real settle delays, for tests under a paused clock.
    pub fn runtime_with_default_timing(&self) -> Runtime {
        self.build_runtime(Settings::default(), self.health.clone())
    }

    fn build_runtime(&self, settings: Settings, health: Arc<dyn HealthCheck>) -> Runtime {
        Runtime::new(
            settings,
            self.workspace(),
            Collaborators {
                terminals: self.terminals.clone(),
                introspector: self.introspector.clone(),
                health,
                lookup: self.lookup.clone(),
            },
        )
    }
}

/// A localhost port nothing listens on.
#[allow(clippy::unwrap_used)]
pub async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    listener.local_addr().unwrap().port()
}
