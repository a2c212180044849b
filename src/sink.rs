//! Integration sink: the external system of record for task outcomes.
//!
//! The engine calls [`IntegrationSink::record`] after every task finishes
//! (successfully or not) and [`IntegrationSink::record_discovery`] for each
//! finding a worker reports. Calls are fire-and-forget from the engine's
//! point of view: a [`SinkError`] is logged and never changes task, phase or
//! run status.

use crate::catalog::Task;
use crate::errors::SinkError;
use crate::state::TaskError;
use crate::worker::{Discovery, TaskOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What happened to a task, as handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SinkRecord {
    Completed { outcome: TaskOutcome },
    Failed { error: TaskError },
}

impl SinkRecord {
    pub fn is_success(&self) -> bool {
        matches!(self, SinkRecord::Completed { .. })
    }
}

#[async_trait]
pub trait IntegrationSink: Send + Sync {
    /// Record a finished task.
    async fn record(&self, worker_id: &str, task: &Task, record: &SinkRecord) -> Result<(), SinkError>;

    /// Record a significant finding.
    async fn record_discovery(&self, worker_id: &str, discovery: &Discovery) -> Result<(), SinkError>;
}

/// Sink that only emits tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl IntegrationSink for TracingSink {
    async fn record(&self, worker_id: &str, task: &Task, record: &SinkRecord) -> Result<(), SinkError> {
        match record {
            SinkRecord::Completed { outcome } => tracing::info!(
                target: "conductor::sink",
                worker = worker_id,
                task = %task.id,
                workflow = %outcome.workflow,
                "{}",
                outcome.summary
            ),
            SinkRecord::Failed { error } => tracing::warn!(
                target: "conductor::sink",
                worker = worker_id,
                task = %task.id,
                kind = %error.kind,
                "task failed: {}",
                error.reason
            ),
        }
        Ok(())
    }

    async fn record_discovery(&self, worker_id: &str, discovery: &Discovery) -> Result<(), SinkError> {
        tracing::info!(
            target: "conductor::sink",
            worker = worker_id,
            task = discovery.task_id.as_deref().unwrap_or("-"),
            "discovery: {}",
            discovery.title
        );
        Ok(())
    }
}

/// One line written by [`JsonlSink`], also what [`MemorySink`] keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum SinkEntry {
    Task {
        at: DateTime<Utc>,
        worker_id: String,
        task_id: String,
        title: String,
        #[serde(flatten)]
        record: SinkRecord,
    },
    Discovery {
        at: DateTime<Utc>,
        worker_id: String,
        #[serde(flatten)]
        discovery: Discovery,
    },
}

impl SinkEntry {
    fn task(worker_id: &str, task: &Task, record: &SinkRecord) -> Self {
        SinkEntry::Task {
            at: Utc::now(),
            worker_id: worker_id.to_string(),
            task_id: task.id.clone(),
            title: task.title.clone(),
            record: record.clone(),
        }
    }

    fn discovery(worker_id: &str, discovery: &Discovery) -> Self {
        SinkEntry::Discovery {
            at: Utc::now(),
            worker_id: worker_id.to_string(),
            discovery: discovery.clone(),
        }
    }
}

/// In-memory sink, useful for tests and for embedding the engine.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<SinkEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<SinkEntry> {
        self.lock().clone()
    }

    /// Task records as `(worker_id, task_id, record)`.
    pub fn task_records(&self) -> Vec<(String, String, SinkRecord)> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SinkEntry::Task {
                    worker_id,
                    task_id,
                    record,
                    ..
                } => Some((worker_id.clone(), task_id.clone(), record.clone())),
                SinkEntry::Discovery { .. } => None,
            })
            .collect()
    }

    pub fn discoveries(&self) -> Vec<Discovery> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SinkEntry::Discovery { discovery, .. } => Some(discovery.clone()),
                SinkEntry::Task { .. } => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SinkEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl IntegrationSink for MemorySink {
    async fn record(&self, worker_id: &str, task: &Task, record: &SinkRecord) -> Result<(), SinkError> {
        self.lock().push(SinkEntry::task(worker_id, task, record));
        Ok(())
    }

    async fn record_discovery(&self, worker_id: &str, discovery: &Discovery) -> Result<(), SinkError> {
        self.lock().push(SinkEntry::discovery(worker_id, discovery));
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl JsonlSink {
    /// Open (or create) the file for appending.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &SinkEntry) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl IntegrationSink for JsonlSink {
    async fn record(&self, worker_id: &str, task: &Task, record: &SinkRecord) -> Result<(), SinkError> {
        self.append(&SinkEntry::task(worker_id, task, record))
    }

    async fn record_discovery(&self, worker_id: &str, discovery: &Discovery) -> Result<(), SinkError> {
        self.append(&SinkEntry::discovery(worker_id, discovery))
    }
}

/// Forwards every call to each inner sink, reporting the first failure.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn IntegrationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn IntegrationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl IntegrationSink for FanoutSink {
    async fn record(&self, worker_id: &str, task: &Task, record: &SinkRecord) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(worker_id, task, record).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn record_discovery(&self, worker_id: &str, discovery: &Discovery) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record_discovery(worker_id, discovery).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TaskErrorKind;

    struct Rejecting;

    #[async_trait]
    impl IntegrationSink for Rejecting {
        async fn record(&self, _: &str, _: &Task, _: &SinkRecord) -> Result<(), SinkError> {
            Err(SinkError::Rejected("tracker offline".into()))
        }

        async fn record_discovery(&self, _: &str, _: &Discovery) -> Result<(), SinkError> {
            Err(SinkError::Rejected("tracker offline".into()))
        }
    }

    fn task() -> Task {
        Task::new("T1", "Test Coverage Analysis", ["Agent-QA"], 8.0)
    }

    fn completed() -> SinkRecord {
        SinkRecord::Completed {
            outcome: TaskOutcome::new("test_coverage_analysis", "done"),
        }
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_entries_in_order() {
        let sink = MemorySink::new();
        sink.record("qa", &task(), &completed()).await.unwrap();
        sink.record_discovery("qa", &Discovery::new("gap", "no e2e tests"))
            .await
            .unwrap();

        assert_eq!(sink.entries().len(), 2);
        let records = sink.task_records();
        assert_eq!(records[0].0, "qa");
        assert_eq!(records[0].1, "T1");
        assert!(records[0].2.is_success());
        assert_eq!(sink.discoveries()[0].title, "gap");
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sink.jsonl");
        let sink = JsonlSink::open(&path).unwrap();

        sink.record("qa", &task(), &completed()).await.unwrap();
        let failed = SinkRecord::Failed {
            error: TaskError::new("T1", "qa", TaskErrorKind::Handler, "boom"),
        };
        sink.record("qa", &task(), &failed).await.unwrap();
        sink.record_discovery("qa", &Discovery::new("gap", "detail").for_task("T1"))
            .await
            .unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["entry"], "task");
        assert_eq!(first["status"], "completed");
        assert_eq!(first["task_id"], "T1");

        let second: SinkEntry = serde_json::from_str(lines[1]).unwrap();
        match second {
            SinkEntry::Task { record, .. } => assert!(!record.is_success()),
            _ => panic!("Expected task entry"),
        }

        let third: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(third["entry"], "discovery");
        assert_eq!(third["title"], "gap");
    }

    #[tokio::test]
    async fn test_fanout_reaches_every_sink_and_reports_failure() {
        let memory = MemorySink::new();
        let fanout = FanoutSink::new()
            .with(Arc::new(Rejecting))
            .with(Arc::new(memory.clone()));
        assert_eq!(fanout.len(), 2);

        let err = fanout.record("qa", &task(), &completed()).await.unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));
        assert_eq!(memory.task_records().len(), 1);
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        let sink = TracingSink;
        assert!(sink.record("qa", &task(), &completed()).await.is_ok());
        assert!(sink
            .record_discovery("qa", &Discovery::new("a", "b"))
            .await
            .is_ok());
    }
}
