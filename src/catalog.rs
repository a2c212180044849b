//! Task catalog: the immutable set of work items a run draws from.
//!
//! Task definitions never change after import. The only mutable state is each
//! task's [`TaskStatus`], kept in an atomic cell next to the task so that
//! concurrently running workers can race for the same task and exactly one of
//! them wins the `Pending -> InProgress` transition.

use crate::errors::ConfigurationError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};

/// Identifier of a task within a catalog.
pub type TaskId = String;

/// Lifecycle of a task during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TaskStatus {
    #[default]
    Pending = 0,
    InProgress = 1,
    Done = 2,
    Failed = 3,
}

impl TaskStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::InProgress,
            2 => Self::Done,
            3 => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Check if the task reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An atomic unit of declared work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub labels: BTreeSet<String>,
    pub estimate_hours: f64,
}

impl Task {
    pub fn new<I, S>(id: &str, title: &str, labels: I, estimate_hours: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            labels: labels.into_iter().map(Into::into).collect(),
            estimate_hours,
        }
    }

    /// Check whether the task carries the given capability label.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// A task record as delivered by the external project tracker.
///
/// Ids are optional on import; missing ids are assigned as `TASK-001`,
/// `TASK-002`, ... in record order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, alias = "estimate")]
    pub estimate_hours: f64,
}

/// Catalog file layout: either a bare array of records or `{ "tasks": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Bare(Vec<TaskRecord>),
    Wrapped { tasks: Vec<TaskRecord> },
}

struct Entry {
    task: Task,
    status: AtomicU8,
}

/// Immutable task collection with per-task atomic status.
pub struct TaskCatalog {
    entries: Vec<Entry>,
    index: HashMap<TaskId, usize>,
}

impl std::fmt::Debug for TaskCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCatalog")
            .field("tasks", &self.entries.len())
            .field("statuses", &self.statuses())
            .finish()
    }
}

impl TaskCatalog {
    /// Build a catalog from fully formed tasks. Every task starts `Pending`.
    pub fn new(tasks: Vec<Task>) -> std::result::Result<Self, ConfigurationError> {
        let mut index = HashMap::with_capacity(tasks.len());
        let mut entries = Vec::with_capacity(tasks.len());

        for (i, task) in tasks.into_iter().enumerate() {
            if index.insert(task.id.clone(), i).is_some() {
                return Err(ConfigurationError::DuplicateTask(task.id));
            }
            entries.push(Entry {
                task,
                status: AtomicU8::new(TaskStatus::Pending as u8),
            });
        }

        Ok(Self { entries, index })
    }

    /// Build a catalog from tracker records, assigning ids where missing.
    pub fn from_records(records: Vec<TaskRecord>) -> std::result::Result<Self, ConfigurationError> {
        let tasks = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| Task {
                id: record.id.unwrap_or_else(|| format!("TASK-{:03}", i + 1)),
                title: record.title,
                labels: record.labels.into_iter().collect(),
                estimate_hours: record.estimate_hours,
            })
            .collect();
        Self::new(tasks)
    }

    /// Parse a catalog from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: CatalogFile =
            serde_json::from_str(content).context("Failed to parse task catalog JSON")?;
        let records = match file {
            CatalogFile::Bare(records) => records,
            CatalogFile::Wrapped { tasks } => tasks,
        };
        Ok(Self::from_records(records)?)
    }

    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read task catalog: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Invalid task catalog: {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over tasks in catalog order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.entries.iter().map(|e| &e.task)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.entries[i].task)
    }

    pub fn status(&self, id: &str) -> Option<TaskStatus> {
        self.index
            .get(id)
            .map(|&i| TaskStatus::from_u8(self.entries[i].status.load(Ordering::Acquire)))
    }

    /// Pending tasks carrying `label`, in catalog order.
    pub fn candidates(&self, label: &str) -> Vec<Task> {
        self.entries
            .iter()
            .filter(|e| e.task.has_label(label))
            .filter(|e| TaskStatus::from_u8(e.status.load(Ordering::Acquire)) == TaskStatus::Pending)
            .map(|e| e.task.clone())
            .collect()
    }

    /// Claim a task for execution.
    ///
    /// Returns `true` for exactly one caller per task: the one whose
    /// compare-and-swap moved it from `Pending` to `InProgress`.
    pub fn try_claim(&self, id: &str) -> bool {
        self.transition(id, TaskStatus::Pending, TaskStatus::InProgress)
    }

    /// Mark a claimed task as done.
    pub fn complete(&self, id: &str) -> bool {
        self.transition(id, TaskStatus::InProgress, TaskStatus::Done)
    }

    /// Mark a claimed task as failed.
    pub fn fail(&self, id: &str) -> bool {
        self.transition(id, TaskStatus::InProgress, TaskStatus::Failed)
    }

    fn transition(&self, id: &str, from: TaskStatus, to: TaskStatus) -> bool {
        let Some(&i) = self.index.get(id) else {
            return false;
        };
        self.entries[i]
            .status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current status of every task, keyed by id.
    pub fn statuses(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.entries
            .iter()
            .map(|e| {
                (
                    e.task.id.clone(),
                    TaskStatus::from_u8(e.status.load(Ordering::Acquire)),
                )
            })
            .collect()
    }

    /// Ids of tasks still in the given status, in catalog order.
    pub fn ids_with_status(&self, status: TaskStatus) -> Vec<TaskId> {
        self.entries
            .iter()
            .filter(|e| TaskStatus::from_u8(e.status.load(Ordering::Acquire)) == status)
            .map(|e| e.task.id.clone())
            .collect()
    }
}
