//! Worker capability abstraction.
//!
//! A worker is anything that can take a [`Task`] carrying its capability
//! label and turn it into a [`TaskOutcome`] or an error. The engine never
//! special-cases a worker identity: every worker is reached through the
//! [`Worker`] trait and looked up by id in the
//! [`WorkerRegistry`](crate::registry::WorkerRegistry).
//!
//! ## Example
//!
//! ```
//! use async_trait::async_trait;
//! use conductor::catalog::Task;
//! use conductor::worker::{TaskContext, TaskOutcome, Worker};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Worker for Echo {
//!     fn capability_label(&self) -> &str {
//!         "echo"
//!     }
//!
//!     async fn handle(&self, task: &Task, _ctx: &TaskContext) -> anyhow::Result<TaskOutcome> {
//!         Ok(TaskOutcome::new("echo", format!("echoed {}", task.title)))
//!     }
//! }
//! ```

pub mod classifier;
pub mod specialist;

pub use classifier::{Classifier, KeywordClassifier, SelectedWorkflow, WorkflowRoute};
pub use specialist::{SpecialistKind, SpecialistWorker};

use crate::catalog::{Task, TaskId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// The worker role.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Label a task must carry for this worker to pick it up.
    fn capability_label(&self) -> &str;

    /// Process a single task.
    ///
    /// Long-running handlers should watch `ctx.cancel` and return early when
    /// it fires; the engine only enforces its own per-task timeout.
    async fn handle(&self, task: &Task, ctx: &TaskContext) -> anyhow::Result<TaskOutcome>;
}

/// Per-invocation context handed to [`Worker::handle`].
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub worker_id: String,
    pub phase: String,
    pub cancel: CancellationToken,
}

impl TaskContext {
    pub fn new(worker_id: &str, phase: &str, cancel: CancellationToken) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            phase: phase.to_string(),
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A significant finding a worker wants recorded outside the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub title: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl Discovery {
    pub fn new(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: detail.into(),
            task_id: None,
        }
    }

    pub fn for_task(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }
}

/// Successful result of handling one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Named procedure the worker followed.
    pub workflow: String,
    pub summary: String,
    #[serde(default)]
    pub steps_completed: Vec<String>,
    #[serde(default)]
    pub discoveries: Vec<Discovery>,
}

impl TaskOutcome {
    pub fn new(workflow: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            workflow: workflow.into(),
            summary: summary.into(),
            steps_completed: Vec::new(),
            discoveries: Vec::new(),
        }
    }

    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps_completed = steps;
        self
    }

    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discoveries.push(discovery);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_builder() {
        let outcome = TaskOutcome::new("general", "done")
            .with_steps(vec!["one".into(), "two".into()])
            .with_discovery(Discovery::new("found", "something").for_task("T1"));

        assert_eq!(outcome.steps_completed.len(), 2);
        assert_eq!(outcome.discoveries[0].task_id.as_deref(), Some("T1"));
    }

    #[test]
    fn test_context_observes_cancellation() {
        let token = CancellationToken::new();
        let ctx = TaskContext::new("qa", "Code Cleanup", token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_discovery_serialization_skips_missing_task() {
        let json = serde_json::to_string(&Discovery::new("a", "b")).unwrap();
        assert!(!json.contains("task_id"));
    }
}
