//! Execution records produced while a run is in flight.
//!
//! A [`WorkerResult`] is produced once per worker per phase, and a
//! [`PhaseRun`] wraps all of a phase's worker results once its barrier has
//! been crossed. Both are plain values; the aggregator folds them into the
//! run report.

use crate::catalog::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Why a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// The handler returned an error.
    Handler,
    /// The handler did not return within the task timeout.
    Timeout,
    /// The worker invocation itself died (e.g. a panic in the handler).
    WorkerCrash,
    /// The handler gave up after observing run cancellation.
    Cancelled,
}

impl std::fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskErrorKind::Handler => write!(f, "handler"),
            TaskErrorKind::Timeout => write!(f, "timeout"),
            TaskErrorKind::WorkerCrash => write!(f, "worker_crash"),
            TaskErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A recovered per-task failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    /// Task being handled; absent when a crash happened outside any task.
    pub task_id: Option<TaskId>,
    pub worker_id: String,
    pub kind: TaskErrorKind,
    pub reason: String,
}

impl TaskError {
    pub fn new(task_id: &str, worker_id: &str, kind: TaskErrorKind, reason: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.to_string()),
            worker_id: worker_id.to_string(),
            kind,
            reason: reason.into(),
        }
    }

    pub fn timeout(task_id: &str, worker_id: &str, limit: Duration) -> Self {
        Self::new(
            task_id,
            worker_id,
            TaskErrorKind::Timeout,
            format!("timed out after {}s", limit.as_secs_f64()),
        )
    }

    pub fn crash(task_id: Option<&str>, worker_id: &str, reason: impl Into<String>) -> Self {
        Self {
            task_id: task_id.map(str::to_string),
            worker_id: worker_id.to_string(),
            kind: TaskErrorKind::WorkerCrash,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.task_id {
            Some(id) => write!(f, "[{}] {} {}: {}", self.kind, self.worker_id, id, self.reason),
            None => write!(f, "[{}] {}: {}", self.kind, self.worker_id, self.reason),
        }
    }
}

/// Outcome of one worker's task loop within one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub worker_id: String,
    pub tasks_attempted: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    #[serde(default)]
    pub errors: Vec<TaskError>,
    /// Wall-clock time spent in the loop
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl WorkerResult {
    pub fn new(worker_id: &str) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            tasks_attempted: 0,
            tasks_completed: 0,
            tasks_failed: 0,
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn begin_task(&mut self) {
        self.tasks_attempted += 1;
    }

    pub fn record_success(&mut self) {
        self.tasks_completed += 1;
    }

    pub fn record_failure(&mut self, error: TaskError) {
        self.tasks_failed += 1;
        self.errors.push(error);
    }

    pub fn is_clean(&self) -> bool {
        self.tasks_failed == 0 && self.errors.is_empty()
    }
}

/// Execution record of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRun {
    pub phase: String,
    pub parallel: bool,
    pub worker_results: Vec<WorkerResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Estimated duration carried over from the phase definition
    pub eta_hours: f64,
}

impl PhaseRun {
    pub fn tasks_attempted(&self) -> usize {
        self.worker_results.iter().map(|r| r.tasks_attempted).sum()
    }

    pub fn tasks_completed(&self) -> usize {
        self.worker_results.iter().map(|r| r.tasks_completed).sum()
    }

    pub fn tasks_failed(&self) -> usize {
        self.worker_results.iter().map(|r| r.tasks_failed).sum()
    }

    pub fn errors(&self) -> impl Iterator<Item = &TaskError> {
        self.worker_results.iter().flat_map(|r| r.errors.iter())
    }

    pub fn worker_result(&self, worker_id: &str) -> Option<&WorkerResult> {
        self.worker_results.iter().find(|r| r.worker_id == worker_id)
    }

    pub fn duration(&self) -> Duration {
        (self.completed_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Timer for measuring execution duration.
pub struct ExecutionTimer {
    start: Instant,
}

impl ExecutionTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Duration as whole milliseconds.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase_run(results: Vec<WorkerResult>) -> PhaseRun {
        let now = Utc::now();
        PhaseRun {
            phase: "Code Cleanup".into(),
            parallel: true,
            worker_results: results,
            started_at: now,
            completed_at: now + chrono::Duration::milliseconds(250),
            eta_hours: 168.0,
        }
    }

    #[test]
    fn test_worker_result_counters() {
        let mut result = WorkerResult::new("qa");
        result.begin_task();
        result.record_success();
        result.begin_task();
        result.record_failure(TaskError::new("T2", "qa", TaskErrorKind::Handler, "boom"));

        assert_eq!(result.tasks_attempted, 2);
        assert_eq!(result.tasks_completed, 1);
        assert_eq!(result.tasks_failed, 1);
        assert!(!result.is_clean());
    }

    #[test]
    fn test_phase_run_totals() {
        let mut a = WorkerResult::new("qa");
        a.tasks_attempted = 3;
        a.tasks_completed = 2;
        a.tasks_failed = 1;
        let mut b = WorkerResult::new("devops");
        b.tasks_attempted = 1;
        b.tasks_completed = 1;

        let run = phase_run(vec![a, b]);
        assert_eq!(run.tasks_attempted(), 4);
        assert_eq!(run.tasks_completed(), 3);
        assert_eq!(run.tasks_failed(), 1);
        assert_eq!(run.duration(), Duration::from_millis(250));
        assert!(run.worker_result("devops").is_some());
    }

    #[test]
    fn test_task_error_display() {
        let err = TaskError::timeout("T1", "qa", Duration::from_secs(2));
        assert_eq!(err.to_string(), "[timeout] qa T1: timed out after 2s");

        let crash = TaskError::crash(None, "qa", "panicked");
        assert_eq!(crash.to_string(), "[worker_crash] qa: panicked");
    }

    #[test]
    fn test_worker_result_serialization() {
        let mut result = WorkerResult::new("qa");
        result.duration = Duration::from_millis(1500);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["duration"], 1500);

        let parsed: WorkerResult = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_timer_elapsed() {
        let timer = ExecutionTimer::start();
        assert!(timer.elapsed() < Duration::from_secs(5));
    }
}
