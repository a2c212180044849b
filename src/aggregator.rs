//! Run-level aggregation.
//!
//! [`fold`] merges one [`PhaseRun`] into a [`RunReport`]. It is a pure
//! function of its inputs: counts are sums, per-worker contributions live in
//! an ordered map, and the success rate is recomputed from the totals. Folding
//! the same phase runs into a fresh report therefore always yields an
//! identical report.
//!
//! [`Aggregator`] is the single-writer accumulator the engine drives after
//! each phase barrier; [`Aggregator::finish`] adds the catalog-derived fields
//! once every phase has run.

use crate::catalog::{TaskCatalog, TaskId, TaskStatus};
use crate::config::UnmatchedPolicy;
use crate::matcher::unassigned_tasks;
use crate::registry::WorkerRegistry;
use crate::state::{PhaseRun, TaskError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The terminal artifact of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub phases: Vec<PhaseRun>,
    pub total_tasks_attempted: usize,
    pub total_tasks_completed: usize,
    pub total_tasks_failed: usize,
    /// Completed tasks per worker id
    pub per_worker_contribution: BTreeMap<String, usize>,
    /// Percentage of attempted tasks that completed; 100 when none were attempted
    pub success_rate: f64,
    /// Sum of the folded phases' estimates, in hours
    pub total_duration_estimate_hours: f64,
    #[serde(default)]
    pub errors: Vec<TaskError>,
    /// Tasks no registered worker can handle
    #[serde(default)]
    pub unassigned: Vec<TaskId>,
    /// Tasks some worker could handle but nobody attempted
    #[serde(default)]
    pub unprocessed: Vec<TaskId>,
    /// Unassigned tasks escalated under `UnmatchedPolicy::Escalate`
    #[serde(default)]
    pub escalated: Vec<TaskId>,
    #[serde(default)]
    pub task_statuses: BTreeMap<TaskId, TaskStatus>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub skipped_phases: Vec<String>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            run_id: None,
            phases: Vec::new(),
            total_tasks_attempted: 0,
            total_tasks_completed: 0,
            total_tasks_failed: 0,
            per_worker_contribution: BTreeMap::new(),
            success_rate: 100.0,
            total_duration_estimate_hours: 0.0,
            errors: Vec::new(),
            unassigned: Vec::new(),
            unprocessed: Vec::new(),
            escalated: Vec::new(),
            task_statuses: BTreeMap::new(),
            cancelled: false,
            skipped_phases: Vec::new(),
        }
    }
}

impl RunReport {
    /// Number of phases that ran.
    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    pub fn has_failures(&self) -> bool {
        self.total_tasks_failed > 0
    }
}

/// `completed / (completed + failed)` as a percentage.
pub fn success_rate(completed: usize, failed: usize) -> f64 {
    let finished = completed + failed;
    if finished == 0 {
        100.0
    } else {
        completed as f64 / finished as f64 * 100.0
    }
}

/// Merge one phase run into a report.
pub fn fold(mut report: RunReport, run: &PhaseRun) -> RunReport {
    for result in &run.worker_results {
        report.total_tasks_attempted += result.tasks_attempted;
        report.total_tasks_completed += result.tasks_completed;
        report.total_tasks_failed += result.tasks_failed;
        *report
            .per_worker_contribution
            .entry(result.worker_id.clone())
            .or_insert(0) += result.tasks_completed;
        report.errors.extend(result.errors.iter().cloned());
    }

    report.total_duration_estimate_hours += run.eta_hours;
    report.success_rate = success_rate(report.total_tasks_completed, report.total_tasks_failed);
    report.phases.push(run.clone());
    report
}

/// Fold every run into a fresh report.
pub fn fold_all<'a, I>(runs: I) -> RunReport
where
    I: IntoIterator<Item = &'a PhaseRun>,
{
    runs.into_iter().fold(RunReport::default(), fold)
}

/// Owns the report while a run is in flight.
#[derive(Debug, Default)]
pub struct Aggregator {
    report: RunReport,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a phase that has crossed its barrier.
    pub fn fold(&mut self, run: &PhaseRun) {
        self.report = fold(std::mem::take(&mut self.report), run);
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Close the report with end-of-run catalog state.
    pub fn finish(
        self,
        catalog: &TaskCatalog,
        registry: &WorkerRegistry,
        policy: UnmatchedPolicy,
    ) -> RunReport {
        let mut report = self.report;

        let unassigned = unassigned_tasks(catalog, registry);
        report.unprocessed = catalog
            .ids_with_status(TaskStatus::Pending)
            .into_iter()
            .filter(|id| !unassigned.contains(id))
            .collect();
        report.escalated = match policy {
            UnmatchedPolicy::Escalate => unassigned.clone(),
            UnmatchedPolicy::Warn => Vec::new(),
        };
        report.unassigned = unassigned;
        report.task_statuses = catalog.statuses();
        report
    }
}
