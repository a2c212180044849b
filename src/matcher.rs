//! Capability matching between tasks and registered workers.
//!
//! Matching is a pure label-set intersection. A task that matches no worker
//! is not an error: it simply stays `Pending` and is reported as unassigned
//! at the end of the run.

use crate::catalog::{Task, TaskCatalog, TaskId};
use crate::registry::WorkerRegistry;
use std::collections::BTreeSet;

/// Ids of every worker whose capability label the task carries.
pub fn match_workers(task: &Task, registry: &WorkerRegistry) -> BTreeSet<String> {
    registry
        .descriptors()
        .filter(|d| task.has_label(&d.capability_label))
        .map(|d| d.id.clone())
        .collect()
}

/// Ids of catalog tasks no registered worker can handle, in catalog order.
pub fn unassigned_tasks(catalog: &TaskCatalog, registry: &WorkerRegistry) -> Vec<TaskId> {
    catalog
        .tasks()
        .filter(|task| match_workers(task, registry).is_empty())
        .map(|task| task.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{SpecialistKind, SpecialistWorker};

    fn registry() -> WorkerRegistry {
        WorkerRegistry::builder()
            .register_specialist(SpecialistWorker::new(SpecialistKind::DevOps).with_label("infra"))
            .register_specialist(
                SpecialistWorker::new(SpecialistKind::Documentation).with_label("docs"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_single_label_match() {
        let task = Task::new("T1", "Monitoring Setup", ["infra"], 4.0);
        let matched = match_workers(&task, &registry());
        assert_eq!(matched.into_iter().collect::<Vec<_>>(), vec!["devops"]);
    }

    #[test]
    fn test_multi_label_match() {
        let task = Task::new("T1", "Runbook", ["infra", "docs", "other"], 4.0);
        let matched = match_workers(&task, &registry());
        assert_eq!(matched.len(), 2);
        assert!(matched.contains("documentation"));
    }

    #[test]
    fn test_no_match_is_unassigned() {
        let catalog = TaskCatalog::new(vec![
            Task::new("T1", "Monitoring Setup", ["infra"], 4.0),
            Task::new("T2", "Pen Test", ["security"], 4.0),
            Task::new("T3", "Untagged", Vec::<String>::new(), 1.0),
        ])
        .unwrap();

        assert_eq!(unassigned_tasks(&catalog, &registry()), vec!["T2", "T3"]);
    }
}
