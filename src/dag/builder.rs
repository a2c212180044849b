//! Phase graph construction and structural validation.
//!
//! Every structural mistake (duplicate names, dangling dependency names,
//! cycles) is reported as a [`ConfigurationError`] before any worker runs.

use crate::errors::ConfigurationError;
use crate::phase::Phase;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Position of a phase in declaration order.
pub type PhaseIndex = usize;

#[derive(Debug, Clone)]
struct Node {
    phase: Phase,
    /// Phases that must finish before this one
    requires: Vec<PhaseIndex>,
    /// Phases waiting on this one
    unblocks: Vec<PhaseIndex>,
}

/// Validated, acyclic phase dependency graph.
#[derive(Debug, Clone)]
pub struct PhaseGraph {
    nodes: Vec<Node>,
    by_name: HashMap<String, PhaseIndex>,
}

impl PhaseGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn phase(&self, index: PhaseIndex) -> Option<&Phase> {
        self.nodes.get(index).map(|n| &n.phase)
    }

    pub fn index_of(&self, name: &str) -> Option<PhaseIndex> {
        self.by_name.get(name).copied()
    }

    /// Phases in declaration order.
    pub fn phases(&self) -> impl Iterator<Item = &Phase> {
        self.nodes.iter().map(|n| &n.phase)
    }

    pub fn requires(&self, index: PhaseIndex) -> &[PhaseIndex] {
        self.nodes.get(index).map_or(&[], |n| n.requires.as_slice())
    }

    pub fn unblocks(&self, index: PhaseIndex) -> &[PhaseIndex] {
        self.nodes.get(index).map_or(&[], |n| n.unblocks.as_slice())
    }

    /// Whether every dependency of `index` is in `done`.
    pub fn is_ready(&self, index: PhaseIndex, done: &HashSet<PhaseIndex>) -> bool {
        self.requires(index).iter().all(|dep| done.contains(dep))
    }

    /// Kahn's algorithm, always taking the lowest ready index next.
    ///
    /// Returns the sorted indices and the ones that could never be released
    /// (on or downstream of a cycle).
    pub(super) fn stable_sort(&self) -> (Vec<PhaseIndex>, Vec<PhaseIndex>) {
        let mut pending: Vec<usize> = self.nodes.iter().map(|n| n.requires.len()).collect();
        let mut ready: BinaryHeap<Reverse<PhaseIndex>> = (0..self.len())
            .filter(|&i| pending[i] == 0)
            .map(Reverse)
            .collect();

        let mut sorted = Vec::with_capacity(self.len());
        while let Some(Reverse(next)) = ready.pop() {
            sorted.push(next);
            for &waiting in self.unblocks(next) {
                pending[waiting] -= 1;
                if pending[waiting] == 0 {
                    ready.push(Reverse(waiting));
                }
            }
        }

        let stuck = (0..self.len()).filter(|&i| pending[i] > 0).collect();
        (sorted, stuck)
    }
}

/// Builds a [`PhaseGraph`] from declared phases.
pub struct DagBuilder {
    phases: Vec<Phase>,
}

impl DagBuilder {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    pub fn build(self) -> Result<PhaseGraph, ConfigurationError> {
        let mut by_name = HashMap::with_capacity(self.phases.len());
        for (i, phase) in self.phases.iter().enumerate() {
            if by_name.insert(phase.name.clone(), i).is_some() {
                return Err(ConfigurationError::DuplicatePhase(phase.name.clone()));
            }
        }

        let mut nodes: Vec<Node> = self
            .phases
            .into_iter()
            .map(|phase| Node {
                phase,
                requires: Vec::new(),
                unblocks: Vec::new(),
            })
            .collect();

        for at in 0..nodes.len() {
            for dep_name in nodes[at].phase.depends_on.clone() {
                let Some(&dep) = by_name.get(&dep_name) else {
                    return Err(ConfigurationError::UnknownDependency {
                        phase: nodes[at].phase.name.clone(),
                        dependency: dep_name,
                    });
                };
                if !nodes[at].requires.contains(&dep) {
                    nodes[at].requires.push(dep);
                    nodes[dep].unblocks.push(at);
                }
            }
        }

        let graph = PhaseGraph { nodes, by_name };

        let (_, stuck) = graph.stable_sort();
        if !stuck.is_empty() {
            let phases = stuck
                .into_iter()
                .filter_map(|i| graph.phase(i).map(|p| p.name.clone()))
                .collect();
            return Err(ConfigurationError::Cycle { phases });
        }

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(name: &str, deps: &[&str]) -> Phase {
        Phase::new(name, &["qa"], true).depends_on(deps)
    }

    fn build(phases: Vec<Phase>) -> Result<PhaseGraph, ConfigurationError> {
        DagBuilder::new(phases).build()
    }

    #[test]
    fn test_diamond_edges() {
        let graph = build(vec![
            phase("A", &[]),
            phase("B", &["A"]),
            phase("C", &["A"]),
            phase("D", &["B", "C"]),
        ])
        .unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.index_of("C"), Some(2));
        assert!(graph.requires(0).is_empty());
        assert_eq!(graph.unblocks(0), &[1, 2]);
        assert_eq!(graph.requires(3), &[1, 2]);
        assert!(graph.unblocks(3).is_empty());
    }

    #[test]
    fn test_repeated_dependency_is_one_edge() {
        let graph = build(vec![phase("A", &[]), phase("B", &["A", "A"])]).unwrap();
        assert_eq!(graph.requires(1), &[0]);
        assert_eq!(graph.unblocks(0), &[1]);
    }

    #[test]
    fn test_three_phase_cycle() {
        let err = build(vec![phase("A", &["C"]), phase("B", &["A"]), phase("C", &["B"])])
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::Cycle {
                phases: vec!["A".into(), "B".into(), "C".into()]
            }
        );
    }

    #[test]
    fn test_self_dependency() {
        let err = build(vec![phase("A", &[]), phase("B", &["B"])]).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::Cycle {
                phases: vec!["B".into()]
            }
        );
    }

    #[test]
    fn test_unknown_dependency() {
        let err = build(vec![phase("A", &["nonexistent"])]).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownDependency {
                phase: "A".into(),
                dependency: "nonexistent".into()
            }
        );
    }

    #[test]
    fn test_duplicate_name() {
        let err = build(vec![phase("A", &[]), phase("A", &[])]).unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicatePhase("A".into()));
    }

    #[test]
    fn test_empty() {
        assert!(build(vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_is_ready() {
        let graph = build(vec![phase("A", &[]), phase("B", &["A"]), phase("C", &["A", "B"])])
            .unwrap();
        let mut done = HashSet::new();

        assert!(graph.is_ready(0, &done));
        assert!(!graph.is_ready(1, &done));

        done.insert(0);
        assert!(graph.is_ready(1, &done));
        assert!(!graph.is_ready(2, &done));

        done.insert(1);
        assert!(graph.is_ready(2, &done));
    }
}
