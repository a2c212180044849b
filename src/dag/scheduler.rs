//! Phase order resolution.
//!
//! Phases always run strictly one after another. The scheduler resolves the
//! validated graph into that single linear order with a stable Kahn sort:
//! whenever several phases are ready at once, the one declared first goes
//! first, so identical input always yields an identical order.
//!
//! The wave grouping is informational only; it shows which phases could have
//! started together and is used by `conductor plan`.

use super::builder::{DagBuilder, PhaseGraph, PhaseIndex};
use crate::errors::ConfigurationError;
use crate::phase::Phase;
use std::collections::HashSet;

/// A validated phase graph together with its resolved run order.
#[derive(Debug, Clone)]
pub struct PhasePlan {
    graph: PhaseGraph,
    order: Vec<PhaseIndex>,
}

impl PhasePlan {
    /// Validate the phases and resolve their run order.
    pub fn from_phases(phases: &[Phase]) -> Result<Self, ConfigurationError> {
        let graph = DagBuilder::new(phases.to_vec()).build()?;
        // The builder already rejected cycles, so nothing is left over.
        let (order, _) = graph.stable_sort();
        Ok(Self { graph, order })
    }

    pub fn graph(&self) -> &PhaseGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Phases in run order.
    pub fn ordered_phases(&self) -> impl Iterator<Item = &Phase> {
        self.order.iter().filter_map(|&i| self.graph.phase(i))
    }

    pub fn order_names(&self) -> Vec<String> {
        self.ordered_phases().map(|p| p.name.clone()).collect()
    }

    /// Group phases into waves whose dependencies are satisfied together.
    ///
    /// Within a wave, phases keep declaration order.
    pub fn compute_waves(&self) -> Vec<Vec<String>> {
        let mut waves = Vec::new();
        let mut done: HashSet<PhaseIndex> = HashSet::new();

        while done.len() < self.graph.len() {
            let wave: Vec<PhaseIndex> = (0..self.graph.len())
                .filter(|i| !done.contains(i) && self.graph.is_ready(*i, &done))
                .collect();
            if wave.is_empty() {
                break;
            }

            done.extend(&wave);
            waves.push(
                wave.iter()
                    .filter_map(|&i| self.graph.phase(i))
                    .map(|p| p.name.clone())
                    .collect(),
            );
        }

        waves
    }

    /// Sum of every phase's estimate, in hours.
    pub fn total_eta_hours(&self) -> f64 {
        self.graph.phases().map(|p| p.eta_hours).sum()
    }
}

/// Resolve phases into run order, failing on any structural error.
pub fn resolve_order(phases: &[Phase]) -> Result<Vec<Phase>, ConfigurationError> {
    let plan = PhasePlan::from_phases(phases)?;
    Ok(plan.ordered_phases().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(name: &str, deps: &[&str]) -> Phase {
        Phase::new(name, &["qa"], true).depends_on(deps)
    }

    fn names(phases: &[Phase]) -> Vec<&str> {
        phases.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_diamond_resolves_in_declaration_order() {
        let phases = vec![
            phase("A", &[]),
            phase("B", &["A"]),
            phase("C", &["A"]),
            phase("D", &["B", "C"]),
        ];

        let order = resolve_order(&phases).unwrap();
        assert_eq!(names(&order), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_tie_break_follows_declaration_not_name() {
        let phases = vec![
            phase("D", &["B", "C"]),
            phase("C", &["A"]),
            phase("B", &["A"]),
            phase("A", &[]),
        ];

        let order = resolve_order(&phases).unwrap();
        assert_eq!(names(&order), vec!["A", "C", "B", "D"]);
    }

    #[test]
    fn test_independent_phases_keep_declaration_order() {
        let phases = vec![phase("Z", &[]), phase("Y", &[]), phase("X", &["Z"])];
        let order = resolve_order(&phases).unwrap();
        assert_eq!(names(&order), vec!["Z", "Y", "X"]);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let phases = crate::phase::default_workflow();
        let first = resolve_order(&phases).unwrap();
        let second = resolve_order(&phases).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_every_phase_follows_its_dependencies() {
        let phases = vec![
            phase("E", &["C", "D"]),
            phase("A", &[]),
            phase("D", &["A"]),
            phase("B", &["A"]),
            phase("C", &["B"]),
        ];

        let order = resolve_order(&phases).unwrap();
        let position = |name: &str| order.iter().position(|p| p.name == name).unwrap();
        for p in &order {
            for dep in &p.depends_on {
                assert!(position(dep) < position(&p.name), "{} before {}", dep, p.name);
            }
        }
    }

    #[test]
    fn test_cycle_is_rejected() {
        let phases = vec![phase("A", &["B"]), phase("B", &["A"])];
        assert!(matches!(
            resolve_order(&phases),
            Err(ConfigurationError::Cycle { .. })
        ));
    }

    #[test]
    fn test_wave_computation_diamond() {
        let phases = vec![
            phase("A", &[]),
            phase("B", &["A"]),
            phase("C", &["A"]),
            phase("D", &["B", "C"]),
        ];

        let plan = PhasePlan::from_phases(&phases).unwrap();
        let waves = plan.compute_waves();

        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0], vec!["A"]);
        assert_eq!(waves[1], vec!["B", "C"]);
        assert_eq!(waves[2], vec!["D"]);
    }

    #[test]
    fn test_wave_computation_linear_default_workflow() {
        let plan = PhasePlan::from_phases(&crate::phase::default_workflow()).unwrap();
        let waves = plan.compute_waves();
        assert_eq!(waves.len(), 4);
        assert!(waves.iter().all(|w| w.len() == 1));
        assert_eq!(plan.order_names()[0], "Initial Analysis");
    }

    #[test]
    fn test_empty_plan() {
        let plan = PhasePlan::from_phases(&[]).unwrap();
        assert!(plan.is_empty());
        assert!(plan.compute_waves().is_empty());
        assert_eq!(plan.total_eta_hours(), 0.0);
    }
}
