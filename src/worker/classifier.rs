//! Task classification strategy.
//!
//! A classifier picks the named procedure a worker follows for a task. The
//! built-in [`KeywordClassifier`] inspects the lowercased task title and
//! returns the first route with a matching keyword, in the order the routes
//! were declared. A title that matches several routes (e.g. one mentioning
//! both "performance" and "security") always resolves to the earliest
//! declared one.

use serde::{Deserialize, Serialize};

/// Strategy for selecting a workflow from a task title.
pub trait Classifier: Send + Sync {
    fn classify(&self, title: &str) -> SelectedWorkflow;
}

/// The workflow chosen for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedWorkflow {
    pub name: String,
    pub steps: Vec<String>,
}

/// A named procedure plus the title keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRoute {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub steps: Vec<String>,
}

impl WorkflowRoute {
    pub fn new(name: &str, keywords: &[&str], steps: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn matches(&self, lowered_title: &str) -> bool {
        self.keywords.iter().any(|k| lowered_title.contains(k.as_str()))
    }

    fn selected(&self) -> SelectedWorkflow {
        SelectedWorkflow {
            name: self.name.clone(),
            steps: self.steps.clone(),
        }
    }
}

/// First-match-wins substring classifier with a fallback route.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    routes: Vec<WorkflowRoute>,
    fallback: WorkflowRoute,
}

impl KeywordClassifier {
    pub fn new(routes: Vec<WorkflowRoute>, fallback_steps: &[&str]) -> Self {
        Self {
            routes,
            fallback: WorkflowRoute::new("general", &[], fallback_steps),
        }
    }

    pub fn routes(&self) -> &[WorkflowRoute] {
        &self.routes
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, title: &str) -> SelectedWorkflow {
        let lowered = title.to_lowercase();
        self.routes
            .iter()
            .find(|route| route.matches(&lowered))
            .unwrap_or(&self.fallback)
            .selected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::new(
            vec![
                WorkflowRoute::new("performance", &["performance", "memory"], &["profile"]),
                WorkflowRoute::new("security", &["security", "vulnerability"], &["scan"]),
            ],
            &["analyze", "execute"],
        )
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let selected = classifier().classify("Memory Leak Detection");
        assert_eq!(selected.name, "performance");
        assert_eq!(selected.steps, vec!["profile"]);
    }

    #[test]
    fn test_first_declared_route_wins() {
        let selected = classifier().classify("Performance and Security Review");
        assert_eq!(selected.name, "performance");
    }

    #[test]
    fn test_fallback_route() {
        let selected = classifier().classify("Backup & Recovery Validation");
        assert_eq!(selected.name, "general");
        assert_eq!(selected.steps.len(), 2);
    }
}
