//! Built-in specialist workers.
//!
//! Five specialist kinds cover the default comprehensive-analysis workflow.
//! They differ only in their capability label, static metadata and the
//! keyword routes their classifier uses to pick a procedure; the handling
//! loop is shared.
//!
//! ## Example
//!
//! ```
//! use conductor::worker::{SpecialistKind, SpecialistWorker, Worker};
//!
//! let qa = SpecialistWorker::new(SpecialistKind::Qa);
//! assert_eq!(qa.capability_label(), "Agent-QA");
//! assert_eq!(SpecialistKind::Qa.display_name(), "QA Specialist");
//! ```

use crate::catalog::Task;
use crate::registry::{Priority, WorkerDescriptor};
use crate::worker::classifier::{Classifier, KeywordClassifier, WorkflowRoute};
use crate::worker::{Discovery, TaskContext, TaskOutcome, Worker};
use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Kind of built-in specialist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistKind {
    DevOps,
    Qa,
    Refactoring,
    Documentation,
    Analysis,
}

impl SpecialistKind {
    /// All kinds in registration order.
    pub fn all() -> [SpecialistKind; 5] {
        [
            Self::DevOps,
            Self::Qa,
            Self::Refactoring,
            Self::Documentation,
            Self::Analysis,
        ]
    }

    /// Registry id for this kind.
    pub fn id(&self) -> &'static str {
        match self {
            Self::DevOps => "devops",
            Self::Qa => "qa",
            Self::Refactoring => "refactoring",
            Self::Documentation => "documentation",
            Self::Analysis => "analysis",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DevOps => "DevOps Specialist",
            Self::Qa => "QA Specialist",
            Self::Refactoring => "Refactoring Specialist",
            Self::Documentation => "Documentation Specialist",
            Self::Analysis => "Analysis Specialist",
        }
    }

    /// Tracker label that routes tasks to this kind.
    pub fn capability_label(&self) -> &'static str {
        match self {
            Self::DevOps => "Agent-DevOps",
            Self::Qa => "Agent-QA",
            Self::Refactoring => "Agent-Refactoring",
            Self::Documentation => "Agent-Documentation",
            Self::Analysis => "Agent-Analysis",
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            Self::DevOps | Self::Qa => Priority::High,
            Self::Refactoring | Self::Analysis => Priority::Critical,
            Self::Documentation => Priority::Medium,
        }
    }

    pub fn responsibilities(&self) -> Vec<&'static str> {
        match self {
            Self::DevOps => vec!["Infrastructure", "Deployment", "Monitoring", "Security"],
            Self::Qa => vec![
                "Testing",
                "Performance",
                "Quality Assurance",
                "Memory Analysis",
            ],
            Self::Refactoring => vec![
                "Code Cleanup",
                "Redundancy Removal",
                "Architecture Optimization",
            ],
            Self::Documentation => vec![
                "Documentation Audit",
                "API Documentation",
                "Technical Writing",
            ],
            Self::Analysis => vec!["Codebase Analysis", "Metrics Generation", "Reporting"],
        }
    }

    /// Keyword routes, in first-match-wins order.
    pub fn routes(&self) -> Vec<WorkflowRoute> {
        match self {
            Self::DevOps => vec![
                WorkflowRoute::new(
                    "infrastructure_audit",
                    &["infrastructure", "audit", "backup", "recovery"],
                    &[
                        "Inventory production resources",
                        "Check backup and recovery procedures",
                        "Report infrastructure risks",
                    ],
                ),
                WorkflowRoute::new(
                    "pipeline_optimization",
                    &["ci/cd", "pipeline", "build", "deploy"],
                    &[
                        "Measure pipeline stage timings",
                        "Add quality gates",
                        "Tune deployment steps",
                    ],
                ),
                WorkflowRoute::new(
                    "monitoring_setup",
                    &["monitoring", "alerting", "observability"],
                    &[
                        "Define service health signals",
                        "Configure alert routing",
                        "Verify alerts fire end to end",
                    ],
                ),
                WorkflowRoute::new(
                    "security_review",
                    &["security", "vulnerability", "environment"],
                    &[
                        "Scan dependencies for advisories",
                        "Review environment configuration",
                        "File remediation items",
                    ],
                ),
            ],
            Self::Qa => vec![
                WorkflowRoute::new(
                    "test_coverage_analysis",
                    &["coverage", "test"],
                    &[
                        "Measure current coverage",
                        "Identify uncovered critical paths",
                        "Plan and add missing tests",
                    ],
                ),
                WorkflowRoute::new(
                    "performance_analysis",
                    &["performance", "memory"],
                    &[
                        "Profile runtime and memory usage",
                        "Identify bottlenecks and leaks",
                        "Establish regression baselines",
                    ],
                ),
                WorkflowRoute::new(
                    "e2e_testing_setup",
                    &["e2e", "playwright"],
                    &[
                        "Define critical user journeys",
                        "Set up end-to-end harness",
                        "Wire suite into CI",
                    ],
                ),
            ],
            Self::Refactoring => vec![
                WorkflowRoute::new(
                    "redundancy_elimination",
                    &["redundancy", "duplicate", "elimination"],
                    &[
                        "Scan for exact and near duplicates",
                        "Plan safe removal",
                        "Remove and re-run tests",
                    ],
                ),
                WorkflowRoute::new(
                    "component_refactoring",
                    &["component", "splitting", "refactor"],
                    &[
                        "Find oversized components",
                        "Extract sub-components",
                        "Update tests for split components",
                    ],
                ),
                WorkflowRoute::new(
                    "architecture_optimization",
                    &["architecture", "pattern"],
                    &[
                        "Review current layering",
                        "Apply improvements incrementally",
                        "Record architectural decisions",
                    ],
                ),
            ],
            Self::Documentation => vec![
                WorkflowRoute::new(
                    "documentation_comprehensive_audit",
                    &["audit", "accuracy", "review"],
                    &[
                        "Catalog documentation files",
                        "Validate content against code",
                        "Flag obsolete and broken content",
                    ],
                ),
                WorkflowRoute::new(
                    "api_documentation_generation",
                    &["api", "generation", "interfaces"],
                    &[
                        "Extract interfaces and endpoints",
                        "Generate reference pages",
                        "Link reference into docs index",
                    ],
                ),
                WorkflowRoute::new(
                    "content_consolidation",
                    &["consolidation", "redundancy", "merge"],
                    &[
                        "Find overlapping content",
                        "Plan consolidation and redirects",
                        "Merge and validate",
                    ],
                ),
            ],
            Self::Analysis => vec![
                WorkflowRoute::new(
                    "comprehensive_codebase_analysis",
                    &["codebase", "structure", "mapping"],
                    &[
                        "Map project structure",
                        "Build dependency graph",
                        "Report complexity hot spots",
                    ],
                ),
                WorkflowRoute::new(
                    "performance_bottleneck_analysis",
                    &["performance", "bottleneck", "optimization"],
                    &[
                        "Profile hot paths",
                        "Rank bottlenecks",
                        "Draft optimization roadmap",
                    ],
                ),
                WorkflowRoute::new(
                    "project_health_assessment",
                    &["health", "metrics", "assessment"],
                    &[
                        "Collect project metrics",
                        "Assess technical debt trends",
                        "Publish health summary",
                    ],
                ),
            ],
        }
    }

    /// Steps followed when no route matches.
    pub fn fallback_steps(&self) -> &'static [&'static str] {
        match self {
            Self::DevOps => &["Assess current setup", "Apply changes", "Verify environment"],
            Self::Qa => &["Analyze requirements", "Execute testing", "Validate results"],
            Self::Refactoring => &[
                "Analyze code structure",
                "Plan refactoring",
                "Execute changes",
                "Validate results",
            ],
            Self::Documentation => &[
                "Analyze documentation",
                "Identify improvements",
                "Execute changes",
                "Validate quality",
            ],
            Self::Analysis => &[
                "Collect data",
                "Analyze patterns",
                "Generate insights",
                "Create recommendations",
            ],
        }
    }

    pub fn default_classifier(&self) -> KeywordClassifier {
        KeywordClassifier::new(self.routes(), self.fallback_steps())
    }
}

impl std::fmt::Display for SpecialistKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for SpecialistKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "devops" | "dev-ops" => Ok(Self::DevOps),
            "qa" => Ok(Self::Qa),
            "refactoring" => Ok(Self::Refactoring),
            "documentation" | "docs" => Ok(Self::Documentation),
            "analysis" => Ok(Self::Analysis),
            _ => anyhow::bail!(
                "Unknown specialist '{}'. Valid values: devops, qa, refactoring, documentation, analysis",
                s
            ),
        }
    }
}

/// A specialist worker driven by a pluggable classifier.
#[derive(Clone)]
pub struct SpecialistWorker {
    kind: SpecialistKind,
    label: String,
    classifier: Arc<dyn Classifier>,
    step_delay: Duration,
}

impl SpecialistWorker {
    pub fn new(kind: SpecialistKind) -> Self {
        Self {
            kind,
            label: kind.capability_label().to_string(),
            classifier: Arc::new(kind.default_classifier()),
            step_delay: Duration::ZERO,
        }
    }

    /// Replace the workflow classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Override the capability label (e.g. to match a different tracker's labels).
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Pause between workflow steps; zero by default.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn kind(&self) -> SpecialistKind {
        self.kind
    }

    /// Registry metadata for this worker.
    pub fn descriptor(&self) -> WorkerDescriptor {
        WorkerDescriptor::new(self.kind.id(), &self.label, self.kind.priority())
            .with_responsibilities(self.kind.responsibilities())
    }

    async fn run_step(&self, step: &str, ctx: &TaskContext) -> anyhow::Result<()> {
        if ctx.is_cancelled() {
            bail!("cancelled before step '{}'", step);
        }
        if self.step_delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(self.step_delay) => Ok(()),
            _ = ctx.cancel.cancelled() => bail!("cancelled during step '{}'", step),
        }
    }
}

#[async_trait]
impl Worker for SpecialistWorker {
    fn capability_label(&self) -> &str {
        &self.label
    }

    async fn handle(&self, task: &Task, ctx: &TaskContext) -> anyhow::Result<TaskOutcome> {
        let workflow = self.classifier.classify(&task.title);
        tracing::debug!(
            worker = %ctx.worker_id,
            task = %task.id,
            workflow = %workflow.name,
            "selected workflow"
        );

        let mut steps = Vec::with_capacity(workflow.steps.len() + 2);

        // Refactoring brackets every workflow with a safety check and a validation pass.
        if self.kind == SpecialistKind::Refactoring {
            let step = "Safety checks: rollback branch, dependency check, test baseline";
            self.run_step(step, ctx).await?;
            steps.push(step.to_string());
        }

        for step in &workflow.steps {
            self.run_step(step, ctx).await?;
            steps.push(step.clone());
        }

        if self.kind == SpecialistKind::Refactoring {
            let step = "Validation: build, tests, behaviour regressions";
            self.run_step(step, ctx).await?;
            steps.push(step.to_string());
        }

        let summary = format!("{} completed: {}", self.kind.display_name(), task.title);
        let discovery = Discovery::new(
            format!("{} completed: {}", self.kind.id(), task.title),
            format!("workflow {} finished {} steps", workflow.name, steps.len()),
        )
        .for_task(&task.id);

        Ok(TaskOutcome::new(workflow.name, summary)
            .with_steps(steps)
            .with_discovery(discovery))
    }
}
