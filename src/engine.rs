//! Run invocation surface.
//!
//! [`Engine::run`] validates everything up front (options, phase graph,
//! worker references) and returns a [`ConfigurationError`] before any worker
//! executes if something is wrong. Past that point the run always completes
//! and returns a [`RunReport`]: task failures, timeouts and worker crashes
//! are recorded in the report, never raised.
//!
//! Phases run strictly one after another in resolved order. The run-level
//! cancellation token is checked between phases and between tasks; phases
//! not yet started when it fires are listed as skipped, and only then is the
//! report marked cancelled.

use crate::aggregator::{Aggregator, RunReport};
use crate::catalog::{TaskCatalog, TaskId, TaskStatus};
use crate::config::{EngineConfig, UnmatchedPolicy};
use crate::dag::PhasePlan;
use crate::dispatcher::Dispatcher;
use crate::errors::ConfigurationError;
use crate::phase::Phase;
use crate::registry::WorkerRegistry;
use crate::sink::{IntegrationSink, TracingSink};
use crate::worker::Discovery;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

/// Worker id used for records the engine itself sends to the sink.
pub const ENGINE_WORKER_ID: &str = "conductor";

/// Progress events emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    RunStarted {
        run_id: String,
        phases: Vec<String>,
        tasks: usize,
    },
    PhaseStarted {
        phase: String,
        index: usize,
        total: usize,
        workers: Vec<String>,
        parallel: bool,
    },
    TaskFinished {
        phase: String,
        worker_id: String,
        task_id: TaskId,
        title: String,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workflow: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    PhaseCompleted {
        phase: String,
        completed: usize,
        failed: usize,
        duration_ms: u64,
    },
    PhaseSkipped {
        phase: String,
    },
    RunCompleted {
        completed: usize,
        failed: usize,
        success_rate: f64,
        cancelled: bool,
    },
}

/// Coordinates phases, workers and the sink for one or more runs.
pub struct Engine {
    config: EngineConfig,
    registry: Arc<WorkerRegistry>,
    sink: Arc<dyn IntegrationSink>,
    cancel: CancellationToken,
    event_tx: Option<mpsc::Sender<EngineEvent>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("workers", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder(registry: WorkerRegistry) -> EngineBuilder {
        EngineBuilder::new(registry)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Token that cancels runs started by this engine.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Validate phases against this engine and resolve their order.
    pub fn plan(&self, phases: &[Phase]) -> Result<PhasePlan, ConfigurationError> {
        self.config.validate()?;
        let plan = PhasePlan::from_phases(phases)?;

        for phase in phases {
            let mut seen = HashSet::new();
            for worker in &phase.workers {
                if !self.registry.contains(worker) {
                    return Err(ConfigurationError::UnknownWorker {
                        phase: phase.name.clone(),
                        worker: worker.clone(),
                    });
                }
                if !seen.insert(worker.as_str()) {
                    return Err(ConfigurationError::invalid_option(
                        "workers",
                        format!("phase '{}' lists worker '{}' more than once", phase.name, worker),
                    ));
                }
            }
        }

        Ok(plan)
    }

    /// Execute every phase in resolved order and return the final report.
    pub async fn run(
        &self,
        phases: &[Phase],
        catalog: Arc<TaskCatalog>,
    ) -> Result<RunReport, ConfigurationError> {
        let plan = self.plan(phases)?;
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);

        Ok(self.execute(plan, catalog, run_id).instrument(span).await)
    }

    async fn execute(&self, plan: PhasePlan, catalog: Arc<TaskCatalog>, run_id: String) -> RunReport {
        let order = plan.order_names();
        info!(phases = order.len(), tasks = catalog.len(), "run started");
        self.emit_event(EngineEvent::RunStarted {
            run_id: run_id.clone(),
            phases: order.clone(),
            tasks: catalog.len(),
        })
        .await;

        let mut dispatcher = Dispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.sink),
            self.cancel.clone(),
        );
        if let Some(tx) = &self.event_tx {
            dispatcher = dispatcher.with_event_channel(tx.clone());
        }

        let mut aggregator = Aggregator::new();
        let mut skipped = Vec::new();
        let mut cancelled = false;
        let total = plan.len();

        for (index, phase) in plan.ordered_phases().enumerate() {
            if self.cancel.is_cancelled() {
                if !cancelled {
                    warn!(phase = %phase.name, "run cancelled, skipping remaining phases");
                    cancelled = true;
                }
                skipped.push(phase.name.clone());
                self.emit_event(EngineEvent::PhaseSkipped {
                    phase: phase.name.clone(),
                })
                .await;
                continue;
            }

            let settings = self.config.phase_settings(&phase.name);
            info!(
                phase = %phase.name,
                workers = ?phase.workers,
                parallel = phase.parallel,
                quota = settings.task_quota,
                "phase started"
            );
            self.emit_event(EngineEvent::PhaseStarted {
                phase: phase.name.clone(),
                index,
                total,
                workers: phase.workers.clone(),
                parallel: phase.parallel,
            })
            .await;

            let run = match dispatcher
                .run_phase(phase, &catalog, settings)
                .instrument(info_span!("phase", name = %phase.name))
                .await
            {
                Ok(run) => run,
                // Worker ids were validated by `plan`, so this only fires if
                // the registry and plan disagree.
                Err(e) => {
                    error!(phase = %phase.name, error = %e, "phase could not start, skipping it");
                    skipped.push(phase.name.clone());
                    continue;
                }
            };

            info!(
                phase = %phase.name,
                completed = run.tasks_completed(),
                failed = run.tasks_failed(),
                "phase completed"
            );
            self.emit_event(EngineEvent::PhaseCompleted {
                phase: phase.name.clone(),
                completed: run.tasks_completed(),
                failed: run.tasks_failed(),
                duration_ms: run.duration().as_millis() as u64,
            })
            .await;

            aggregator.fold(&run);
        }

        let mut report = aggregator.finish(&catalog, &self.registry, self.config.unmatched);
        report.run_id = Some(run_id);
        report.cancelled = cancelled;
        report.skipped_phases = skipped;

        self.report_unassigned(&catalog, &report).await;

        info!(
            completed = report.total_tasks_completed,
            failed = report.total_tasks_failed,
            success_rate = report.success_rate,
            "run completed"
        );
        self.emit_event(EngineEvent::RunCompleted {
            completed: report.total_tasks_completed,
            failed: report.total_tasks_failed,
            success_rate: report.success_rate,
            cancelled: report.cancelled,
        })
        .await;

        report
    }

    async fn report_unassigned(&self, catalog: &TaskCatalog, report: &RunReport) {
        if report.unassigned.is_empty() {
            return;
        }

        match self.config.unmatched {
            UnmatchedPolicy::Warn => {
                warn!(tasks = ?report.unassigned, "tasks match no registered worker");
            }
            UnmatchedPolicy::Escalate => {
                for id in &report.escalated {
                    let title = catalog.get(id).map(|t| t.title.as_str()).unwrap_or("");
                    error!(task = %id, title = %title, "escalating unassigned task");
                    let discovery = Discovery::new(
                        format!("Unassigned task escalated: {}", title),
                        "no registered worker carries any of this task's labels",
                    )
                    .for_task(id);
                    if let Err(e) = self.sink.record_discovery(ENGINE_WORKER_ID, &discovery).await {
                        warn!(task = %id, error = %e, "sink rejected escalation");
                    }
                }
            }
        }
    }

    async fn emit_event(&self, event: EngineEvent) {
        if let Some(ref tx) = self.event_tx {
            tx.send(event).await.ok();
        }
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    registry: WorkerRegistry,
    sink: Arc<dyn IntegrationSink>,
    cancel: CancellationToken,
    event_tx: Option<mpsc::Sender<EngineEvent>>,
}

impl EngineBuilder {
    pub fn new(registry: WorkerRegistry) -> Self {
        Self {
            config: EngineConfig::default(),
            registry,
            sink: Arc::new(TracingSink),
            cancel: CancellationToken::new(),
            event_tx: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn IntegrationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_event_channel(mut self, tx: mpsc::Sender<EngineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Validate options and build the engine.
    pub fn build(self) -> Result<Engine, ConfigurationError> {
        self.config.validate()?;
        Ok(Engine {
            config: self.config,
            registry: Arc::new(self.registry),
            sink: self.sink,
            cancel: self.cancel,
            event_tx: self.event_tx,
        })
    }
}

/// Run `phases` with default options and a tracing-only sink.
pub async fn run(
    phases: &[Phase],
    catalog: Arc<TaskCatalog>,
    registry: WorkerRegistry,
) -> Result<RunReport, ConfigurationError> {
    Engine::builder(registry).build()?.run(phases, catalog).await
}
