//! Phase dispatcher.
//!
//! For one phase, the dispatcher runs every listed worker's task loop and
//! waits for all of them before returning the [`PhaseRun`]. Each worker runs
//! in its own tokio task: a parallel phase spawns them all and joins on the
//! set, a sequential phase spawns and awaits them one at a time in listed
//! order.
//!
//! Within a worker, tasks run strictly one after another. A task is only
//! attempted after the worker wins the `Pending -> InProgress` claim in the
//! catalog, so two workers whose labels both match a task never both run it.
//!
//! A panic inside a handler is caught at the spawn boundary. The task that
//! was in flight is marked failed with a `WorkerCrash` error; the worker's
//! remaining candidates were never attempted and stay `Pending`. Sink calls
//! are isolated the same way: an error or panic from the sink is logged and
//! the task keeps the status its handler earned.

use crate::catalog::{Task, TaskCatalog, TaskStatus};
use crate::config::PhaseSettings;
use crate::engine::EngineEvent;
use crate::errors::{ConfigurationError, SinkError};
use crate::phase::Phase;
use crate::registry::WorkerRegistry;
use crate::sink::{IntegrationSink, SinkRecord};
use crate::state::{ExecutionTimer, PhaseRun, TaskError, TaskErrorKind, WorkerResult};
use crate::worker::{TaskContext, Worker};
use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, warn};

/// Runs phases against a shared catalog.
pub struct Dispatcher {
    registry: Arc<WorkerRegistry>,
    sink: Arc<dyn IntegrationSink>,
    cancel: CancellationToken,
    event_tx: Option<mpsc::Sender<EngineEvent>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        sink: Arc<dyn IntegrationSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            sink,
            cancel,
            event_tx: None,
        }
    }

    /// Send `TaskFinished` events to `tx`.
    pub fn with_event_channel(mut self, tx: mpsc::Sender<EngineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Run one phase to its barrier.
    ///
    /// Fails only if the phase names a worker the registry doesn't know, and
    /// then before any worker starts.
    pub async fn run_phase(
        &self,
        phase: &Phase,
        catalog: &Arc<TaskCatalog>,
        settings: PhaseSettings,
    ) -> Result<PhaseRun, ConfigurationError> {
        let jobs = phase
            .workers
            .iter()
            .map(|worker_id| self.job(phase, worker_id, catalog, settings))
            .collect::<Result<Vec<_>, _>>()?;

        let started_at = Utc::now();

        let worker_results = if phase.parallel {
            let running: Vec<RunningWorker> = jobs.into_iter().map(WorkerJob::spawn).collect();
            join_all(running.into_iter().map(RunningWorker::settle)).await
        } else {
            let mut results = Vec::with_capacity(jobs.len());
            for job in jobs {
                results.push(job.spawn().settle().await);
            }
            results
        };

        Ok(PhaseRun {
            phase: phase.name.clone(),
            parallel: phase.parallel,
            worker_results,
            started_at,
            completed_at: Utc::now(),
            eta_hours: phase.eta_hours,
        })
    }

    fn job(
        &self,
        phase: &Phase,
        worker_id: &str,
        catalog: &Arc<TaskCatalog>,
        settings: PhaseSettings,
    ) -> Result<WorkerJob, ConfigurationError> {
        let entry = self
            .registry
            .get(worker_id)
            .ok_or_else(|| ConfigurationError::UnknownWorker {
                phase: phase.name.clone(),
                worker: worker_id.to_string(),
            })?;

        Ok(WorkerJob {
            label: entry.descriptor.capability_label.clone(),
            worker: Arc::clone(&entry.worker),
            catalog: Arc::clone(catalog),
            cancel: self.cancel.clone(),
            quota: settings.task_quota,
            timeout: settings.task_timeout,
            tally: Arc::new(Mutex::new(Tally::new(worker_id))),
            reporter: Reporter {
                worker_id: worker_id.to_string(),
                phase: phase.name.clone(),
                sink: Arc::clone(&self.sink),
                event_tx: self.event_tx.clone(),
            },
        })
    }
}

/// Progress of one worker loop, readable even if the loop panics.
struct Tally {
    result: WorkerResult,
    in_flight: Option<Task>,
}

impl Tally {
    fn new(worker_id: &str) -> Self {
        Self {
            result: WorkerResult::new(worker_id),
            in_flight: None,
        }
    }
}

fn lock(tally: &Mutex<Tally>) -> MutexGuard<'_, Tally> {
    tally.lock().unwrap_or_else(|e| e.into_inner())
}

/// Pushes finished tasks to the sink and the event channel.
#[derive(Clone)]
struct Reporter {
    worker_id: String,
    phase: String,
    sink: Arc<dyn IntegrationSink>,
    event_tx: Option<mpsc::Sender<EngineEvent>>,
}

impl Reporter {
    async fn task_finished(&self, task: &Task, record: SinkRecord) {
        let delivered = AssertUnwindSafe(self.sink.record(&self.worker_id, task, &record))
            .catch_unwind()
            .await;
        self.check_delivery(task, "task record", delivered);

        if let SinkRecord::Completed { outcome } = &record {
            for discovery in &outcome.discoveries {
                let delivered = AssertUnwindSafe(self.sink.record_discovery(&self.worker_id, discovery))
                    .catch_unwind()
                    .await;
                self.check_delivery(task, "discovery", delivered);
            }
        }

        if let Some(tx) = &self.event_tx {
            let (status, workflow, error) = match record {
                SinkRecord::Completed { outcome } => (TaskStatus::Done, Some(outcome.workflow), None),
                SinkRecord::Failed { error } => (TaskStatus::Failed, None, Some(error.to_string())),
            };
            tx.send(EngineEvent::TaskFinished {
                phase: self.phase.clone(),
                worker_id: self.worker_id.clone(),
                task_id: task.id.clone(),
                title: task.title.clone(),
                status,
                workflow,
                error,
            })
            .await
            .ok();
        }
    }

    /// Sink errors and sink panics are logged and never reach the task.
    fn check_delivery(
        &self,
        task: &Task,
        what: &str,
        delivered: std::thread::Result<Result<(), SinkError>>,
    ) {
        match delivered {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(worker = %self.worker_id, task = %task.id, error = %e, "sink rejected {}", what);
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!(worker = %self.worker_id, task = %task.id, reason = %reason, "sink panicked on {}", what);
            }
        }
    }
}

struct WorkerJob {
    label: String,
    worker: Arc<dyn Worker>,
    catalog: Arc<TaskCatalog>,
    cancel: CancellationToken,
    quota: usize,
    timeout: Duration,
    tally: Arc<Mutex<Tally>>,
    reporter: Reporter,
}

impl WorkerJob {
    fn spawn(self) -> RunningWorker {
        let span = info_span!("worker", worker = %self.reporter.worker_id);
        RunningWorker {
            tally: Arc::clone(&self.tally),
            catalog: Arc::clone(&self.catalog),
            reporter: self.reporter.clone(),
            timer: ExecutionTimer::start(),
            handle: tokio::spawn(self.run().instrument(span)),
        }
    }

    async fn run(self) {
        let candidates = self.catalog.candidates(&self.label);
        debug!(candidates = candidates.len(), quota = self.quota, "worker started");

        for task in candidates {
            if lock(&self.tally).result.tasks_attempted >= self.quota {
                debug!("task quota reached");
                break;
            }
            if self.cancel.is_cancelled() {
                debug!("run cancelled, leaving remaining tasks pending");
                break;
            }
            if !self.catalog.try_claim(&task.id) {
                debug!(task = %task.id, "task already claimed by another worker");
                continue;
            }

            {
                let mut tally = lock(&self.tally);
                tally.result.begin_task();
                tally.in_flight = Some(task.clone());
            }

            let record = self.handle(&task).await;

            lock(&self.tally).in_flight = None;
            self.reporter.task_finished(&task, record).await;
        }
    }

    async fn handle(&self, task: &Task) -> SinkRecord {
        let worker_id = &self.reporter.worker_id;
        let ctx = TaskContext::new(worker_id, &self.reporter.phase, self.cancel.clone());

        debug!(task = %task.id, title = %task.title, "handling task");
        let outcome = tokio::time::timeout(self.timeout, self.worker.handle(task, &ctx)).await;

        let error = match outcome {
            Ok(Ok(outcome)) => {
                self.catalog.complete(&task.id);
                lock(&self.tally).result.record_success();
                debug!(task = %task.id, workflow = %outcome.workflow, "task done");
                return SinkRecord::Completed { outcome };
            }
            Ok(Err(err)) => {
                let kind = if ctx.is_cancelled() {
                    TaskErrorKind::Cancelled
                } else {
                    TaskErrorKind::Handler
                };
                TaskError::new(&task.id, worker_id, kind, format!("{:#}", err))
            }
            Err(_) => TaskError::timeout(&task.id, worker_id, self.timeout),
        };

        self.catalog.fail(&task.id);
        debug!(task = %task.id, error = %error, "task failed");
        lock(&self.tally).result.record_failure(error.clone());
        SinkRecord::Failed { error }
    }
}

struct RunningWorker {
    tally: Arc<Mutex<Tally>>,
    catalog: Arc<TaskCatalog>,
    reporter: Reporter,
    timer: ExecutionTimer,
    handle: JoinHandle<()>,
}

impl RunningWorker {
    /// Wait for the worker loop and turn whatever happened into a result.
    async fn settle(self) -> WorkerResult {
        let joined = self.handle.await;

        let (mut result, in_flight) = {
            let mut tally = lock(&self.tally);
            let result = std::mem::replace(
                &mut tally.result,
                WorkerResult::new(&self.reporter.worker_id),
            );
            (result, tally.in_flight.take())
        };

        if let Err(join_err) = joined {
            let reason = crash_reason(join_err);
            error!(worker = %self.reporter.worker_id, reason = %reason, "worker crashed");

            let task_id = in_flight.as_ref().map(|t| t.id.as_str());
            let crash = TaskError::crash(task_id, &self.reporter.worker_id, reason);
            result.record_failure(crash.clone());

            if let Some(task) = in_flight {
                self.catalog.fail(&task.id);
                self.reporter
                    .task_finished(&task, SinkRecord::Failed { error: crash })
                    .await;
            }
        }

        result.duration = self.timer.elapsed();
        result
    }
}

fn crash_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return "worker task was cancelled".to_string();
    }
    panic_message(err.into_panic().as_ref())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}
