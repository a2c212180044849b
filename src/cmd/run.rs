//! Workflow execution: `conductor run`.

use anyhow::{Context, Result, bail};
use conductor::catalog::TaskCatalog;
use conductor::engine::{Engine, EngineEvent};
use conductor::phase::load_workflow_or_default;
use conductor::registry::WorkerRegistry;
use conductor::sink::{FanoutSink, IntegrationSink, JsonlSink, TracingSink};
use conductor::ui::{RunUI, UiMode, render_report};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::super::{Cli, OutputFormat, RunArgs};
use super::load_engine_config;

pub async fn cmd_run(cli: &Cli, project_dir: &Path, args: &RunArgs) -> Result<()> {
    let mut config = load_engine_config(cli, project_dir)?;
    if let Some(quota) = args.quota {
        config = config.with_task_quota(quota);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_task_timeout(Duration::from_secs(secs));
    }
    if let Some(policy) = args.unmatched {
        config = config.with_unmatched(policy);
    }

    let phases = load_workflow_or_default(args.workflow.as_deref())?;
    let catalog = Arc::new(TaskCatalog::load(&args.catalog)?);

    let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
    if let Some(path) = &args.sink_file {
        let jsonl = JsonlSink::open(path)
            .with_context(|| format!("Failed to open sink file: {}", path.display()))?;
        sink = sink.with(Arc::new(jsonl));
    }
    let sink: Arc<dyn IntegrationSink> = Arc::new(sink);

    let cancel = CancellationToken::new();
    let (event_tx, mut event_rx) = mpsc::channel::<EngineEvent>(100);

    let engine = Engine::builder(WorkerRegistry::specialists()?)
        .with_config(config)
        .with_sink(sink)
        .with_cancel_token(cancel.clone())
        .with_event_channel(event_tx)
        .build()?;

    let ui = Arc::new(RunUI::new(phases.len(), args.ui, cli.verbose));
    let ui_clone = Arc::clone(&ui);
    let display_handle = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            ui_clone.handle_event(&event);
        }
    });

    let ctrl_c_cancel = cancel.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight tasks");
            ctrl_c_cancel.cancel();
        }
    });

    let result = engine.run(&phases, catalog).await;

    // Dropping the engine closes the event channel so the display task drains and exits.
    drop(engine);
    let _ = display_handle.await;
    ctrl_c_handle.abort();
    ui.finish();

    let report = result?;

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            if args.ui != UiMode::Json {
                println!();
            }
            print!("{}", render_report(&report));
        }
    }

    if report.cancelled {
        bail!("Run cancelled");
    }
    if report.has_failures() {
        bail!("{} task(s) failed", report.total_tasks_failed);
    }

    Ok(())
}
