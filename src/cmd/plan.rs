//! Dry inspection commands: `conductor plan` and `conductor validate`.

use anyhow::{Context, Result};
use conductor::catalog::TaskCatalog;
use conductor::engine::Engine;
use conductor::matcher::unassigned_tasks;
use conductor::phase::load_workflow_or_default;
use conductor::registry::WorkerRegistry;
use conductor::ui::render_plan;
use std::path::Path;

use super::super::Cli;
use super::load_engine_config;

pub fn cmd_plan(workflow: Option<&Path>) -> Result<()> {
    let phases = load_workflow_or_default(workflow)?;
    let engine = Engine::builder(WorkerRegistry::specialists()?).build()?;
    let plan = engine.plan(&phases)?;

    print!("{}", render_plan(&plan));
    Ok(())
}

pub fn cmd_validate(
    cli: &Cli,
    project_dir: &Path,
    workflow: Option<&Path>,
    catalog: Option<&Path>,
) -> Result<()> {
    let config = load_engine_config(cli, project_dir)?;
    let registry = WorkerRegistry::specialists()?;
    let engine = Engine::builder(registry).with_config(config).build()?;

    let phases = load_workflow_or_default(workflow)?;
    let plan = engine.plan(&phases).context("Workflow is invalid")?;
    println!("Workflow OK: {} phases", plan.len());

    if let Some(path) = catalog {
        let catalog = TaskCatalog::load(path)?;
        println!("Catalog OK: {} tasks", catalog.len());

        let unassigned = unassigned_tasks(&catalog, engine.registry());
        if !unassigned.is_empty() {
            println!(
                "Warning: {} task(s) match no registered worker: {}",
                unassigned.len(),
                unassigned.join(", ")
            );
        }
    }

    Ok(())
}
