//! `conductor workers`

use anyhow::Result;
use conductor::registry::WorkerRegistry;
use console::style;

pub fn cmd_workers() -> Result<()> {
    let registry = WorkerRegistry::specialists()?;

    println!();
    println!("{}", style("Registered workers").bold());
    println!("------------------");
    for descriptor in registry.descriptors() {
        println!(
            "{} {:<22} {:<9} max {}",
            style(format!("{:<16}", descriptor.id)).cyan(),
            descriptor.capability_label,
            descriptor.priority.to_string(),
            descriptor.max_concurrent_tasks
        );
        if !descriptor.responsibilities.is_empty() {
            println!("  {}", style(descriptor.responsibilities.join(", ")).dim());
        }
    }
    println!();
    Ok(())
}
