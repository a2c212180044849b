//! Plain-text rendering of a [`RunReport`].

use crate::aggregator::RunReport;
use crate::dag::PhasePlan;
use crate::ui::icons::{CHECK, CLOCK, CROSS, WARN, WAVE, WORKER};
use console::style;
use std::fmt::Write;

/// Render the end-of-run summary.
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();

    let headline = if report.cancelled {
        format!("{}Run cancelled", WARN)
    } else if report.has_failures() {
        format!("{}Run finished with failures", CROSS)
    } else {
        format!("{}Run complete", CHECK)
    };
    let _ = writeln!(out, "{}", style(headline).bold());
    if let Some(run_id) = &report.run_id {
        let _ = writeln!(out, "  run id: {}", style(run_id).dim());
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", style("Phases").bold().underlined());
    for phase in &report.phases {
        let _ = writeln!(
            out,
            "  {:<32} {:>3} done  {:>3} failed  ({:.1}s)",
            phase.phase,
            phase.tasks_completed(),
            phase.tasks_failed(),
            phase.duration().as_secs_f64()
        );
    }
    for name in &report.skipped_phases {
        let _ = writeln!(out, "  {:<32} {}", name, style("skipped").dim());
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", style("Workers").bold().underlined());
    if report.per_worker_contribution.is_empty() {
        let _ = writeln!(out, "  {}", style("no tasks completed").dim());
    }
    for (worker, completed) in &report.per_worker_contribution {
        let _ = writeln!(out, "  {}{:<16} {}", WORKER, worker, completed);
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "Tasks: {} attempted, {} completed, {} failed",
        report.total_tasks_attempted,
        style(report.total_tasks_completed).green(),
        if report.total_tasks_failed > 0 {
            style(report.total_tasks_failed).red()
        } else {
            style(report.total_tasks_failed).dim()
        }
    );
    let _ = writeln!(out, "Success rate: {:.1}%", report.success_rate);
    let _ = writeln!(
        out,
        "{}Estimated duration: {}",
        CLOCK,
        format_hours(report.total_duration_estimate_hours)
    );

    if !report.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", style("Errors").bold().underlined());
        for error in &report.errors {
            let _ = writeln!(out, "  {}{}", CROSS, error);
        }
    }

    if !report.unassigned.is_empty() {
        let _ = writeln!(out);
        let label = if report.escalated.is_empty() {
            "Unassigned (no matching worker)"
        } else {
            "Escalated (no matching worker)"
        };
        let _ = writeln!(out, "{}{}: {}", WARN, label, report.unassigned.join(", "));
    }
    if !report.unprocessed.is_empty() {
        let _ = writeln!(out, "Unprocessed: {}", report.unprocessed.join(", "));
    }

    out
}

/// Render a resolved plan: order, waves and total estimate.
pub fn render_plan(plan: &PhasePlan) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", style("Execution order").bold().underlined());
    for (i, phase) in plan.ordered_phases().enumerate() {
        let mode = if phase.parallel { "parallel" } else { "sequential" };
        let _ = writeln!(
            out,
            "  {}. {} [{}] ({}, {})",
            i + 1,
            style(&phase.name).bold(),
            phase.workers.join(", "),
            mode,
            format_hours(phase.eta_hours)
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", style("Waves").bold().underlined());
    for (i, wave) in plan.compute_waves().iter().enumerate() {
        let _ = writeln!(out, "  {}{}: {}", WAVE, i + 1, wave.join(", "));
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "{}Total estimate: {}",
        CLOCK,
        format_hours(plan.total_eta_hours())
    );
    out
}

/// `36` → `1d 12h`, `5` → `5h`.
pub fn format_hours(hours: f64) -> String {
    let whole = hours.round() as u64;
    let (days, rest) = (whole / 24, whole % 24);
    match (days, rest) {
        (0, h) => format!("{}h", h),
        (d, 0) => format!("{}d", d),
        (d, h) => format!("{}d {}h", d, h),
    }
}
