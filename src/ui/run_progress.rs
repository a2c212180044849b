//! Run progress UI.
//!
//! Renders [`EngineEvent`]s as they arrive. Three output modes:
//! - `full`: header bar over all phases plus a spinner for the running phase
//! - `minimal`: one plain line per phase and per failed task
//! - `json`: one JSON event per line on stdout

use crate::engine::EngineEvent;
use crate::catalog::TaskStatus;
use crate::ui::icons::{CHECK, CROSS, RUNNING, SKIP, SPARKLE};
use console::{Term, style};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

/// Output mode for the run UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UiMode {
    #[default]
    Full,
    Minimal,
    Json,
}

pub struct RunUI {
    mode: UiMode,
    multi: MultiProgress,
    header_bar: ProgressBar,
    phase_bar: Mutex<Option<ProgressBar>>,
    verbose: bool,
    term: Term,
}

impl RunUI {
    pub fn new(total_phases: usize, mode: UiMode, verbose: bool) -> Self {
        let multi = MultiProgress::new();
        let header_bar = if mode == UiMode::Full {
            let style = ProgressStyle::default_bar()
                .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░");
            let bar = multi.add(ProgressBar::new(total_phases as u64));
            bar.set_style(style);
            bar.set_prefix("Run");
            bar.set_message("Starting...");
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            mode,
            multi,
            header_bar,
            phase_bar: Mutex::new(None),
            verbose,
            term: Term::stdout(),
        }
    }

    pub fn handle_event(&self, event: &EngineEvent) {
        match self.mode {
            UiMode::Json => self.handle_json(event),
            UiMode::Minimal => self.handle_minimal(event),
            UiMode::Full => self.handle_full(event),
        }
    }

    fn handle_json(&self, event: &EngineEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(&self.term, "{}", json);
        }
    }

    fn handle_minimal(&self, event: &EngineEvent) {
        match event {
            EngineEvent::PhaseStarted {
                phase, index, total, ..
            } => {
                let _ = writeln!(&self.term, "[{}/{}] {}", index + 1, total, phase);
            }
            EngineEvent::TaskFinished {
                worker_id,
                task_id,
                status: TaskStatus::Failed,
                error,
                ..
            } => {
                let _ = writeln!(
                    &self.term,
                    "  x {} {} ({})",
                    worker_id,
                    task_id,
                    error.as_deref().unwrap_or("failed")
                );
            }
            EngineEvent::PhaseSkipped { phase } => {
                let _ = writeln!(&self.term, "  skipped {}", phase);
            }
            EngineEvent::RunCompleted {
                completed,
                failed,
                success_rate,
                ..
            } => {
                let _ = writeln!(
                    &self.term,
                    "Done: {} completed, {} failed ({:.1}%)",
                    completed, failed, success_rate
                );
            }
            _ => {}
        }
    }

    fn handle_full(&self, event: &EngineEvent) {
        match event {
            EngineEvent::RunStarted { phases, tasks, .. } => {
                self.multi
                    .println(format!(
                        "{}Running {} phases over {} tasks",
                        SPARKLE,
                        style(phases.len()).yellow().bold(),
                        style(tasks).yellow().bold()
                    ))
                    .ok();
            }
            EngineEvent::PhaseStarted {
                phase,
                workers,
                parallel,
                ..
            } => self.on_phase_started(phase, workers, *parallel),
            EngineEvent::TaskFinished {
                worker_id,
                task_id,
                title,
                status,
                workflow,
                error,
                ..
            } => {
                if let Some(bar) = self.lock_phase_bar().as_ref() {
                    bar.inc(1);
                }
                match status {
                    TaskStatus::Done if self.verbose => {
                        self.multi
                            .println(format!(
                                "    {}{} {} {}",
                                CHECK,
                                style(worker_id).cyan(),
                                title,
                                style(format!("({})", workflow.as_deref().unwrap_or("-"))).dim()
                            ))
                            .ok();
                    }
                    TaskStatus::Failed => {
                        self.multi
                            .println(format!(
                                "    {}{} {}: {}",
                                CROSS,
                                style(worker_id).cyan(),
                                task_id,
                                style(error.as_deref().unwrap_or("failed")).red()
                            ))
                            .ok();
                    }
                    _ => {}
                }
            }
            EngineEvent::PhaseCompleted {
                phase,
                completed,
                failed,
                duration_ms,
            } => self.on_phase_completed(phase, *completed, *failed, *duration_ms),
            EngineEvent::PhaseSkipped { phase } => {
                self.header_bar.inc(1);
                self.multi
                    .println(format!("{}{}", SKIP, style(phase).dim()))
                    .ok();
            }
            EngineEvent::RunCompleted { cancelled, .. } => {
                let msg = if *cancelled { "Cancelled" } else { "Complete" };
                self.header_bar.finish_with_message(msg);
            }
        }
    }

    fn on_phase_started(&self, phase: &str, workers: &[String], parallel: bool) {
        let bar_style = ProgressStyle::default_spinner()
            .template("  {spinner:.green} {prefix:.bold} {pos} tasks {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(bar_style);
        bar.set_prefix(phase.to_string());
        bar.set_message(format!(
            "{}{} ({})",
            RUNNING,
            workers.join(", "),
            if parallel { "parallel" } else { "sequential" }
        ));
        bar.enable_steady_tick(Duration::from_millis(100));

        self.header_bar.set_message(phase.to_string());
        if let Some(previous) = self.lock_phase_bar().replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn on_phase_completed(&self, phase: &str, completed: usize, failed: usize, duration_ms: u64) {
        if let Some(bar) = self.lock_phase_bar().take() {
            bar.finish_and_clear();
        }
        self.header_bar.inc(1);

        let icon = if failed == 0 { CHECK } else { CROSS };
        self.multi
            .println(format!(
                "{}{} {} done, {} failed {}",
                icon,
                style(phase).bold(),
                style(completed).green(),
                if failed > 0 {
                    style(failed).red()
                } else {
                    style(failed).dim()
                },
                style(format!("({:.1}s)", duration_ms as f64 / 1000.0)).dim()
            ))
            .ok();
    }

    fn lock_phase_bar(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.phase_bar.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Clear any bars still on screen.
    pub fn finish(&self) {
        if let Some(bar) = self.lock_phase_bar().take() {
            bar.finish_and_clear();
        }
        if !self.header_bar.is_finished() {
            self.header_bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_ui_mode_parses_from_cli_values() {
        assert_eq!(UiMode::from_str("json", true).unwrap(), UiMode::Json);
        assert_eq!(UiMode::from_str("MINIMAL", true).unwrap(), UiMode::Minimal);
        assert!(UiMode::from_str("fancy", true).is_err());
    }

    #[test]
    fn test_events_do_not_panic_in_any_mode() {
        let events = vec![
            EngineEvent::RunStarted {
                run_id: "r".into(),
                phases: vec!["A".into()],
                tasks: 1,
            },
            EngineEvent::PhaseStarted {
                phase: "A".into(),
                index: 0,
                total: 1,
                workers: vec!["qa".into()],
                parallel: true,
            },
            EngineEvent::TaskFinished {
                phase: "A".into(),
                worker_id: "qa".into(),
                task_id: "T1".into(),
                title: "t".into(),
                status: TaskStatus::Failed,
                workflow: None,
                error: Some("boom".into()),
            },
            EngineEvent::PhaseCompleted {
                phase: "A".into(),
                completed: 0,
                failed: 1,
                duration_ms: 5,
            },
            EngineEvent::RunCompleted {
                completed: 0,
                failed: 1,
                success_rate: 0.0,
                cancelled: false,
            },
        ];

        for mode in [UiMode::Full, UiMode::Minimal, UiMode::Json] {
            let ui = RunUI::new(1, mode, true);
            for event in &events {
                ui.handle_event(event);
            }
            ui.finish();
        }
    }
}
