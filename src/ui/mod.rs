pub mod icons;
pub mod report;
pub mod run_progress;

pub use report::{format_hours, render_plan, render_report};
pub use run_progress::{RunUI, UiMode};
