//! Typed error hierarchy for the conductor engine.
//!
//! Two top-level enums cover the failures that leave the engine as errors:
//! - `ConfigurationError`: fatal, raised before any worker executes
//! - `SinkError`: integration sink failures, logged and never propagated
//!
//! Per-task failures are recovered locally and recorded as
//! [`crate::state::TaskError`] values inside the run report.

use thiserror::Error;

/// Authoring mistakes in the phase graph, registry or engine options.
///
/// These abort a run before any worker starts and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Duplicate phase name: {0}")]
    DuplicatePhase(String),

    #[error("Unknown dependency '{dependency}' in phase '{phase}': no phase with that name exists")]
    UnknownDependency { phase: String, dependency: String },

    #[error("Cycle detected in phase dependencies. Involved phases: {phases:?}")]
    Cycle { phases: Vec<String> },

    #[error("Phase '{phase}' references unknown worker '{worker}'")]
    UnknownWorker { phase: String, worker: String },

    #[error("Duplicate worker id: {0}")]
    DuplicateWorker(String),

    #[error("Worker '{0}' has an empty capability label")]
    EmptyCapability(String),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("Invalid option '{option}': {message}")]
    InvalidOption { option: String, message: String },
}

impl ConfigurationError {
    /// Convenience constructor for option validation failures.
    pub fn invalid_option(option: &str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.to_string(),
            message: message.into(),
        }
    }
}

/// Failures raised by an [`crate::sink::IntegrationSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink rejected record: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_lists_phases() {
        let err = ConfigurationError::Cycle {
            phases: vec!["A".into(), "B".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Cycle"));
        assert!(msg.contains("\"A\""));
        assert!(msg.contains("\"B\""));
    }

    #[test]
    fn unknown_dependency_carries_both_names() {
        let err = ConfigurationError::UnknownDependency {
            phase: "Code Cleanup".into(),
            dependency: "Nope".into(),
        };
        match &err {
            ConfigurationError::UnknownDependency { phase, dependency } => {
                assert_eq!(phase, "Code Cleanup");
                assert_eq!(dependency, "Nope");
            }
            _ => panic!("Expected UnknownDependency"),
        }
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn invalid_option_constructor() {
        let err = ConfigurationError::invalid_option("task_quota", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid option 'task_quota': must be at least 1"
        );
    }

    #[test]
    fn sink_error_converts_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SinkError = io_err.into();
        match &err {
            SinkError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
            _ => panic!("Expected SinkError::Io"),
        }
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ConfigurationError::DuplicatePhase("x".into()));
        assert_std_error(&SinkError::Rejected("x".into()));
    }
}
