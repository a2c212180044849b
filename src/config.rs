//! Engine configuration.
//!
//! Options come from `conductor.toml`, then environment variables, then CLI
//! flags, each layer overriding the previous one. The result is an immutable
//! [`EngineConfig`] handed to the engine at construction.
//!
//! # Configuration File Format
//!
//! ```toml
//! [engine]
//! task_quota = 3
//! task_timeout_secs = 600
//! unmatched = "warn"
//!
//! [phases.overrides."validation*"]
//! task_quota = 5
//!
//! [phases.overrides."*cleanup"]
//! task_timeout_secs = 1800
//! ```
//!
//! Override patterns are globs matched case-insensitively against phase
//! names. When several patterns match, they apply in lexicographic pattern
//! order, so the last one wins for any option they both set.

use crate::errors::ConfigurationError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default number of tasks a worker may attempt per phase.
pub const DEFAULT_TASK_QUOTA: usize = 3;

/// Default per-task timeout in seconds (10 minutes).
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 600;

pub const CONFIG_FILE_NAME: &str = "conductor.toml";

pub const ENV_TASK_QUOTA: &str = "CONDUCTOR_TASK_QUOTA";
pub const ENV_TASK_TIMEOUT_SECS: &str = "CONDUCTOR_TASK_TIMEOUT_SECS";
pub const ENV_UNMATCHED: &str = "CONDUCTOR_UNMATCHED";

/// What to do with tasks no registered worker can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedPolicy {
    /// Log a warning and list them as unassigned.
    #[default]
    Warn,
    /// Log at error level, notify the sink and list them as escalated.
    Escalate,
}

impl std::fmt::Display for UnmatchedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnmatchedPolicy::Warn => write!(f, "warn"),
            UnmatchedPolicy::Escalate => write!(f, "escalate"),
        }
    }
}

impl FromStr for UnmatchedPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "escalate" => Ok(Self::Escalate),
            other => Err(ConfigurationError::invalid_option(
                "unmatched",
                format!("unknown policy '{}' (expected warn or escalate)", other),
            )),
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSection {
    #[serde(default = "default_task_quota")]
    pub task_quota: usize,
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    #[serde(default)]
    pub unmatched: UnmatchedPolicy,
}

fn default_task_quota() -> usize {
    DEFAULT_TASK_QUOTA
}

fn default_task_timeout_secs() -> u64 {
    DEFAULT_TASK_TIMEOUT_SECS
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            task_quota: default_task_quota(),
            task_timeout_secs: default_task_timeout_secs(),
            unmatched: UnmatchedPolicy::default(),
        }
    }
}

/// Per-phase override; unset fields fall through to `[engine]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PhaseOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_quota: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_timeout_secs: Option<u64>,
}

/// `[phases]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PhasesSection {
    #[serde(default)]
    pub overrides: BTreeMap<String, PhaseOverride>,
}

/// The complete conductor.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ConductorToml {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub phases: PhasesSection,
}

impl ConductorToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse conductor.toml")
    }

    /// Load `conductor.toml` from `dir`, or defaults if it doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize conductor.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Non-fatal problems worth showing the user.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for pattern in self.phases.overrides.keys() {
            if glob::Pattern::new(pattern).is_err() {
                warnings.push(format!("Invalid override pattern '{}'", pattern));
            }
        }

        if self.engine.task_timeout_secs > 24 * 60 * 60 {
            warnings.push(format!(
                "task_timeout_secs = {} is longer than a day",
                self.engine.task_timeout_secs
            ));
        }

        warnings
    }
}

/// Settings in effect for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSettings {
    pub task_quota: usize,
    pub task_timeout: Duration,
}

/// Immutable engine options.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub task_quota: usize,
    pub task_timeout: Duration,
    pub unmatched: UnmatchedPolicy,
    pub overrides: BTreeMap<String, PhaseOverride>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            task_quota: DEFAULT_TASK_QUOTA,
            task_timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS),
            unmatched: UnmatchedPolicy::default(),
            overrides: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml(toml: &ConductorToml) -> Self {
        Self {
            task_quota: toml.engine.task_quota,
            task_timeout: Duration::from_secs(toml.engine.task_timeout_secs),
            unmatched: toml.engine.unmatched,
            overrides: toml.phases.overrides.clone(),
        }
    }

    pub fn with_task_quota(mut self, quota: usize) -> Self {
        self.task_quota = quota;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_unmatched(mut self, policy: UnmatchedPolicy) -> Self {
        self.unmatched = policy;
        self
    }

    pub fn with_override(mut self, pattern: &str, phase_override: PhaseOverride) -> Self {
        self.overrides.insert(pattern.to_string(), phase_override);
        self
    }

    /// Apply `CONDUCTOR_*` variables from the process environment.
    pub fn with_env(self) -> std::result::Result<Self, ConfigurationError> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `CONDUCTOR_*` variables using `lookup` to read them.
    pub fn with_env_from<F>(mut self, lookup: F) -> std::result::Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TASK_QUOTA) {
            self.task_quota = raw.trim().parse().map_err(|_| {
                ConfigurationError::invalid_option(
                    "task_quota",
                    format!("{} must be a positive integer, got '{}'", ENV_TASK_QUOTA, raw),
                )
            })?;
        }
        if let Some(raw) = lookup(ENV_TASK_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ConfigurationError::invalid_option(
                    "task_timeout_secs",
                    format!(
                        "{} must be a positive integer, got '{}'",
                        ENV_TASK_TIMEOUT_SECS, raw
                    ),
                )
            })?;
            self.task_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(ENV_UNMATCHED) {
            self.unmatched = raw.parse()?;
        }
        Ok(self)
    }

    /// Reject options the engine cannot run with.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.task_quota == 0 {
            return Err(ConfigurationError::invalid_option(
                "task_quota",
                "must be at least 1",
            ));
        }
        if self.task_timeout.is_zero() {
            return Err(ConfigurationError::invalid_option(
                "task_timeout_secs",
                "must be greater than 0",
            ));
        }
        for (pattern, phase_override) in &self.overrides {
            if glob::Pattern::new(pattern).is_err() {
                return Err(ConfigurationError::invalid_option(
                    "phases.overrides",
                    format!("invalid pattern '{}'", pattern),
                ));
            }
            if phase_override.task_quota == Some(0) {
                return Err(ConfigurationError::invalid_option(
                    "task_quota",
                    format!("override '{}' must be at least 1", pattern),
                ));
            }
            if phase_override.task_timeout_secs == Some(0) {
                return Err(ConfigurationError::invalid_option(
                    "task_timeout_secs",
                    format!("override '{}' must be greater than 0", pattern),
                ));
            }
        }
        Ok(())
    }

    /// Effective settings for a phase after applying matching overrides.
    pub fn phase_settings(&self, phase_name: &str) -> PhaseSettings {
        let mut settings = PhaseSettings {
            task_quota: self.task_quota,
            task_timeout: self.task_timeout,
        };

        for (pattern, phase_override) in &self.overrides {
            if pattern_matches(pattern, phase_name) {
                if let Some(quota) = phase_override.task_quota {
                    settings.task_quota = quota;
                }
                if let Some(secs) = phase_override.task_timeout_secs {
                    settings.task_timeout = Duration::from_secs(secs);
                }
            }
        }

        settings
    }
}

/// Case-insensitive glob match of a phase name.
///
/// Supports `*`, `?` and `[...]` classes. Invalid patterns never match.
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    let options = glob::MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    glob::Pattern::new(pattern)
        .map(|p| p.matches_with(name, options))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.task_quota, 3);
        assert_eq!(config.task_timeout, Duration::from_secs(600));
        assert_eq!(config.unmatched, UnmatchedPolicy::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_file() {
        let toml = ConductorToml::parse(
            r#"
[engine]
task_quota = 5
task_timeout_secs = 30
unmatched = "escalate"

[phases.overrides."validation*"]
task_quota = 1
"#,
        )
        .unwrap();

        assert_eq!(toml.engine.task_quota, 5);
        assert_eq!(toml.engine.unmatched, UnmatchedPolicy::Escalate);

        let config = EngineConfig::from_toml(&toml);
        assert_eq!(config.task_timeout, Duration::from_secs(30));
        assert_eq!(config.phase_settings("Validation & Documentation").task_quota, 1);
        assert_eq!(config.phase_settings("Code Cleanup").task_quota, 5);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let toml = ConductorToml::parse("").unwrap();
        assert_eq!(toml, ConductorToml::default());
    }

    #[test]
    fn test_unknown_policy_is_parse_error() {
        assert!(ConductorToml::parse("[engine]\nunmatched = \"ignore\"\n").is_err());
    }

    #[test]
    fn test_env_layer_overrides_file() {
        let config = EngineConfig::default()
            .with_task_quota(5)
            .with_env_from(env(&[
                (ENV_TASK_QUOTA, "2"),
                (ENV_TASK_TIMEOUT_SECS, "45"),
                (ENV_UNMATCHED, "Escalate"),
            ]))
            .unwrap();

        assert_eq!(config.task_quota, 2);
        assert_eq!(config.task_timeout, Duration::from_secs(45));
        assert_eq!(config.unmatched, UnmatchedPolicy::Escalate);
    }

    #[test]
    fn test_env_layer_rejects_garbage() {
        let err = EngineConfig::default()
            .with_env_from(env(&[(ENV_TASK_QUOTA, "three")]))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidOption { ref option, .. } if option == "task_quota"));

        let err = EngineConfig::default()
            .with_env_from(env(&[(ENV_UNMATCHED, "shrug")]))
            .unwrap_err();
        assert!(err.to_string().contains("shrug"));
    }

    #[test]
    fn test_validate_rejects_zero_quota_and_timeout() {
        let zero_quota = EngineConfig::default().with_task_quota(0);
        assert_eq!(
            zero_quota.validate().unwrap_err(),
            ConfigurationError::invalid_option("task_quota", "must be at least 1")
        );

        let zero_timeout = EngineConfig::default().with_task_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());

        let bad_override = EngineConfig::default().with_override(
            "*",
            PhaseOverride {
                task_quota: Some(0),
                task_timeout_secs: None,
            },
        );
        assert!(bad_override.validate().is_err());
    }

    #[test]
    fn test_later_pattern_wins() {
        let config = EngineConfig::default()
            .with_override(
                "*",
                PhaseOverride {
                    task_quota: Some(2),
                    task_timeout_secs: Some(10),
                },
            )
            .with_override(
                "code*",
                PhaseOverride {
                    task_quota: Some(4),
                    task_timeout_secs: None,
                },
            );

        let settings = config.phase_settings("Code Cleanup");
        assert_eq!(settings.task_quota, 4);
        assert_eq!(settings.task_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("code*", "Code Cleanup"));
        assert!(pattern_matches("*documentation", "Validation & Documentation"));
        assert!(pattern_matches("initial ?nalysis", "Initial Analysis"));
        assert!(!pattern_matches("code", "Code Cleanup"));
        assert!(!pattern_matches("[", "anything"));
    }

    #[test]
    fn test_validate_warnings() {
        let mut toml = ConductorToml::default();
        toml.phases
            .overrides
            .insert("[".into(), PhaseOverride::default());
        toml.engine.task_timeout_secs = 90_000;
        assert_eq!(toml.validate().len(), 2);
    }

    #[test]
    fn test_load_or_default_and_save() {
        let dir = tempdir().unwrap();
        let loaded = ConductorToml::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded, ConductorToml::default());

        let mut toml = ConductorToml::default();
        toml.engine.task_quota = 7;
        let path = dir.path().join(CONFIG_FILE_NAME);
        toml.save(&path).unwrap();

        let reloaded = ConductorToml::load_or_default(dir.path()).unwrap();
        assert_eq!(reloaded.engine.task_quota, 7);
    }
}
