//! Phase definitions and workflow file loading.
//!
//! This module provides:
//! - `Phase`, a named stage naming the workers it needs and its dependencies
//! - `WorkflowFile`, the on-disk list of phases (TOML, JSON or YAML)
//! - `parse_duration_hours` for human ETA strings such as `"1-2 weeks"`
//! - `default_workflow`, the built-in comprehensive analysis workflow

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());

const HOURS_PER_DAY: f64 = 24.0;

/// A named, ordered stage of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    /// Unique phase name
    pub name: String,
    /// Worker ids, in the order sequential phases run them
    #[serde(default)]
    pub workers: Vec<String>,
    /// Run the phase's workers concurrently
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Names of phases that must finish first
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Estimated duration in hours
    #[serde(default, alias = "eta", deserialize_with = "deserialize_eta")]
    pub eta_hours: f64,
}

fn default_parallel() -> bool {
    true
}

impl Phase {
    pub fn new(name: &str, workers: &[&str], parallel: bool) -> Self {
        Self {
            name: name.to_string(),
            workers: workers.iter().map(|w| w.to_string()).collect(),
            parallel,
            depends_on: Vec::new(),
            eta_hours: 0.0,
        }
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_eta_hours(mut self, hours: f64) -> Self {
        self.eta_hours = hours;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EtaValue {
    Hours(f64),
    Text(String),
}

fn deserialize_eta<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match EtaValue::deserialize(deserializer)? {
        EtaValue::Hours(h) => h,
        EtaValue::Text(s) => parse_duration_hours(&s),
    })
}

/// Convert a human duration into hours.
///
/// Takes the first integer in the string: weeks count as 7 days, days as 24
/// hours, and a bare number as hours. Anything unparseable counts as one day.
///
/// ```
/// use conductor::phase::parse_duration_hours;
///
/// assert_eq!(parse_duration_hours("2-3 days"), 48.0);
/// assert_eq!(parse_duration_hours("1-2 weeks"), 168.0);
/// assert_eq!(parse_duration_hours("soon"), 24.0);
/// ```
pub fn parse_duration_hours(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    let Some(n) = LEADING_NUMBER
        .captures(&lowered)
        .and_then(|c| c[1].parse::<f64>().ok())
    else {
        return HOURS_PER_DAY;
    };

    if lowered.contains("week") {
        n * 7.0 * HOURS_PER_DAY
    } else if lowered.contains("day") {
        n * HOURS_PER_DAY
    } else if lowered.contains("hour") || lowered.trim().parse::<f64>().is_ok() {
        n
    } else {
        HOURS_PER_DAY
    }
}

/// On-disk workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub phases: Vec<Phase>,
}

impl WorkflowFile {
    /// Load a workflow, picking the format from the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let parsed = match ext.as_str() {
            "toml" => Self::parse_toml(&content),
            "json" => Self::parse_json(&content),
            "yaml" | "yml" => Self::parse_yaml(&content),
            other => bail!(
                "Unsupported workflow file extension '{}' (expected toml, json, yaml)",
                other
            ),
        };
        parsed.with_context(|| format!("Invalid workflow file: {}", path.display()))
    }

    pub fn parse_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse workflow TOML")
    }

    pub fn parse_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse workflow JSON")
    }

    pub fn parse_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse workflow YAML")
    }
}

/// The built-in four-phase comprehensive analysis workflow.
pub fn default_workflow() -> Vec<Phase> {
    vec![
        Phase::new("Initial Analysis", &["analysis", "documentation"], true)
            .with_eta_hours(parse_duration_hours("2-3 days")),
        Phase::new("Code Cleanup", &["refactoring", "qa"], true)
            .depends_on(&["Initial Analysis"])
            .with_eta_hours(parse_duration_hours("1-2 weeks")),
        Phase::new("Infrastructure Optimization", &["devops", "qa"], true)
            .depends_on(&["Code Cleanup"])
            .with_eta_hours(parse_duration_hours("1 week")),
        Phase::new(
            "Validation & Documentation",
            &["qa", "documentation", "analysis"],
            true,
        )
        .depends_on(&["Infrastructure Optimization"])
        .with_eta_hours(parse_duration_hours("3-5 days")),
    ]
}

/// Load phases from `path`, or fall back to [`default_workflow`].
pub fn load_workflow_or_default(path: Option<&Path>) -> Result<Vec<Phase>> {
    match path {
        Some(path) => Ok(WorkflowFile::load(path)?.phases),
        None => Ok(default_workflow()),
    }
}
