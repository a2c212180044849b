//! Worker registry: id -> worker implementation plus static metadata.
//!
//! The registry is built once at startup through [`RegistryBuilder`] and is
//! read-only afterwards. Phases refer to workers by id; the engine resolves
//! every id through the registry and never special-cases a worker identity.

use crate::errors::ConfigurationError;
use crate::worker::{SpecialistKind, SpecialistWorker, Worker};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Scheduling priority advertised by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Critical => write!(f, "critical"),
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => anyhow::bail!(
                "Unknown priority '{}'. Valid values: critical, high, medium, low",
                s
            ),
        }
    }
}

/// Static metadata for a registered worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub id: String,
    pub capability_label: String,
    pub priority: Priority,
    /// Informational; the per-worker task loop is always sequential.
    pub max_concurrent_tasks: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responsibilities: Vec<String>,
}

impl WorkerDescriptor {
    pub fn new(id: &str, capability_label: &str, priority: Priority) -> Self {
        Self {
            id: id.to_string(),
            capability_label: capability_label.to_string(),
            priority,
            max_concurrent_tasks: 1,
            responsibilities: Vec::new(),
        }
    }

    pub fn with_max_concurrent_tasks(mut self, max: u32) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    pub fn with_responsibilities<I, S>(mut self, responsibilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responsibilities = responsibilities.into_iter().map(Into::into).collect();
        self
    }
}

/// A worker implementation paired with its descriptor.
#[derive(Clone)]
pub struct RegisteredWorker {
    pub descriptor: WorkerDescriptor,
    pub worker: Arc<dyn Worker>,
}

impl std::fmt::Debug for RegisteredWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredWorker")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Read-only worker lookup shared across all phases of a run.
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    entries: Vec<RegisteredWorker>,
    index: HashMap<String, usize>,
}

impl WorkerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry holding the five built-in specialists.
    pub fn specialists() -> Result<Self, ConfigurationError> {
        RegistryBuilder::default().with_specialists().build()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredWorker> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn descriptor(&self, id: &str) -> Option<&WorkerDescriptor> {
        self.get(id).map(|e| &e.descriptor)
    }

    pub fn worker(&self, id: &str) -> Option<Arc<dyn Worker>> {
        self.get(id).map(|e| Arc::clone(&e.worker))
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &WorkerDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }
}

/// Collects workers and validates them on [`build`](RegistryBuilder::build).
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<RegisteredWorker>,
}

impl RegistryBuilder {
    pub fn register(mut self, descriptor: WorkerDescriptor, worker: Arc<dyn Worker>) -> Self {
        self.entries.push(RegisteredWorker { descriptor, worker });
        self
    }

    /// Register a specialist under its own descriptor.
    pub fn register_specialist(self, specialist: SpecialistWorker) -> Self {
        let descriptor = specialist.descriptor();
        self.register(descriptor, Arc::new(specialist))
    }

    pub fn with_specialists(self) -> Self {
        SpecialistKind::all()
            .into_iter()
            .fold(self, |builder, kind| {
                builder.register_specialist(SpecialistWorker::new(kind))
            })
    }

    pub fn build(self) -> Result<WorkerRegistry, ConfigurationError> {
        let mut index = HashMap::with_capacity(self.entries.len());

        for (i, entry) in self.entries.iter().enumerate() {
            let d = &entry.descriptor;
            if d.capability_label.trim().is_empty() {
                return Err(ConfigurationError::EmptyCapability(d.id.clone()));
            }
            if d.capability_label != entry.worker.capability_label() {
                return Err(ConfigurationError::invalid_option(
                    "capability_label",
                    format!(
                        "worker '{}' descriptor label '{}' does not match implementation label '{}'",
                        d.id,
                        d.capability_label,
                        entry.worker.capability_label()
                    ),
                ));
            }
            if d.max_concurrent_tasks == 0 {
                return Err(ConfigurationError::invalid_option(
                    "max_concurrent_tasks",
                    format!("worker '{}' must allow at least 1 task", d.id),
                ));
            }
            if index.insert(d.id.clone(), i).is_some() {
                return Err(ConfigurationError::DuplicateWorker(d.id.clone()));
            }
        }

        Ok(WorkerRegistry {
            entries: self.entries,
            index,
        })
    }
}
