//! Phase dependency graph and run-order resolution.
//!
//! ## Architecture
//!
//! 1. **Builder** - Constructs a graph from phases and rejects duplicates,
//!    unknown dependencies and cycles
//! 2. **Scheduler** - Resolves the graph into a stable linear run order and
//!    groups phases into informational waves
//!
//! ## Example
//!
//! ```
//! use conductor::dag::PhasePlan;
//! use conductor::phase::Phase;
//!
//! let phases = vec![
//!     Phase::new("A", &["analysis"], true),
//!     Phase::new("B", &["qa"], true).depends_on(&["A"]),
//!     Phase::new("C", &["devops"], true).depends_on(&["A"]),
//!     Phase::new("D", &["documentation"], false).depends_on(&["B", "C"]),
//! ];
//!
//! let plan = PhasePlan::from_phases(&phases)?;
//! assert_eq!(plan.order_names(), vec!["A", "B", "C", "D"]);
//!
//! // Wave 0: [A], wave 1: [B, C], wave 2: [D]
//! assert_eq!(plan.compute_waves().len(), 3);
//! # Ok::<(), conductor::errors::ConfigurationError>(())
//! ```

mod builder;
mod scheduler;

pub use builder::{DagBuilder, PhaseGraph, PhaseIndex};
pub use scheduler::{PhasePlan, resolve_order};
