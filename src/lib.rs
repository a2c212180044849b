pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod dag;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod matcher;
pub mod phase;
pub mod registry;
pub mod sink;
pub mod state;
pub mod ui;
pub mod worker;

pub use aggregator::RunReport;
pub use catalog::{Task, TaskCatalog, TaskStatus};
pub use config::EngineConfig;
pub use engine::{Engine, EngineEvent};
pub use errors::ConfigurationError;
pub use phase::Phase;
pub use registry::WorkerRegistry;
