//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled     |
//! |-----------|----------------------|
//! | `run`     | `Run`                |
//! | `plan`    | `Plan`, `Validate`   |
//! | `workers` | `Workers`            |
//! | `config`  | `Config`             |

pub mod config;
pub mod plan;
pub mod run;
pub mod workers;

pub use config::{cmd_config, load_engine_config};
pub use plan::{cmd_plan, cmd_validate};
pub use run::cmd_run;
pub use workers::cmd_workers;
