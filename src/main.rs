use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use conductor::config::UnmatchedPolicy;
use conductor::logging::{self, LogFormat, LogOptions};
use conductor::ui::UiMode;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "conductor")]
#[command(version, about = "Phase-based coordination of specialist workers over a task catalog")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Stderr log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Also write daily-rolling JSON logs to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Path to conductor.toml (defaults to <project-dir>/conductor.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow over a task catalog
    Run(RunArgs),
    /// Show the resolved phase order, waves and total estimate
    Plan {
        /// Workflow file (TOML, JSON or YAML); the built-in workflow if omitted
        #[arg(short, long)]
        workflow: Option<PathBuf>,
    },
    /// Check a workflow, catalog and config without running anything
    Validate {
        #[arg(short, long)]
        workflow: Option<PathBuf>,
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },
    /// List registered workers
    Workers,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(clap::Args, Clone)]
pub struct RunArgs {
    /// Workflow file (TOML, JSON or YAML); the built-in workflow if omitted
    #[arg(short, long)]
    pub workflow: Option<PathBuf>,

    /// Task catalog (JSON)
    #[arg(short, long)]
    pub catalog: PathBuf,

    /// Tasks each worker may attempt per phase
    #[arg(long)]
    pub quota: Option<usize>,

    /// Per-task timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Policy for tasks no worker can handle: warn, escalate
    #[arg(long)]
    pub unmatched: Option<UnmatchedPolicy>,

    /// UI output mode
    #[arg(long, value_enum, default_value_t = UiMode::Full)]
    pub ui: UiMode,

    /// Final report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Append task results and discoveries to this JSONL file
    #[arg(long)]
    pub sink_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default conductor.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(&LogOptions {
        verbose: cli.verbose,
        format: cli.log_format,
        dir: cli.log_dir.clone(),
    })?;

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Run(args) => cmd::cmd_run(&cli, &project_dir, args).await?,
        Commands::Plan { workflow } => cmd::cmd_plan(workflow.as_deref())?,
        Commands::Validate { workflow, catalog } => {
            cmd::cmd_validate(&cli, &project_dir, workflow.as_deref(), catalog.as_deref())?
        }
        Commands::Workers => cmd::cmd_workers()?,
        Commands::Config { command } => cmd::cmd_config(&cli, &project_dir, command.clone())?,
    }

    Ok(())
}
