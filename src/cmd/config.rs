//! Configuration view and validation commands: `conductor config`.

use anyhow::{Context, Result, bail};
use conductor::config::{CONFIG_FILE_NAME, ConductorToml, EngineConfig};
use std::path::{Path, PathBuf};

use super::super::{Cli, ConfigCommands};

/// Path of the config file this invocation uses.
pub fn config_path(cli: &Cli, project_dir: &Path) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| project_dir.join(CONFIG_FILE_NAME))
}

/// Load `conductor.toml` (if present) and apply `CONDUCTOR_*` env overrides.
pub fn load_engine_config(cli: &Cli, project_dir: &Path) -> Result<EngineConfig> {
    let path = config_path(cli, project_dir);
    let toml = if path.exists() {
        ConductorToml::load(&path)?
    } else if cli.config.is_some() {
        bail!("Config file not found: {}", path.display());
    } else {
        ConductorToml::default()
    };

    for warning in toml.validate() {
        tracing::warn!(config = %path.display(), "{}", warning);
    }

    Ok(EngineConfig::from_toml(&toml).with_env()?)
}

pub fn cmd_config(cli: &Cli, project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let path = config_path(cli, project_dir);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Conductor Configuration");
            println!("=======================");
            println!();

            let toml = if path.exists() {
                println!("Config file: {}", path.display());
                ConductorToml::load(&path)?
            } else {
                println!("No {} found at {}", CONFIG_FILE_NAME, path.display());
                println!("Using default configuration.");
                ConductorToml::default()
            };
            println!();

            println!("[engine]");
            println!("  task_quota = {}", toml.engine.task_quota);
            println!("  task_timeout_secs = {}", toml.engine.task_timeout_secs);
            println!("  unmatched = \"{}\"", toml.engine.unmatched);
            println!();

            if !toml.phases.overrides.is_empty() {
                println!("[phases.overrides]");
                for (pattern, phase_override) in &toml.phases.overrides {
                    println!("  \"{}\":", pattern);
                    if let Some(quota) = phase_override.task_quota {
                        println!("    task_quota = {}", quota);
                    }
                    if let Some(secs) = phase_override.task_timeout_secs {
                        println!("    task_timeout_secs = {}", secs);
                    }
                }
                println!();
            }

            println!("Effective values (with env overrides):");
            let config = EngineConfig::from_toml(&toml).with_env()?;
            println!("  task_quota = {}", config.task_quota);
            println!("  task_timeout_secs = {}", config.task_timeout.as_secs());
            println!("  unmatched = \"{}\"", config.unmatched);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            if !path.exists() {
                println!("No {} found at {}", CONFIG_FILE_NAME, path.display());
                println!("Nothing to validate; defaults are valid.");
                return Ok(());
            }

            let toml = ConductorToml::load(&path)?;
            let warnings = toml.validate();
            EngineConfig::from_toml(&toml)
                .with_env()?
                .validate()
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;

            if warnings.is_empty() {
                println!("Configuration is valid: {}", path.display());
            } else {
                println!("Configuration is valid with warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init) => {
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            ConductorToml::default().save(&path)?;
            println!("Created {}", path.display());
        }
    }

    Ok(())
}
