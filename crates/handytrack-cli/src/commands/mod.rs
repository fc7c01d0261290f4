pub mod check;
pub mod migrate;
pub mod rollback;
pub mod status;

use clap::Args;
use handytrack_core::config::DEFAULT_STORE_PATH;
use handytrack_core::RunnerConfig;
use handytrack_store::{db, MigrationResult};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Store selection shared by every command
#[derive(Debug, Args)]
pub struct StoreArgs {
    /// SQLite store (default: store_path from --config, else .handytrack/handytrack.db)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

/// Build the runner configuration: defaults, then the config file, then flags
pub fn load_config(
    config_file: Option<&Path>,
    db: Option<PathBuf>,
) -> Result<RunnerConfig, Box<dyn std::error::Error>> {
    let mut config = match config_file {
        Some(path) => RunnerConfig::from_toml_file(path)?,
        None => RunnerConfig::default(),
    };
    if let Some(db) = db {
        config.store_path = Some(db);
    }
    if config.store_path.is_none() {
        config.store_path = Some(PathBuf::from(DEFAULT_STORE_PATH));
    }
    Ok(config)
}

pub fn open_store(config: &RunnerConfig) -> Result<Connection, Box<dyn std::error::Error>> {
    let path = config
        .store_path
        .as_deref()
        .ok_or("no store path configured")?;
    Ok(db::open(path)?)
}

/// Print a run outcome and turn a failed run into an error
pub fn report(result: &MigrationResult, json: bool) -> CmdResult {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", result.message);
        for v in &result.applied_versions {
            println!("  applied   {}", v);
        }
        for v in &result.reverted_versions {
            println!("  reverted  {}", v);
        }
        if let Some(path) = &result.backup_path {
            println!("  backup    {}", path.display());
        }
    }

    if result.success {
        Ok(())
    } else {
        Err(format!(
            "{} ({})",
            result.error_code.unwrap_or("ERR_INTERNAL"),
            result.run_id
        )
        .into())
    }
}
