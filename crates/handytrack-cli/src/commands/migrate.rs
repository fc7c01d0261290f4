//! Migrate command

use super::{load_config, open_store, report, CmdResult, StoreArgs};
use clap::Args;
use handytrack_store::migrations::catalog;
use handytrack_store::MigrationRunner;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Copy the store before applying anything
    #[arg(long)]
    pub backup: bool,

    /// Where backups go (default: backup_dir from --config, else next to the store)
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,

    /// Keep only this many backups
    #[arg(long)]
    pub keep_backups: Option<usize>,
}

pub fn execute(config_file: Option<&Path>, args: MigrateArgs) -> CmdResult {
    let mut config = load_config(config_file, args.store.db)?;
    if let Some(dir) = args.backup_dir {
        config.backup_dir = Some(dir);
    }
    if let Some(keep) = args.keep_backups {
        config.backup_retention = Some(keep);
    }

    let mut conn = open_store(&config)?;
    let mut runner = MigrationRunner::new(&mut conn, config, catalog::definitions())?;
    let result = runner.migrate(args.backup);
    report(&result, args.store.json)
}
