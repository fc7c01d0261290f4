//! Rollback command

use super::{load_config, open_store, report, CmdResult, StoreArgs};
use clap::Args;
use handytrack_core::SchemaVersion;
use handytrack_store::migrations::catalog;
use handytrack_store::MigrationRunner;
use std::path::Path;

#[derive(Debug, Args)]
pub struct RollbackArgs {
    /// Revert every applied migration newer than this version
    #[arg(long)]
    pub to: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

pub fn execute(config_file: Option<&Path>, args: RollbackArgs) -> CmdResult {
    let target = SchemaVersion::parse(&args.to)?;
    let config = load_config(config_file, args.store.db)?;

    let mut conn = open_store(&config)?;
    let mut runner = MigrationRunner::new(&mut conn, config, catalog::definitions())?;
    let result = runner.rollback(&target);
    report(&result, args.store.json)
}
