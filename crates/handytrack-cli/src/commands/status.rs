//! Status command

use super::{load_config, open_store, CmdResult, StoreArgs};
use clap::Args;
use handytrack_store::migrations::catalog;
use handytrack_store::{HistoryState, MigrationRunner};
use std::path::Path;

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

pub fn execute(config_file: Option<&Path>, args: StatusArgs) -> CmdResult {
    let config = load_config(config_file, args.store.db)?;
    let mut conn = open_store(&config)?;
    let runner = MigrationRunner::new(&mut conn, config, catalog::definitions())?;
    let status = runner.status()?;

    if args.store.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match &status.state {
        HistoryState::Uninitialized => println!("Store not initialized"),
        HistoryState::Empty => println!("No migrations applied"),
        HistoryState::At(version) => println!("Current version: {}", version),
    }
    if let Some(latest) = &status.latest_version {
        println!("Latest version:  {}", latest);
    }
    for record in &status.applied {
        println!(
            "  applied   {:<8} {}  {}",
            record.version,
            record.applied_at.format("%Y-%m-%d %H:%M:%S"),
            record.description
        );
    }
    for version in &status.pending {
        println!("  pending   {}", version);
    }
    for version in &status.skipped {
        println!("  skipped   {}", version);
    }
    for version in &status.orphaned {
        println!("  unknown   {} (applied by a newer build)", version);
    }
    Ok(())
}
