//! Check command
//!
//! Compares the declared foreign keys with the live store and prints the
//! schema fingerprint.

use super::{load_config, open_store, CmdResult, StoreArgs};
use clap::Args;
use handytrack_core::{ExError, ExErrorKind};
use handytrack_store::migrations::catalog;
use handytrack_store::schema_check::{check_foreign_keys, schema_fingerprint, FOREIGN_KEYS};
use handytrack_store::MigrationRunner;
use std::path::Path;

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

pub fn execute(config_file: Option<&Path>, args: CheckArgs) -> CmdResult {
    let config = load_config(config_file, args.store.db)?;
    let history_table = config.history_table.clone();
    let mut conn = open_store(&config)?;

    let current = MigrationRunner::new(&mut conn, config, catalog::definitions())?.current_version()?;
    let drift = check_foreign_keys(&conn, FOREIGN_KEYS)?;
    let fingerprint = schema_fingerprint(&conn, &[history_table.as_str()])?;

    if args.store.json {
        let report = serde_json::json!({
            "current_version": current,
            "fingerprint": fingerprint,
            "drift": drift,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &current {
            Some(version) => println!("Current version: {}", version),
            None => println!("No migrations applied"),
        }
        println!("Schema fingerprint: {}", fingerprint);
        for d in &drift {
            println!("  drift  {}", d.reason);
        }
        if drift.is_empty() {
            println!("All {} declared foreign keys present", FOREIGN_KEYS.len());
        }
    }

    if drift.is_empty() {
        Ok(())
    } else {
        Err(ExError::new(ExErrorKind::SchemaDrift)
            .with_op("check")
            .with_message(format!(
                "{} declared foreign key(s) do not match the store",
                drift.len()
            ))
            .into())
    }
}
