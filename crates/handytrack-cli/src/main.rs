//! HandyTrack CLI
//!
//! Operator commands for the HandyTrack store schema

use clap::{Parser, Subcommand};
use handytrack_core::logging_facility::{self, Profile};
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "handytrack")]
#[command(about = "HandyTrack - schema migrations for the evaluation store", long_about = None)]
struct Cli {
    /// TOML file with runner settings; flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output: dev (human-readable) or json
    #[arg(long, global = true, default_value = "dev")]
    log_profile: Profile,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending migrations
    Migrate(commands::migrate::MigrateArgs),
    /// Show applied and pending migrations
    Status(commands::status::StatusArgs),
    /// Revert migrations newer than a version
    Rollback(commands::rollback::RollbackArgs),
    /// Check foreign keys and print the schema fingerprint
    Check(commands::check::CheckArgs),
}

fn main() {
    let cli = Cli::parse();
    logging_facility::init(cli.log_profile);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Migrate(args) => commands::migrate::execute(config, args),
        Commands::Status(args) => commands::status::execute(config, args),
        Commands::Rollback(args) => commands::rollback::execute(config, args),
        Commands::Check(args) => commands::check::execute(config, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
