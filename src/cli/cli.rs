use super::migrate_cmd::MigrateCmd;
use super::run_cmd::{run_service, ServiceArgs, ServiceName};
use crate::common::consts;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version = consts::CLI_VERSION, about = "Nostr relay observatory pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// One subcommand per pipeline service (spec.md §6.5), plus `migrate`.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover relay URLs from a seed list.
    Seeder(ServiceArgs),
    /// Scan ingested events and API sources for new relay URLs.
    Finder(ServiceArgs),
    /// Probe candidate relays and promote the reachable ones.
    Validator(ServiceArgs),
    /// Collect NIP-66/NIP-11 health metadata for known relays.
    Monitor(ServiceArgs),
    /// Pull events from known relays into the local store.
    Synchronizer(ServiceArgs),
    /// Apply pending database migrations.
    Migrate(MigrateCmd),
}

/// Parses argv and runs the selected subcommand, returning a process exit
/// code (spec.md §7's `sysexits.h`-style codes).
pub async fn handle_cli() -> i32 {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Seeder(args) => run_service(ServiceName::Seeder, args).await,
        Commands::Finder(args) => run_service(ServiceName::Finder, args).await,
        Commands::Validator(args) => run_service(ServiceName::Validator, args).await,
        Commands::Monitor(args) => run_service(ServiceName::Monitor, args).await,
        Commands::Synchronizer(args) => run_service(ServiceName::Synchronizer, args).await,
        Commands::Migrate(cmd) => cmd.run().await,
    }
}
