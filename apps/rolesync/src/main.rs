//! rolesync - mirror LDAP group membership onto PostgreSQL roles
//!
//! One invocation runs one pass over every configured database:
//! - create login roles for newly entitled directory users
//! - grant and revoke mapped roles to match group membership
//! - drop managed accounts that lost every entitlement
//!
//! Scheduling is left to cron or a systemd timer.

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod error;
mod logging;

use error::CliResult;
use logging::{LogFormat, DEFAULT_FILTER};

/// rolesync - LDAP to PostgreSQL role synchronization
#[derive(Parser)]
#[command(name = "rolesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass
    Sync(commands::sync::SyncArgs),

    /// Load and validate the configuration without connecting
    Check(commands::check::CheckArgs),
}

#[tokio::main]
async fn main() {
    // Load .env if present, before clap reads CFG_PATH
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init_logging(DEFAULT_FILTER, cli.log_format);

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, exit_code = e.exit_code(), "rolesync failed");
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Sync(args) => commands::sync::execute(args).await,
        Commands::Check(args) => commands::check::execute(args),
    }
}
