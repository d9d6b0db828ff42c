//! Check command - load and validate the configuration

use std::path::PathBuf;

use clap::Args;

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::error::{CliError, CliResult};

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the configuration file
    #[arg(short, long, env = "CFG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

/// Validate the file with the environment overlay and print it with
/// secrets redacted. No connection is attempted.
pub fn execute(args: CheckArgs) -> CliResult<()> {
    let config = AppConfig::load(&args.config)?;
    println!("{}", render(&config)?);
    println!(
        "Configuration OK: {} database(s), {} mapping(s)",
        config.databases.len(),
        config.databases.iter().map(|db| db.roles.len()).sum::<usize>()
    );
    Ok(())
}

fn render(config: &AppConfig) -> CliResult<String> {
    serde_yaml::to_string(&config.redacted())
        .map_err(|e| CliError::Config(format!("failed to render configuration: {e}")))
}
