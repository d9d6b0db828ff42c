//! CLI error types and exit codes

use thiserror::Error;

use rolesync_connector::DirectoryError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Configuration error
/// - 3: Directory setup failed
/// - 4: Pass completed with errors
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Directory setup failed: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Sync pass completed with {0} error(s)")]
    PassFailed(usize),

    #[error("Failed to write report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigRead { .. } | CliError::ConfigParse { .. } | CliError::Config(_) => 2,
            CliError::Directory(_) => 3,
            CliError::PassFailed(_) => 4,
            CliError::Report(_) | CliError::Io(_) => 1,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        eprintln!("Error: {self}");
        if let Some(suggestion) = self.suggestion() {
            eprintln!("\nSuggestion: {suggestion}");
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::ConfigRead { .. } => {
                Some("Pass --config or set CFG_PATH to the configuration file.")
            }
            CliError::Directory(DirectoryError::AuthenticationFailed) => {
                Some("Check LDAP_BIND_DN and LDAP_BIND_PASSWORD.")
            }
            CliError::PassFailed(_) => Some("Rerun with --report-json for per-database details."),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err.to_string())
    }
}
