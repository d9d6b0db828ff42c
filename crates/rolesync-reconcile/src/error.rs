//! Sync error types.

use thiserror::Error;

use rolesync_connector::{CatalogError, DirectoryError};

use crate::engine::Phase;

/// Errors that abort one unit of work (a mapping's resolution, a phase, or a
/// role's membership transaction).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Directory lookup failed.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Catalog statement or transaction failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// A phase did not finish within its time limit.
    #[error("{phase} phase timed out after {timeout_secs} seconds")]
    PhaseTimeout { phase: Phase, timeout_secs: u64 },
}

impl SyncError {
    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Directory(e) => e.error_code(),
            SyncError::Catalog(e) => e.error_code(),
            SyncError::PhaseTimeout { .. } => "PHASE_TIMEOUT",
        }
    }

    /// Check if a later pass may succeed without a configuration change.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Directory(e) => e.is_transient(),
            SyncError::Catalog(e) => e.is_transient(),
            SyncError::PhaseTimeout { .. } => true,
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
