//! Connector Framework error types
//!
//! Error definitions for both collaborators with transient/permanent
//! classification, so callers can tell a misconfiguration from an outage.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error that can occur while talking to the directory service.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No group matched the requested name.
    #[error("group '{name}' not found under '{search_base}'")]
    GroupNotFound { name: String, search_base: String },

    /// The group was found by name but its entry could not be read back.
    #[error("group '{name}' at '{reference}' disappeared before it could be read")]
    GroupVanished { name: String, reference: String },

    /// More than one group matched the requested name.
    #[error("group name '{name}' is ambiguous: {count} entries match")]
    AmbiguousGroup { name: String, count: usize },

    /// Failed to establish a connection to the directory server.
    #[error("directory connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Bind was rejected.
    #[error("directory authentication failed: invalid credentials")]
    AuthenticationFailed,

    /// A search request failed or returned an unexpected result code.
    #[error("directory search failed: {message}")]
    SearchFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// A directory operation exceeded its time limit.
    #[error("directory operation timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Directory configuration is invalid.
    #[error("invalid directory configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The client was used after being closed.
    #[error("directory connection is closed")]
    Closed,
}

impl DirectoryError {
    /// True when the group lookup itself produced no usable answer
    /// (missing or ambiguous), as opposed to a transport failure.
    #[must_use]
    pub fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            DirectoryError::GroupNotFound { .. }
                | DirectoryError::GroupVanished { .. }
                | DirectoryError::AmbiguousGroup { .. }
        )
    }

    /// Check if this error is transient and a later pass may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::ConnectionFailed { .. }
                | DirectoryError::SearchFailed { .. }
                | DirectoryError::Timeout { .. }
        )
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::GroupNotFound { .. } => "GROUP_NOT_FOUND",
            DirectoryError::GroupVanished { .. } => "GROUP_VANISHED",
            DirectoryError::AmbiguousGroup { .. } => "GROUP_AMBIGUOUS",
            DirectoryError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            DirectoryError::AuthenticationFailed => "AUTH_FAILED",
            DirectoryError::SearchFailed { .. } => "SEARCH_FAILED",
            DirectoryError::Timeout { .. } => "TIMEOUT",
            DirectoryError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            DirectoryError::Closed => "CLOSED",
        }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a search failed error.
    pub fn search_failed(message: impl Into<String>) -> Self {
        DirectoryError::SearchFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a search failed error with source.
    pub fn search_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::SearchFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        DirectoryError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Error that can occur while talking to the role catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Failed to open a connection pool to the database.
    #[error("catalog connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// A catalog query or statement failed.
    #[error("catalog statement failed: {message}")]
    StatementFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Begin, commit or rollback failed.
    #[error("catalog transaction failed: {message}")]
    TransactionFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Catalog configuration is invalid.
    #[error("invalid catalog configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl CatalogError {
    /// Check if this error is transient and a later pass may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CatalogError::ConnectionFailed { .. } | CatalogError::TransactionFailed { .. }
        )
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            CatalogError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            CatalogError::StatementFailed { .. } => "STATEMENT_FAILED",
            CatalogError::TransactionFailed { .. } => "TRANSACTION_FAILED",
            CatalogError::InvalidConfiguration { .. } => "INVALID_CONFIG",
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        CatalogError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a statement failed error.
    pub fn statement_failed(message: impl Into<String>) -> Self {
        CatalogError::StatementFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a statement failed error with source.
    pub fn statement_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        CatalogError::StatementFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transaction failed error with source.
    pub fn transaction_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        CatalogError::TransactionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        CatalogError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
