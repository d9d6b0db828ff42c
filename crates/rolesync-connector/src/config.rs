//! Connector Framework configuration types
//!
//! Base trait and common configuration structures.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

/// Placeholder written in place of secrets in redacted configurations.
pub const REDACTED: &str = "***REDACTED***";

/// Trait for connector-specific configuration.
///
/// Each connector implements this trait to define its validation rules and
/// how it is displayed in logs.
pub trait ConnectorConfig: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Error returned when validation fails.
    type Error: std::error::Error;

    /// Validate the configuration.
    ///
    /// Returns an error if the configuration is invalid.
    fn validate(&self) -> Result<(), Self::Error>;

    /// Create a redacted version of this config (for logging/display).
    ///
    /// Sensitive fields are replaced with [`REDACTED`].
    fn redacted(&self) -> Self;
}

/// Common connection settings shared across connector types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Connection timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Per-operation timeout in seconds (searches, statements).
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_operation_timeout() -> u64 {
    30
}

fn default_pool_size() -> u32 {
    2
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_connection_timeout(),
            operation_timeout_secs: default_operation_timeout(),
            pool_size: default_pool_size(),
        }
    }
}

impl ConnectionSettings {
    /// Create new connection settings with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, secs: u64) -> Self {
        self.connection_timeout_secs = secs;
        self
    }

    /// Set the per-operation timeout.
    #[must_use]
    pub fn with_operation_timeout(mut self, secs: u64) -> Self {
        self.operation_timeout_secs = secs;
        self
    }

    /// Set the pool size.
    #[must_use]
    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Get connection timeout as Duration.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Get operation timeout as Duration.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Check the settings are usable; returns a description of the first problem.
    pub fn check(&self) -> Result<(), String> {
        if self.connection_timeout_secs == 0 {
            return Err("connection_timeout_secs must be greater than zero".to_string());
        }
        if self.operation_timeout_secs == 0 {
            return Err("operation_timeout_secs must be greater than zero".to_string());
        }
        if self.pool_size == 0 {
            return Err("pool_size must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// SSL/TLS configuration.
///
/// Field names follow the flat `use_tls` / `skip_tls_verify` / `ca_cert_path`
/// keys so the struct can be flattened into a connector section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsConfig {
    /// Whether to use TLS.
    #[serde(default, rename = "use_tls")]
    pub enabled: bool,

    /// Skip server certificate verification.
    #[serde(default, rename = "skip_tls_verify")]
    pub skip_verify: bool,

    /// Path to a PEM CA certificate used to verify the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_path: Option<String>,
}

impl TlsConfig {
    /// Create a new TLS config with TLS enabled.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Set the CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<String>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Disable certificate verification.
    #[must_use]
    pub fn insecure(mut self) -> Self {
        self.skip_verify = true;
        self
    }

    /// Check the TLS options are consistent.
    ///
    /// TLS without a CA certificate must explicitly opt out of verification.
    pub fn check(&self) -> Result<(), String> {
        if self.enabled && self.ca_cert_path.is_none() && !self.skip_verify {
            return Err(
                "TLS is enabled, but no ca_cert_path was provided and skip_tls_verify is false"
                    .to_string(),
            );
        }
        Ok(())
    }

    /// Log security warnings for insecure configurations.
    pub fn validate_security(&self) {
        if self.enabled && self.skip_verify && self.ca_cert_path.is_none() {
            tracing::warn!(
                target: "security",
                "TLS certificate verification is DISABLED; the connection is open to \
                 man-in-the-middle attacks"
            );
        }
    }
}
