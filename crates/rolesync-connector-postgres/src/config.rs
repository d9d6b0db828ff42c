//! PostgreSQL catalog configuration
//!
//! Connection descriptor for one database whose roles are reconciled.

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use rolesync_connector::config::{ConnectionSettings, ConnectorConfig, REDACTED};
use rolesync_connector::error::{CatalogError, CatalogResult};

/// Name reported to the server in `pg_stat_activity`.
const APPLICATION_NAME: &str = "rolesync";

/// SSL mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// No SSL.
    Disable,
    /// Try a plain connection first, SSL if the server insists.
    Allow,
    /// Use SSL if available, but don't require it.
    #[default]
    Prefer,
    /// Require SSL.
    Require,
    /// Require SSL and verify CA certificate.
    VerifyCa,
    /// Require SSL and verify CA and hostname.
    VerifyFull,
}

impl SslMode {
    /// Get the string representation for connection strings.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Allow => "allow",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Allow => PgSslMode::Allow,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

/// Connection descriptor for one PostgreSQL database.
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Database server hostname or IP address.
    pub host: String,

    /// Database server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Role used to connect; needs `CREATEROLE` and admin on mapped roles.
    pub user: String,

    /// Password. Usually injected via `PG_PASSWORD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database name.
    pub dbname: String,

    /// SSL mode.
    #[serde(default)]
    pub sslmode: SslMode,

    /// Connection settings (timeouts, pool size).
    #[serde(default)]
    pub connection: ConnectionSettings,
}

fn default_port() -> u16 {
    5432
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("dbname", &self.dbname)
            .field("sslmode", &self.sslmode)
            .field("connection", &self.connection)
            .finish()
    }
}

impl PostgresConfig {
    /// Create a new config with required fields.
    pub fn new(
        host: impl Into<String>,
        dbname: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: user.into(),
            password: None,
            dbname: dbname.into(),
            sslmode: SslMode::default(),
            connection: ConnectionSettings::default(),
        }
    }

    /// Set password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set SSL mode.
    #[must_use]
    pub fn with_sslmode(mut self, mode: SslMode) -> Self {
        self.sslmode = mode;
        self
    }

    /// Build a libpq-style connection string.
    ///
    /// Excludes the password.
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} sslmode={}",
            self.host,
            self.port,
            self.dbname,
            self.user,
            self.sslmode.as_str()
        )
    }

    /// Build `sqlx` connect options.
    ///
    /// Every statement runs under the configured operation timeout.
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        let statement_timeout = (self.connection.operation_timeout_secs * 1000).to_string();
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.dbname)
            .ssl_mode(self.sslmode.into())
            .application_name(APPLICATION_NAME)
            .options([("statement_timeout", statement_timeout.as_str())]);
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        options
    }
}

impl ConnectorConfig for PostgresConfig {
    type Error = CatalogError;

    fn validate(&self) -> CatalogResult<()> {
        if self.host.is_empty() {
            return Err(CatalogError::invalid_configuration("postgres.host is required"));
        }
        if self.port == 0 {
            return Err(CatalogError::invalid_configuration(
                "postgres.port must be greater than 0",
            ));
        }
        if self.dbname.is_empty() {
            return Err(CatalogError::invalid_configuration(
                "postgres.dbname is required",
            ));
        }
        if self.user.is_empty() {
            return Err(CatalogError::invalid_configuration("postgres.user is required"));
        }
        self.connection
            .check()
            .map_err(|e| CatalogError::invalid_configuration(format!("postgres.connection: {e}")))
    }

    fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.password.is_some() {
            config.password = Some(REDACTED.to_string());
        }
        config
    }
}
