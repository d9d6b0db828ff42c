//! Configuration file loading
//!
//! The file is YAML. Secrets are normally left out of it and supplied
//! through the environment (`PG_PASSWORD`, `LDAP_BIND_DN`,
//! `LDAP_BIND_PASSWORD`), optionally via a `.env` file.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use rolesync_connector::ConnectorConfig;
use rolesync_connector_ldap::LdapConfig;
use rolesync_connector_postgres::PostgresConfig;
use rolesync_reconcile::{DatabaseTarget, PhaseTimeouts, RoleMapping, SyncPolicy};

use crate::error::{CliError, CliResult};

/// Default configuration path when neither `--config` nor `CFG_PATH` is set.
pub const DEFAULT_CONFIG_PATH: &str = "/opt/rolesync/config.yml";

pub const ENV_PG_PASSWORD: &str = "PG_PASSWORD";
pub const ENV_LDAP_BIND_DN: &str = "LDAP_BIND_DN";
pub const ENV_LDAP_BIND_PASSWORD: &str = "LDAP_BIND_PASSWORD";

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub sync_policy: SyncPolicy,

    pub databases: Vec<DatabaseConfig>,

    pub ldap: LdapConfig,

    #[serde(default)]
    pub timeouts: PhaseTimeouts,
}

/// One database and the roles mirrored into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub alias: String,
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub roles: Vec<RoleMapping>,
}

impl AppConfig {
    /// Read, overlay the process environment, and validate.
    pub fn load(path: &Path) -> CliResult<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`AppConfig::load`], reading the overlay from `lookup`.
    pub fn load_with<F>(path: &Path, lookup: F) -> CliResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let contents = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: AppConfig =
            serde_yaml::from_str(&contents).map_err(|source| CliError::ConfigParse {
                path: path.display().to_string(),
                source,
            })?;
        config.apply_env_overrides_from(lookup);
        config.validate().map_err(CliError::Config)?;
        Ok(config)
    }

    /// Overlay secrets from `lookup`. Unset or empty variables are ignored.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(password) = get(ENV_PG_PASSWORD) {
            for db in &mut self.databases {
                db.postgres.password = Some(password.clone());
            }
        }
        if let Some(bind_dn) = get(ENV_LDAP_BIND_DN) {
            self.ldap.bind_dn = bind_dn;
        }
        if let Some(bind_password) = get(ENV_LDAP_BIND_PASSWORD) {
            self.ldap.bind_password = Some(bind_password);
        }
    }

    /// Check the whole file before any connection is attempted.
    pub fn validate(&self) -> Result<(), String> {
        self.sync_policy.check()?;
        self.timeouts
            .check()
            .map_err(|e| format!("timeouts: {e}"))?;
        self.ldap.validate().map_err(|e| e.to_string())?;

        if self.databases.is_empty() {
            return Err("at least one database must be configured".to_string());
        }

        let mut aliases = HashSet::new();
        for db in &self.databases {
            if db.alias.trim().is_empty() {
                return Err("databases[].alias must not be empty".to_string());
            }
            if !aliases.insert(db.alias.as_str()) {
                return Err(format!("duplicate database alias '{}'", db.alias));
            }
            db.postgres
                .validate()
                .map_err(|e| format!("database '{}': {e}", db.alias))?;
            if db.roles.is_empty() {
                return Err(format!("database '{}' has no role mappings", db.alias));
            }
            for mapping in &db.roles {
                if mapping.directory_group.trim().is_empty() || mapping.target_role.trim().is_empty()
                {
                    return Err(format!(
                        "database '{}': ldap_group_cn and postgres_role must not be empty",
                        db.alias
                    ));
                }
            }
        }
        Ok(())
    }

    /// Copy with every secret replaced.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.ldap = self.ldap.redacted();
        for db in &mut config.databases {
            db.postgres = db.postgres.redacted();
        }
        config
    }

    /// Targets for a pass, restricted to `aliases` when non-empty.
    pub fn targets(&self, aliases: &[String]) -> CliResult<Vec<DatabaseTarget<PostgresConfig>>> {
        if let Some(unknown) = aliases
            .iter()
            .find(|a| !self.databases.iter().any(|db| &db.alias == *a))
        {
            return Err(CliError::Config(format!("unknown database alias '{unknown}'")));
        }

        Ok(self
            .databases
            .iter()
            .filter(|db| aliases.is_empty() || aliases.contains(&db.alias))
            .map(|db| DatabaseTarget {
                alias: db.alias.clone(),
                connection: db.postgres.clone(),
                mappings: db.roles.clone(),
            })
            .collect())
    }
}
