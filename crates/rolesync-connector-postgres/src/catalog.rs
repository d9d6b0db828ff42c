//! PostgreSQL role catalog
//!
//! Opens a pool per database and hands out transactions that manage login
//! roles and role membership through `pg_roles` / `pg_auth_members`.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction as SqlxTransaction};
use tracing::{debug, info, instrument, warn};

use rolesync_connector::config::ConnectorConfig;
use rolesync_connector::error::{CatalogError, CatalogResult};
use rolesync_connector::traits::{RoleStore, RoleStoreConnector, RoleTransaction};

use crate::config::PostgresConfig;
use crate::sql;

/// Opens [`PgRoleStore`]s from [`PostgresConfig`] descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

impl PostgresConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RoleStoreConnector for PostgresConnector {
    type Descriptor = PostgresConfig;
    type Store = PgRoleStore;

    #[instrument(skip(self, config), fields(host = %config.host, dbname = %config.dbname))]
    async fn connect(&self, config: &PostgresConfig) -> CatalogResult<PgRoleStore> {
        config.validate()?;

        debug!("Creating database connection pool");

        let pool = PgPoolOptions::new()
            .max_connections(config.connection.pool_size)
            .acquire_timeout(config.connection.connection_timeout())
            .connect_with(config.connect_options())
            .await
            .map_err(|e| {
                CatalogError::connection_failed_with_source(
                    format!(
                        "Failed to connect to database at {}:{}/{}",
                        config.host, config.port, config.dbname
                    ),
                    e,
                )
            })?;

        // Verify connectivity before any phase begins
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| CatalogError::connection_failed_with_source("Test query failed", e))?;

        info!("Database connection pool established");

        Ok(PgRoleStore { pool })
    }
}

/// Role catalog of one database.
#[derive(Debug, Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

#[async_trait]
impl RoleStore for PgRoleStore {
    type Transaction = PgRoleTransaction;

    async fn begin(&self) -> CatalogResult<PgRoleTransaction> {
        let tx = self.pool.begin().await.map_err(|e| {
            CatalogError::transaction_failed_with_source("Failed to begin transaction", e)
        })?;

        debug!("Database transaction started");

        Ok(PgRoleTransaction {
            inner: tx,
            savepoint_counter: 0,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

/// A transaction over the role catalog.
///
/// Rolls back on drop if neither committed nor rolled back.
pub struct PgRoleTransaction {
    inner: SqlxTransaction<'static, Postgres>,
    /// Savepoint counter for per-drop savepoints.
    savepoint_counter: u32,
}

impl PgRoleTransaction {
    async fn execute(&mut self, statement: &str, context: String) -> CatalogResult<()> {
        debug!(statement = %statement, "Executing");
        sqlx::query(statement)
            .execute(&mut *self.inner)
            .await
            .map(|_| ())
            .map_err(|e| CatalogError::statement_failed_with_source(context, e))
    }

    async fn savepoint(&mut self) -> CatalogResult<String> {
        self.savepoint_counter += 1;
        let name = format!("sp_{}", self.savepoint_counter);
        self.execute(
            &format!("SAVEPOINT {name}"),
            format!("Failed to create savepoint {name}"),
        )
        .await?;
        Ok(name)
    }
}

#[async_trait]
impl RoleTransaction for PgRoleTransaction {
    async fn account_exists(&mut self, name: &str) -> CatalogResult<bool> {
        sqlx::query_scalar::<_, bool>(sql::ROLE_EXISTS)
            .bind(name)
            .fetch_one(&mut *self.inner)
            .await
            .map_err(|e| {
                CatalogError::statement_failed_with_source(
                    format!("Failed to check whether role '{name}' exists"),
                    e,
                )
            })
    }

    async fn create_account(&mut self, name: &str) -> CatalogResult<()> {
        self.execute(
            &sql::create_login_role(name),
            format!("Failed to create role '{name}'"),
        )
        .await
    }

    async fn grant_role(&mut self, role: &str, name: &str) -> CatalogResult<()> {
        self.execute(
            &sql::grant_role(role, name),
            format!("Failed to grant '{role}' to '{name}'"),
        )
        .await
    }

    async fn revoke_role(&mut self, role: &str, name: &str) -> CatalogResult<()> {
        self.execute(
            &sql::revoke_role(role, name),
            format!("Failed to revoke '{role}' from '{name}'"),
        )
        .await
    }

    async fn drop_account(&mut self, name: &str) -> CatalogResult<()> {
        let savepoint = self.savepoint().await?;
        match self
            .execute(&sql::drop_role(name), format!("Failed to drop role '{name}'"))
            .await
        {
            Ok(()) => {
                self.execute(
                    &format!("RELEASE SAVEPOINT {savepoint}"),
                    format!("Failed to release savepoint {savepoint}"),
                )
                .await
            }
            Err(e) => {
                self.execute(
                    &format!("ROLLBACK TO SAVEPOINT {savepoint}"),
                    format!("Failed to rollback to savepoint {savepoint}"),
                )
                .await?;
                warn!(savepoint = %savepoint, role = %name, "Rolled back to savepoint");
                Err(e)
            }
        }
    }

    async fn list_managed_role_members(
        &mut self,
        role: &str,
        prefixes: &[String],
    ) -> CatalogResult<Vec<String>> {
        if prefixes.is_empty() {
            return Ok(Vec::new());
        }

        let statement = sql::managed_members_query(prefixes.len());
        let mut query = sqlx::query_scalar::<_, String>(&statement).bind(role);
        for prefix in prefixes {
            query = query.bind(sql::like_prefix_pattern(prefix));
        }

        query.fetch_all(&mut *self.inner).await.map_err(|e| {
            CatalogError::statement_failed_with_source(
                format!("Failed to list members of role '{role}'"),
                e,
            )
        })
    }

    async fn commit(self) -> CatalogResult<()> {
        self.inner.commit().await.map_err(|e| {
            CatalogError::transaction_failed_with_source("Failed to commit transaction", e)
        })?;
        debug!("Database transaction committed");
        Ok(())
    }

    async fn rollback(self) -> CatalogResult<()> {
        self.inner.rollback().await.map_err(|e| {
            CatalogError::transaction_failed_with_source("Failed to rollback transaction", e)
        })?;
        debug!("Database transaction rolled back");
        Ok(())
    }
}
